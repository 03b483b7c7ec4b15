//! Job definition rendered around a pipeline script.

/// Marker replaced with the CDATA-wrapped script.
const CONTENT_MARKER: &str = "++CONTENT++";

const FLOW_DEFINITION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<flow-definition plugin="workflow-job">
  <description>Managed by jackline</description>
  <keepDependencies>false</keepDependencies>
  <properties>
    <org.jenkinsci.plugins.workflow.job.properties.PipelineTriggersJobProperty>
      <triggers/>
    </org.jenkinsci.plugins.workflow.job.properties.PipelineTriggersJobProperty>
  </properties>
  <definition class="org.jenkinsci.plugins.workflow.cps.CpsFlowDefinition" plugin="workflow-cps">
    <script>++CONTENT++</script>
    <sandbox>false</sandbox>
  </definition>
  <triggers/>
</flow-definition>
"#;

/// Render the `config.xml` for a pipeline job running `source`.
///
/// The script is embedded verbatim inside a CDATA section. A literal `]]>` in
/// the script is split across two sections so the document stays well formed.
pub fn render_job_config(source: &str) -> String {
    let escaped = source.replace("]]>", "]]]]><![CDATA[>");
    FLOW_DEFINITION.replace(CONTENT_MARKER, &format!("<![CDATA[{escaped}]]>"))
}
