//! Global variable reference scraped from `pipeline-syntax/globals`.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, warn};

/// A global variable (`env`, `params`, shared-library vars, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalVar {
    pub name: String,
    /// Plain text of the description, trimmed.
    pub description: String,
    /// Description element as served by Jenkins.
    pub description_html: String,
    /// Description converted to Markdown for terminal display.
    pub description_markdown: String,
}

/// Extract variables from the globals reference page.
///
/// Each `dt` under `dl.steps.variables.root` names a variable by its `id`; the
/// first `div` of the `dd` that follows holds its description. Returns an empty
/// list when the page has no such element.
pub fn parse_globals_html(html: &str) -> Vec<GlobalVar> {
    let doc = Html::parse_document(html);

    let root_sel = Selector::parse("dl.steps.variables.root").unwrap();
    let entry_sel = Selector::parse("dt, dd").unwrap();
    let div_sel = Selector::parse("div").unwrap();

    let Some(root) = doc.select(&root_sel).next() else {
        debug!("no globals list in page");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut vars = Vec::new();
    let mut pending: Option<String> = None;

    for el in root.select(&entry_sel) {
        match el.value().name() {
            "dt" => pending = el.value().attr("id").map(str::to_string),
            "dd" => {
                let Some(name) = pending.take() else { continue };
                let Some(div) = el.select(&div_sel).next() else { continue };
                if seen.insert(name.clone()) {
                    vars.push(global_var(name, div));
                }
            }
            _ => {}
        }
    }

    debug!(count = vars.len(), "parsed globals reference");
    vars
}

fn global_var(name: String, div: ElementRef<'_>) -> GlobalVar {
    let description = div.text().collect::<String>().trim().to_string();
    let description_html = div.html();

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style"])
        .build();
    let description_markdown = match converter.convert(&div.inner_html()) {
        Ok(md) => md.trim().to_string(),
        Err(e) => {
            warn!(var = %name, error = %e, "markdown conversion failed, using plain text");
            description.clone()
        }
    };

    GlobalVar {
        name,
        description,
        description_html,
        description_markdown,
    }
}
