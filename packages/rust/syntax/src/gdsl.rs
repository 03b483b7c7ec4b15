//! GDSL step descriptor parser.
//!
//! Jenkins publishes pipeline step signatures as Groovy DSL text, one
//! `method(...)` call per line. Two shapes occur:
//! - positional: `method(name: 'sh', ..., params: [script:'java.lang.String'], doc: '...')`
//! - named: `method(name: 'git', ..., namedParams: [parameter(name: 'url', type: '...'), ...], doc: '...')`
//!
//! Anything else on a line is noise and is skipped without error.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

/// Substring a line must contain before it is handed to the matchers.
const CANDIDATE_MARKER: &str = "method(name:";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which descriptor shape produced a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarDialect {
    Positional,
    Named,
}

/// One pipeline step as described by the GDSL descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSignature {
    pub name: String,
    pub doc: String,
    /// Parameter name to declared type, in descriptor order.
    pub parameters: IndexMap<String, String>,
    pub dialect: GrammarDialect,
}

impl StepSignature {
    /// `name(key:type, ...)` with keys sorted.
    pub fn signature(&self) -> String {
        let params = self
            .sorted_params()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({params})", self.name)
    }

    /// Insertable call with a placeholder value for every parameter.
    pub fn snippet(&self) -> String {
        let params = self
            .sorted_params()
            .map(|(k, v)| format!("{k}:{}", default_value(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {params}", self.name)
    }

    fn sorted_params(&self) -> impl Iterator<Item = (&String, &String)> {
        let mut params: Vec<_> = self.parameters.iter().collect();
        params.sort_by(|a, b| a.0.cmp(b.0));
        params.into_iter()
    }
}

/// Placeholder literal for a declared parameter type.
fn default_value(type_name: &str) -> &'static str {
    match type_name {
        "java.lang.String" => "\"\"",
        "Closure" => "{}",
        "Map" => "[:]",
        "int" => "0",
        "boolean" => "true",
        _ => "[unknown_param]",
    }
}

/// Result of matching a single descriptor line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Matched(StepSignature),
    Unmatched,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

static POSITIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^method\(name:\s+'(.*?)',.* params: \[(.*?)\],.* doc:\s+'([^']*)'\)?\s*$")
        .expect("positional regex")
});

static NAMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^method\(name:\s+'(.*?)',.*namedParams: \[(.*?)\],.* doc:\s+'([^']*)'\)?\s*$")
        .expect("named regex")
});

/// One `name: '...', type: '...'` piece of a named parameter list.
static NAMED_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r".*name:\s+'(.*?)', type:\s+'(.*?)'.*").expect("named param regex")
});

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Match one descriptor line against the positional shape, then the named one.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim_start();

    if let Some(caps) = POSITIONAL_RE.captures(line) {
        return ParsedLine::Matched(StepSignature {
            name: caps[1].to_string(),
            doc: caps[3].to_string(),
            parameters: positional_params(&caps[2]),
            dialect: GrammarDialect::Positional,
        });
    }

    if let Some(caps) = NAMED_RE.captures(line) {
        return ParsedLine::Matched(StepSignature {
            name: caps[1].to_string(),
            doc: caps[3].to_string(),
            parameters: named_params(&caps[2]),
            dialect: GrammarDialect::Named,
        });
    }

    ParsedLine::Unmatched
}

fn positional_params(list: &str) -> IndexMap<String, String> {
    list.split(", ")
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().trim_matches('\'').to_string()))
        })
        .collect()
}

fn named_params(list: &str) -> IndexMap<String, String> {
    list.split(", parameter")
        .filter_map(|piece| {
            let caps = NAMED_PARAM_RE.captures(piece)?;
            Some((caps[1].to_string(), caps[2].to_string()))
        })
        .collect()
}

/// Parse a whole GDSL response into a catalog.
pub fn parse_gdsl(text: &str) -> StepCatalog {
    let mut catalog = StepCatalog::default();
    let mut skipped = 0usize;

    for line in text.lines().filter(|l| l.contains(CANDIDATE_MARKER)) {
        match parse_line(line) {
            ParsedLine::Matched(step) => catalog.insert(step),
            ParsedLine::Unmatched => {
                trace!(line, "descriptor line not recognised");
                skipped += 1;
            }
        }
    }

    debug!(steps = catalog.len(), skipped, "parsed gdsl descriptor");
    catalog
}

// ---------------------------------------------------------------------------
// StepCatalog
// ---------------------------------------------------------------------------

/// Steps keyed by name, iterated in ascending name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepCatalog {
    steps: BTreeMap<String, StepSignature>,
}

impl StepCatalog {
    /// Add a signature. An existing entry of the same name is only replaced by
    /// one with strictly more parameters.
    pub fn insert(&mut self, step: StepSignature) {
        match self.steps.get(&step.name) {
            Some(existing) if existing.parameters.len() >= step.parameters.len() => {}
            _ => {
                self.steps.insert(step.name.clone(), step);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&StepSignature> {
        self.steps.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepSignature> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FromIterator<StepSignature> for StepCatalog {
    fn from_iter<I: IntoIterator<Item = StepSignature>>(iter: I) -> Self {
        let mut catalog = Self::default();
        for step in iter {
            catalog.insert(step);
        }
        catalog
    }
}
