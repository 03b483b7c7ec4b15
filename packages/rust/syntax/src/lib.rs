//! Pipeline reference catalogs scraped from Jenkins.
//!
//! - [`gdsl`]: step signatures recovered from the `pipeline-syntax/gdsl` descriptor
//! - [`globals`]: global variables from the `pipeline-syntax/globals` HTML page

pub mod gdsl;
pub mod globals;

pub use gdsl::{GrammarDialect, ParsedLine, StepCatalog, StepSignature, parse_gdsl, parse_line};
pub use globals::{GlobalVar, parse_globals_html};
