pub(crate) mod check;
pub(crate) mod emit;
pub(crate) mod parse;
pub(crate) mod tree;

use std::path::Path;

use caseconf_core::{
    apply_assignments, convert_with_provider, ConfError, FileSystemProvider, ObjectGraph,
};

use crate::config::Settings;
use crate::OutputFormat;

/// Convert `file` and apply the configured assignments.
pub(crate) fn load_graph(file: &Path, settings: &Settings) -> Result<ObjectGraph, ConfError> {
    let mut graph = convert_with_provider(file, &FileSystemProvider, &settings.options)?;
    apply_assignments(&mut graph, &settings.assignments)?;
    Ok(graph)
}

/// Print a conversion error as its JSON record on stderr.
pub(crate) fn report_conf_error(e: &ConfError, output: OutputFormat, quiet: bool) {
    if output == OutputFormat::Text && quiet {
        return;
    }
    let err_json = serde_json::to_string_pretty(&e.to_json_value())
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", e));
    eprintln!("{}", err_json);
}
