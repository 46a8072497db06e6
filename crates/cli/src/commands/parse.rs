use std::path::Path;
use std::process;

use crate::commands::{load_graph, report_conf_error};
use crate::config::Settings;
use crate::OutputFormat;

pub(crate) fn cmd_parse(file: &Path, settings: &Settings, output: OutputFormat, quiet: bool) {
    match load_graph(file, settings) {
        Ok(graph) => {
            let dump = caseconf_core::serialize(&graph);
            let pretty = serde_json::to_string_pretty(&dump)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        Err(e) => {
            report_conf_error(&e, output, quiet);
            process::exit(1);
        }
    }
}
