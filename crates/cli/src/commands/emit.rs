use std::path::Path;
use std::process;

use crate::commands::{load_graph, report_conf_error};
use crate::config::Settings;
use crate::OutputFormat;

pub(crate) fn cmd_emit(file: &Path, settings: &Settings, output: OutputFormat, quiet: bool) {
    let text = match load_graph(file, settings).and_then(|g| caseconf_core::emit(&g)) {
        Ok(text) => text,
        Err(e) => {
            report_conf_error(&e, output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Text => print!("{}", text),
        OutputFormat::Json => {
            let json = serde_json::json!({ "document": text });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}
