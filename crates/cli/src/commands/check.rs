use std::path::Path;
use std::process;

use crate::commands::{load_graph, report_conf_error};
use crate::config::Settings;
use crate::OutputFormat;

pub(crate) fn cmd_check(file: &Path, settings: &Settings, output: OutputFormat, quiet: bool) {
    let graph = match load_graph(file, settings) {
        Ok(g) => g,
        Err(e) => {
            report_conf_error(&e, output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "file": file.display().to_string(),
                "records": graph.records().len(),
                "tags": graph.tags().len(),
                "diagnostics": graph
                    .diagnostics()
                    .iter()
                    .map(|d| d.to_json_value())
                    .collect::<Vec<_>>(),
            });
            let json = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            for d in graph.diagnostics() {
                println!(
                    "warning: {}:{}: {}: {}",
                    file.display(),
                    d.line,
                    d.kind.as_str(),
                    d.message
                );
            }
            println!(
                "{}: ok ({} records, {} tags, {} warnings)",
                file.display(),
                graph.records().len(),
                graph.tags().len(),
                graph.diagnostics().len()
            );
        }
    }
}
