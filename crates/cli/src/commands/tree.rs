//! Indented text rendering of a graph, built on [`GraphVisitor`].

use std::path::Path;
use std::process;

use caseconf_core::pass4_values::format_datetime;
use caseconf_core::{Field, GraphVisitor, ObjectGraph, ObjectRecord, Value};

use crate::commands::{load_graph, report_conf_error};
use crate::config::Settings;
use crate::OutputFormat;

pub(crate) fn cmd_tree(file: &Path, settings: &Settings, output: OutputFormat, quiet: bool) {
    match load_graph(file, settings) {
        Ok(graph) => match output {
            OutputFormat::Text => print!("{}", render_tree(&graph)),
            OutputFormat::Json => {
                let lines: Vec<String> = render_tree(&graph).lines().map(str::to_owned).collect();
                let json = serde_json::json!({ "tree": lines });
                println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            }
        },
        Err(e) => {
            report_conf_error(&e, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn render_tree(graph: &ObjectGraph) -> String {
    let mut renderer = TreeRenderer::default();
    graph.walk(&mut renderer);
    renderer.out
}

#[derive(Default)]
struct TreeRenderer {
    out: String,
}

impl TreeRenderer {
    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

impl GraphVisitor for TreeRenderer {
    fn enter_record(&mut self, record: &ObjectRecord, depth: usize) {
        let mut text = format!("{} {}", record.id, record.classes.join(" |||| "));
        if let Some(tag) = &record.tag {
            text.push_str(&format!(" [{}]", tag));
        }
        self.line(depth * 4, &text);
    }

    fn visit_field(&mut self, _owner: &ObjectRecord, field: &Field, depth: usize) {
        let indent = depth * 4 + 2;
        match &field.value {
            v if holds_records(v) => self.line(indent, &format!("{}:", field.name)),
            // References are printed by visit_reference, one per target.
            v if holds_references(v) => {}
            v => self.line(indent, &format!("{} = {}", field.name, scalar_text(v))),
        }
    }

    fn visit_reference(&mut self, field: &Field, target: Option<&ObjectRecord>, depth: usize) {
        let text = match target {
            Some(t) => match &t.tag {
                Some(tag) => format!("{} -> {} [{}]", field.name, t.id, tag),
                None => format!("{} -> {}", field.name, t.id),
            },
            None => format!("{} -> (missing)", field.name),
        };
        self.line(depth * 4 + 2, &text);
    }
}

fn holds_records(value: &Value) -> bool {
    match value {
        Value::EmbeddedObject(_) => true,
        Value::List(items) => items.iter().any(holds_records),
        _ => false,
    }
}

fn holds_references(value: &Value) -> bool {
    match value {
        Value::ObjectRef(_) => true,
        Value::List(items) => !items.is_empty() && items.iter().all(holds_references),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Str(s) => format!("{:?}", s),
        Value::DateTime(dt) => format_datetime(dt),
        Value::List(items) => format!(
            "[{}]",
            items.iter().map(scalar_text).collect::<Vec<_>>().join(", ")
        ),
        Value::TagRef(name) => format!("<{}>", name),
        Value::ObjectRef(id) => id.to_string(),
        Value::EmbeddedObject(id) => id.to_string(),
    }
}
