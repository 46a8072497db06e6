//! Pass 6: structural JSON dump of an [`ObjectGraph`].
//!
//! This is a debugging and conformance format, not linked data: records in
//! source order, typed values, references as record ids. Embedded records
//! are listed flat under `embedded` and named from their field by id, so the
//! document depth does not grow with embedding depth. Keys inside every
//! object come out sorted (serde_json's default map).

use crate::graph::{Field, ObjectGraph, ObjectRecord, Value};
use crate::pass4_values::format_datetime;
use serde_json::{json, Map, Value as Json};

pub fn serialize(graph: &ObjectGraph) -> Json {
    let records: Vec<Json> = graph.records().iter().map(serialize_record).collect();

    let mut tags = Map::new();
    for (name, entry) in graph.tags().iter() {
        tags.insert(name.to_owned(), json!(entry.id.0));
    }

    let mut doc = Map::new();
    doc.insert("records".to_owned(), Json::Array(records));
    doc.insert("tags".to_owned(), Json::Object(tags));
    if !graph.embedded().is_empty() {
        doc.insert(
            "embedded".to_owned(),
            Json::Array(graph.embedded().iter().map(serialize_record).collect()),
        );
    }
    if !graph.diagnostics().is_empty() {
        doc.insert(
            "diagnostics".to_owned(),
            Json::Array(
                graph
                    .diagnostics()
                    .iter()
                    .map(|d| d.to_json_value())
                    .collect(),
            ),
        );
    }
    Json::Object(doc)
}

pub fn serialize_record(record: &ObjectRecord) -> Json {
    json!({
        "id": record.id.0,
        "classes": record.classes,
        "tag": record.tag,
        "line": record.line,
        "fields": record.fields.iter().map(serialize_field).collect::<Vec<_>>(),
    })
}

fn serialize_field(field: &Field) -> Json {
    json!({
        "name": field.name,
        "class": field.class,
        "value": serialize_value(&field.value),
    })
}

pub fn serialize_value(value: &Value) -> Json {
    match value {
        Value::Bool(b) => json!({ "type": "bool", "value": b }),
        Value::Str(s) => json!({ "type": "str", "value": s }),
        Value::Int(n) => json!({ "type": "int", "value": n }),
        Value::DateTime(dt) => json!({ "type": "datetime", "value": format_datetime(dt) }),
        Value::List(items) => json!({
            "type": "list",
            "items": items.iter().map(serialize_value).collect::<Vec<_>>(),
        }),
        // Only visible when serializing a graph that skipped pass 5.
        Value::TagRef(name) => json!({ "type": "tag-ref", "tag": name }),
        Value::ObjectRef(id) => json!({ "type": "ref", "id": id.0 }),
        Value::EmbeddedObject(id) => json!({ "type": "object", "id": id.0 }),
    }
}
