//! Inverse emitter: write an [`ObjectGraph`] back in the config grammar.
//!
//! Each top-level record becomes one cluster: its tag line, then one class
//! group per class separated by `||||`. Embedded values are written as
//! `|~~|` blocks placed right before the field that consumes them; a block
//! whose record itself embeds something is preceded by that record's block.
//! Chains of blocks are collected first and written innermost first, so
//! emitting does not recurse along them.

use crate::ast::{
    EMBED_SEPARATOR, FIELD_ASSIGN, INHERIT_MARKER, INHERIT_SEPARATOR, LIST_SEPARATOR, TAG_PREFIX,
};
use crate::error::{ConfError, ErrorKind};
use crate::graph::{Field, ObjectGraph, ObjectId, ObjectRecord, Value};
use crate::pass4_values::format_datetime;
use tracing::debug;

/// File name used in emitter errors; the graph has no source of its own.
const EMIT_FILE: &str = "<graph>";

pub fn emit(graph: &ObjectGraph) -> Result<String, ConfError> {
    let mut emitter = Emitter {
        graph,
        lines: Vec::new(),
    };
    for record in graph.records() {
        emitter.cluster(record)?;
    }
    debug!(lines = emitter.lines.len(), "emitted document");

    let mut out = String::new();
    for line in &emitter.lines {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

struct Emitter<'g> {
    graph: &'g ObjectGraph,
    lines: Vec<String>,
}

impl<'g> Emitter<'g> {
    fn cluster(&mut self, record: &ObjectRecord) -> Result<(), ConfError> {
        if let Some(tag) = &record.tag {
            self.lines.push(format!("{}]{}", TAG_PREFIX, tag));
        }
        let mut last_block = None;
        self.groups(record, &mut last_block, false)?;
        self.lines.push(String::new());
        Ok(())
    }

    /// Write `record`'s class groups. Inside a block every embedded field
    /// must consume the block already in `last_block`.
    fn groups(
        &mut self,
        record: &ObjectRecord,
        last_block: &mut Option<ObjectId>,
        in_block: bool,
    ) -> Result<(), ConfError> {
        if record.classes.is_empty() {
            return Err(unrepresentable(record.line, record.cluster, "record has no class"));
        }
        if let Some(stray) = record.fields.iter().find(|f| !record.has_class(&f.class)) {
            return Err(unrepresentable_field(
                record,
                stray,
                format!("class '{}' is not one of the record's classes", stray.class),
            ));
        }

        for (i, class) in record.classes.iter().enumerate() {
            if i > 0 {
                self.lines.push(INHERIT_SEPARATOR.to_owned());
            }
            let mut fields = record.fields.iter().filter(|f| &f.class == class).peekable();
            if fields.peek().is_none() {
                self.lines.push(format!("{}.{}[{{}}]", class, FIELD_ASSIGN));
                continue;
            }
            for field in fields {
                self.field(record, field, last_block, in_block)?;
            }
        }
        Ok(())
    }

    fn field(
        &mut self,
        record: &ObjectRecord,
        field: &Field,
        last_block: &mut Option<ObjectId>,
        in_block: bool,
    ) -> Result<(), ConfError> {
        let embedded = embedded_of(&field.value).map_err(|m| unrepresentable_field(record, field, m))?;
        let (spec, raw) = match embedded {
            Some((sub, listed)) => {
                if *last_block != Some(sub) {
                    if in_block {
                        return Err(unrepresentable_field(
                            record,
                            field,
                            "an embedded block can only take the block written before it",
                        ));
                    }
                    self.blocks(sub, record, field)?;
                    *last_block = Some(sub);
                }
                let spec = if listed {
                    format!("list:{}", INHERIT_MARKER)
                } else {
                    INHERIT_MARKER.to_owned()
                };
                (spec, String::new())
            }
            None => self
                .encode(&field.value)
                .map_err(|m| unrepresentable_field(record, field, m))?,
        };

        let mut line = format!("{}.{}{}[{{{}}}]", field.class, field.name, FIELD_ASSIGN, spec);
        if !raw.is_empty() {
            line.push(' ');
            line.push_str(&raw);
        }
        self.lines.push(line);
        Ok(())
    }

    /// Write the block for `id`, which `field` of `holder` consumes, preceded
    /// by the chain of blocks it embeds in turn.
    fn blocks(
        &mut self,
        id: ObjectId,
        holder: &ObjectRecord,
        field: &Field,
    ) -> Result<(), ConfError> {
        let graph = self.graph;
        let mut chain: Vec<&'g ObjectRecord> = Vec::new();
        let mut next = Some((id, holder, field));
        while let Some((id, holder, field)) = next {
            let record = graph.get(id).ok_or_else(|| {
                let message = format!("embedded record {} is not in the graph", id);
                unrepresentable_field(holder, field, message)
            })?;
            if chain.len() > graph.embedded().len() {
                return Err(unrepresentable_field(holder, field, "embedded records form a cycle"));
            }
            chain.push(record);
            next = record.fields.iter().find_map(|f| match embedded_of(&f.value) {
                Ok(Some((sub, _))) => Some((sub, record, f)),
                _ => None,
            });
        }

        let mut chained = None;
        for record in chain.into_iter().rev() {
            self.lines.push(EMBED_SEPARATOR.to_owned());
            self.groups(record, &mut chained, true)?;
            self.lines.push(EMBED_SEPARATOR.to_owned());
            chained = Some(record.id);
        }
        Ok(())
    }

    /// Type spec and raw text for a non-embedded value.
    fn encode(&self, value: &Value) -> Result<(String, String), String> {
        match value {
            Value::ObjectRef(id) => Ok(("OBJ-REF".to_owned(), self.tag_name(*id)?.to_owned())),
            Value::List(items) => self.encode_list(items),
            scalar => encode_scalar(scalar, false),
        }
    }

    fn encode_list(&self, items: &[Value]) -> Result<(String, String), String> {
        let first = items.first().ok_or("an empty list cannot be written")?;
        if items.iter().any(|v| v.kind_name() != first.kind_name()) {
            return Err("list mixes value types".to_owned());
        }

        let (spec, raws) = match first {
            Value::ObjectRef(_) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::ObjectRef(id) = item {
                        names.push(self.tag_name(*id)?.to_owned());
                    }
                }
                ("list:OBJ-REF".to_owned(), names)
            }
            _ => {
                let mut spec = String::new();
                let mut raws = Vec::with_capacity(items.len());
                for item in items {
                    let (s, raw) = encode_scalar(item, true)?;
                    spec = s;
                    raws.push(raw);
                }
                (format!("list:{}", spec), raws)
            }
        };
        Ok((spec, raws.join(LIST_SEPARATOR)))
    }

    fn tag_name(&self, id: ObjectId) -> Result<&str, String> {
        self.graph
            .tags()
            .name_of(id)
            .ok_or_else(|| format!("reference to untagged record {}", id))
    }
}

fn encode_scalar(value: &Value, in_list: bool) -> Result<(String, String), String> {
    let pair = |spec: &str, raw: String| -> Result<(String, String), String> {
        Ok((spec.to_owned(), raw))
    };
    match value {
        Value::Bool(b) => pair("bool", b.to_string()),
        Value::Int(n) => pair("int", n.to_string()),
        Value::DateTime(dt) => pair("datetime", format_datetime(dt)),
        Value::Str(s) => pair("str", encode_str(s, in_list)?),
        Value::TagRef(name) => Err(format!("unresolved tag reference '{}'", name)),
        Value::List(_) => Err("nested lists cannot be written".to_owned()),
        Value::ObjectRef(_) | Value::EmbeddedObject(_) => {
            Err(format!("{} value is not a scalar", value.kind_name()))
        }
    }
}

/// Quote strings whose text would otherwise be trimmed or mistaken for a marker.
fn encode_str(s: &str, in_list: bool) -> Result<String, String> {
    if s.contains(|c| c == '\n' || c == '\r') {
        return Err("string spans several lines".to_owned());
    }
    if s.starts_with('"') || s.ends_with('"') {
        return Err(format!("string '{}' starts or ends with a double quote", s));
    }
    if in_list && s.contains(LIST_SEPARATOR) {
        return Err(format!("list element '{}' contains '{}'", s, LIST_SEPARATOR));
    }
    if s != s.trim() || s == INHERIT_MARKER {
        return Ok(format!("\"{}\"", s));
    }
    Ok(s.to_owned())
}

/// The embedded record held by `value` and whether it sits in a list.
fn embedded_of(value: &Value) -> Result<Option<(ObjectId, bool)>, String> {
    match value {
        Value::EmbeddedObject(id) => Ok(Some((*id, false))),
        Value::List(items) if items.iter().any(|v| matches!(v, Value::EmbeddedObject(_))) => {
            match items.as_slice() {
                [Value::EmbeddedObject(id)] => Ok(Some((*id, true))),
                _ => Err("a list can hold at most one embedded object".to_owned()),
            }
        }
        _ => Ok(None),
    }
}

fn unrepresentable(line: u32, cluster: usize, message: impl Into<String>) -> ConfError {
    ConfError::new(6, ErrorKind::Unrepresentable, EMIT_FILE, line, message).in_cluster(cluster)
}

fn unrepresentable_field(
    record: &ObjectRecord,
    field: &Field,
    message: impl Into<String>,
) -> ConfError {
    unrepresentable(field.line, record.cluster, message)
        .on_field(format!("{}.{}", field.class, field.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{convert_str, ParseOptions};
    use crate::graph::TagTable;

    fn parse(src: &str) -> ObjectGraph {
        convert_str(src, "t.conf", &ParseOptions::default()).unwrap()
    }

    fn round_trip(src: &str) -> (ObjectGraph, String, ObjectGraph) {
        let first = parse(src);
        let text = emit(&first).unwrap();
        let second = convert_str(&text, "emitted.conf", &ParseOptions::default())
            .unwrap_or_else(|e| panic!("re-parse failed: {}\n{}", e, text));
        (first, text, second)
    }

    #[test]
    fn writes_canonical_cluster() {
        let text = emit(&parse(
            "[{OBJ-TAG}t\ncore_Trace.[==][{}]\n||||\npropbundle_File.size[==][{int}]   10\n",
        ))
        .unwrap();
        assert_eq!(
            text,
            "[{OBJ-TAG}]t\ncore_Trace.[==][{}]\n||||\npropbundle_File.size[==][{int}] 10\n\n"
        );
    }

    #[test]
    fn flat_documents_round_trip() {
        let src = "\
[{OBJ-TAG}]tool
core_Tool.name[==][{str}] \"  padded  \"
core_Tool.version[==][{int}] 3

core_Trace.tool[==][{OBJ-REF}] tool
core_Trace.files[==][{list:str}] a.raw[ | ]b.raw
core_Trace.flags[==][{list:bool}] true[ | ]False
core_Trace.when[==][{datetime}] 2021-01-02T03:04:05.5Z
core_Trace.odd[==][{str}] \"|^^|\"
";
        let (first, _, second) = round_trip(src);
        assert!(first.structurally_eq(&second));
    }

    #[test]
    fn chained_embedded_blocks_round_trip() {
        let src = "\
|~~|
inner.v[==][{int}] 1
|~~|
|~~|
middle.child[==][{|^^|}]
|~~|
outer.child[==][{|^^|}]
outer.again[==][{list:|^^|}]
";
        let (first, text, second) = round_trip(src);
        assert!(first.structurally_eq(&second), "{}", text);
        assert!(second.diagnostics().is_empty());
    }

    #[test]
    fn reference_to_untagged_record_is_unrepresentable() {
        let mut graph = parse("a.x[==][{int}] 1\n\nb.y[==][{int}] 2\n");
        graph.records[1].fields[0].value = Value::ObjectRef(ObjectId(0));
        let err = emit(&graph).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unrepresentable);
        assert_eq!(err.field.as_deref(), Some("b.y"));
    }

    #[test]
    fn empty_and_mixed_lists_are_unrepresentable() {
        let mut graph = parse("a.x[==][{int}] 1\n");
        graph.records[0].fields[0].value = Value::List(Vec::new());
        assert!(emit(&graph).is_err());
        graph.records[0].fields[0].value = Value::List(vec![Value::Int(1), Value::Bool(true)]);
        let err = emit(&graph).unwrap_err();
        assert!(err.message.contains("mixes"));
    }

    #[test]
    fn unresolved_placeholder_is_unrepresentable() {
        let mut record = ObjectRecord::new(ObjectId(0), 0, 1);
        record.add_class("a");
        record.set_field(Field {
            name: "r".into(),
            class: "a".into(),
            value: Value::TagRef("t".into()),
            line: 1,
        });
        let graph = ObjectGraph::new(vec![record], Vec::new(), TagTable::new(), Vec::new());
        assert_eq!(emit(&graph).unwrap_err().kind, ErrorKind::Unrepresentable);
    }

    #[test]
    fn missing_embedded_record_is_unrepresentable() {
        let mut graph = parse("|~~|\nh.v[==][{int}] 1\n|~~|\nt.hash[==][{|^^|}]\n");
        graph.records[0].fields[0].value = Value::EmbeddedObject(ObjectId(40));
        let err = emit(&graph).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unrepresentable);
        assert_eq!(err.field.as_deref(), Some("t.hash"));
        assert!(err.message.contains("#40"));
    }

    #[test]
    fn embedding_cycle_is_unrepresentable() {
        let mut graph = parse("|~~|\nh.v[==][{int}] 1\n|~~|\nt.hash[==][{|^^|}]\n");
        graph.embedded[0].fields[0].value = Value::EmbeddedObject(ObjectId(0));
        let err = emit(&graph).unwrap_err();
        assert!(err.message.contains("cycle"), "{}", err.message);
    }

    #[test]
    fn empty_graph_emits_nothing() {
        assert_eq!(emit(&ObjectGraph::default()).unwrap(), "");
    }
}
