//! Pass 5: replace `OBJ-REF` tag placeholders with record identifiers.
//!
//! Runs once every cluster has been built, so forward references are legal.
//! Already-resolved references are left alone, which makes the pass safe to
//! run again after the graph changes.
//!
//! Embedded records live in their own arena and are resolved as a separate
//! slice, so the pass never descends through embedding.

use crate::error::{ConfError, ErrorKind};
use crate::graph::{ObjectRecord, TagTable, Value};
use tracing::debug;

pub fn resolve_references(
    records: &mut [ObjectRecord],
    tags: &TagTable,
    filename: &str,
) -> Result<(), ConfError> {
    let mut resolved = 0usize;
    for record in records.iter_mut() {
        resolve_record(record, tags, filename, &mut resolved)?;
    }
    debug!(resolved, tags = tags.len(), "resolved references");
    Ok(())
}

fn resolve_record(
    record: &mut ObjectRecord,
    tags: &TagTable,
    filename: &str,
    resolved: &mut usize,
) -> Result<(), ConfError> {
    let cluster = record.cluster;
    for field in &mut record.fields {
        resolve_value(&mut field.value, tags, resolved).map_err(|name| {
            ConfError::new(
                5,
                ErrorKind::UndefinedTagReference,
                filename,
                field.line,
                format!("reference to undefined tag '{}'", name),
            )
            .in_cluster(cluster)
            .on_field(format!("{}.{}", field.class, field.name))
        })?;
    }
    Ok(())
}

/// Resolve placeholders in `value`. Fails with the undefined tag name.
fn resolve_value(value: &mut Value, tags: &TagTable, resolved: &mut usize) -> Result<(), String> {
    match value {
        Value::TagRef(name) => {
            let id = tags.lookup(name).ok_or_else(|| name.clone())?;
            *value = Value::ObjectRef(id);
            *resolved += 1;
            Ok(())
        }
        Value::List(items) => items
            .iter_mut()
            .try_for_each(|item| resolve_value(item, tags, resolved)),
        _ => Ok(()),
    }
}
