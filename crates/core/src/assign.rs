//! Pre-built `key=value` assignments applied on top of a converted graph.
//!
//! Tool front ends hand over flag values already mapped to
//! `Class.property[==][{spec}]=value` strings. They go through the same
//! classifier and decoders as document lines.

use crate::ast::{FieldDecl, FIELD_ASSIGN};
use crate::error::{ConfError, ErrorKind};
use crate::graph::{Field, IdAllocator, ObjectGraph, ObjectRecord};
use crate::lexer;
use crate::pass4_values;
use crate::pass5_refs;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// File name used in errors about assignments.
pub const ASSIGN_FILE: &str = "<assign>";

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub decl: FieldDecl,
}

impl Assignment {
    /// Parse `Class.property[==][{spec}]=value`, or `Class.property=value`
    /// for a `str` field.
    pub fn parse(text: &str) -> Result<Assignment, ConfError> {
        let text = text.trim();
        let line = match text.find(FIELD_ASSIGN) {
            Some(at) => {
                let spec_end = text[at..].find("}]").map(|i| at + i + 2).ok_or_else(|| {
                    ConfError::classify(ASSIGN_FILE, 0, format!("unterminated type spec in '{}'", text))
                })?;
                let value = text[spec_end..].strip_prefix('=').ok_or_else(|| {
                    ConfError::classify(
                        ASSIGN_FILE,
                        0,
                        format!("expected '=' after the type spec in '{}'", text),
                    )
                })?;
                format!("{} {}", &text[..spec_end], value)
            }
            None => {
                let (key, value) = text.split_once('=').ok_or_else(|| {
                    ConfError::classify(
                        ASSIGN_FILE,
                        0,
                        format!("expected 'Class.property=value', got '{}'", text),
                    )
                })?;
                format!("{}{}[{{str}}] {}", key.trim(), FIELD_ASSIGN, value)
            }
        };

        let decl = lexer::classify_field(&line, 0, ASSIGN_FILE)?;
        if decl.is_class_only() {
            return Err(ConfError::classify(
                ASSIGN_FILE,
                0,
                format!("assignment '{}' names no property", text),
            )
            .on_field(decl.qualified_name()));
        }
        if decl.is_embedding_site() {
            return Err(ConfError::new(
                3,
                ErrorKind::EmbeddedBlockError,
                ASSIGN_FILE,
                0,
                format!("assignment '{}' cannot use an inherit marker", text),
            )
            .on_field(decl.qualified_name()));
        }
        Ok(Assignment { decl })
    }
}

impl FromStr for Assignment {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Assignment::parse(s)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}[{{{}}}]={}",
            self.decl.qualified_name(),
            FIELD_ASSIGN,
            self.decl.type_tag,
            self.decl.raw_value
        )
    }
}

/// Apply `assignments` in order.
///
/// Every top-level record carrying the assignment's class gets the property
/// (later assignments win). Classes the document never mentions are
/// collected into new top-level records appended in first-seen order. On
/// error the graph is left untouched.
pub fn apply_assignments(
    graph: &mut ObjectGraph,
    assignments: &[Assignment],
) -> Result<(), ConfError> {
    if assignments.is_empty() {
        return Ok(());
    }

    let mut records = graph.records.clone();
    let mut ids = IdAllocator::after(graph);
    let first_new_cluster = records.last().map_or(0, |r| r.cluster + 1);
    let mut added: Vec<ObjectRecord> = Vec::new();

    for assignment in assignments {
        let decl = &assignment.decl;
        let field = Field {
            name: decl.property.clone(),
            class: decl.class.clone(),
            value: pass4_values::decode_field(decl, ASSIGN_FILE)?,
            line: decl.line,
        };

        let mut matched = 0usize;
        for record in records.iter_mut().filter(|r| r.has_class(&decl.class)) {
            record.set_field(field.clone());
            matched += 1;
        }
        if matched > 0 {
            debug!(field = %decl.qualified_name(), records = matched, "assigned");
            continue;
        }

        match added.iter_mut().find(|r| r.has_class(&decl.class)) {
            Some(record) => {
                record.set_field(field);
            }
            None => {
                let mut record =
                    ObjectRecord::new(ids.allocate(), first_new_cluster + added.len(), 0);
                record.add_class(&decl.class);
                record.set_field(field);
                debug!(class = %decl.class, id = %record.id, "assignment created record");
                added.push(record);
            }
        }
    }

    records.extend(added);
    pass5_refs::resolve_references(&mut records, &graph.tags, ASSIGN_FILE)?;
    graph.records = records;
    Ok(())
}
