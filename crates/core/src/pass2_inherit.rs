//! Pass 2: inheritance chains.
//!
//! `||||` splits an object's lines into class groups. The groups merge into
//! one record: the class list is every group's class in order, the field
//! set is the union of all groups with later groups overriding earlier ones.

use crate::ast::{FieldDecl, RawLine, INHERIT_SEPARATOR};
use crate::convert::ParseOptions;
use crate::error::{ConfError, Diagnostic, DiagnosticKind, ErrorKind};
use crate::graph::{Field, IdAllocator, ObjectRecord, Value};
use crate::pass1_cluster::Cluster;
use crate::pass3_embed::{self, Committed, GroupItem};
use crate::pass4_values;
use tracing::{debug, warn};

/// Per-document state shared by passes 2-4.
#[derive(Debug)]
pub struct BuildCtx<'a> {
    pub filename: &'a str,
    pub options: &'a ParseOptions,
    /// Index of the cluster being built.
    pub cluster: usize,
    pub ids: IdAllocator,
    /// Arena of committed embedded records, in id order.
    pub embedded: Vec<ObjectRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> BuildCtx<'a> {
    pub fn new(filename: &'a str, options: &'a ParseOptions, ids: IdAllocator) -> Self {
        BuildCtx {
            filename,
            options,
            cluster: 0,
            ids,
            embedded: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// Fields between two separators, all of one class.
#[derive(Debug)]
struct ClassGroup {
    class: String,
    fields: Vec<(FieldDecl, Option<Value>)>,
}

/// Build the top-level record of one cluster.
pub fn build_cluster_record(
    cluster: &Cluster<'_>,
    ctx: &mut BuildCtx<'_>,
) -> Result<ObjectRecord, ConfError> {
    ctx.cluster = cluster.index;
    let mut last: Option<Committed> = None;
    let record = build_record(cluster.body(), cluster.first_line(), &mut last, ctx)?;
    if let Some(committed) = &last {
        pass3_embed::report_unused(committed, ctx);
    }
    debug!(
        cluster = cluster.index,
        id = %record.id,
        classes = ?record.classes,
        fields = record.fields.len(),
        "built record"
    );
    Ok(record)
}

/// Build one record from its lines: take out embedded blocks, then merge the
/// class groups that remain.
pub fn build_record<'a, I>(
    lines: I,
    line: u32,
    last: &mut Option<Committed>,
    ctx: &mut BuildCtx<'_>,
) -> Result<ObjectRecord, ConfError>
where
    I: IntoIterator<Item = &'a RawLine>,
{
    let items = pass3_embed::resolve_blocks(lines, last, ctx)?;
    let groups = split_groups(items, line, ctx)?;
    merge_groups(groups, line, ctx)
}

fn split_groups(
    items: Vec<GroupItem>,
    line: u32,
    ctx: &BuildCtx<'_>,
) -> Result<Vec<ClassGroup>, ConfError> {
    let malformed = |line: u32, msg: String| {
        ConfError::malformed(2, ctx.filename, line, msg).in_cluster(ctx.cluster)
    };

    if items.is_empty() {
        return Err(malformed(line, "no field declarations for this object".to_owned()));
    }

    let mut groups: Vec<ClassGroup> = Vec::new();
    let mut current: Option<ClassGroup> = None;
    let mut last_separator: Option<u32> = None;

    for item in items {
        match item {
            GroupItem::Separator { line } => {
                let group = current.take().ok_or_else(|| {
                    malformed(
                        line,
                        format!("'{}' has no class group before it", INHERIT_SEPARATOR),
                    )
                })?;
                groups.push(group);
                last_separator = Some(line);
            }
            GroupItem::Field { decl, embedded } => {
                let group = current.get_or_insert_with(|| ClassGroup {
                    class: decl.class.clone(),
                    fields: Vec::new(),
                });
                if group.class != decl.class {
                    return Err(malformed(
                        decl.line,
                        format!(
                            "class '{}' starts without '{}' after class '{}'",
                            decl.class, INHERIT_SEPARATOR, group.class
                        ),
                    )
                    .on_field(decl.qualified_name()));
                }
                group.fields.push((decl, embedded));
            }
        }
    }

    match current {
        Some(group) => groups.push(group),
        None => {
            let sep = last_separator.unwrap_or(line);
            return Err(malformed(
                sep,
                format!("'{}' has no class group after it", INHERIT_SEPARATOR),
            ));
        }
    }
    Ok(groups)
}

fn merge_groups(
    groups: Vec<ClassGroup>,
    line: u32,
    ctx: &mut BuildCtx<'_>,
) -> Result<ObjectRecord, ConfError> {
    let mut record = ObjectRecord::new(ctx.ids.allocate(), ctx.cluster, line);

    for group in groups {
        record.add_class(&group.class);
        for (decl, embedded) in group.fields {
            if decl.is_class_only() {
                continue;
            }
            let value = match embedded {
                Some(v) => v,
                None => pass4_values::decode_field(&decl, ctx.filename)
                    .map_err(|e| e.in_cluster(ctx.cluster))?,
            };
            let replaced = record.set_field(Field {
                name: decl.property.clone(),
                class: decl.class.clone(),
                value,
                line: decl.line,
            });
            if let Some(previous) = replaced {
                conflict(&previous, &decl, ctx)?;
            }
        }
    }

    Ok(record)
}

fn conflict(previous: &Field, decl: &FieldDecl, ctx: &mut BuildCtx<'_>) -> Result<(), ConfError> {
    let message = format!(
        "property '{}' from class '{}' (line {}) is overridden by class '{}'",
        decl.property, previous.class, previous.line, decl.class
    );
    if ctx.options.strict_merge {
        return Err(ConfError::new(
            2,
            ErrorKind::MergeConflict,
            ctx.filename,
            decl.line,
            message,
        )
        .in_cluster(ctx.cluster)
        .on_field(decl.qualified_name()));
    }
    warn!(cluster = ctx.cluster, line = decl.line, "{}", message);
    ctx.diagnostics.push(Diagnostic {
        kind: DiagnosticKind::MergeConflict,
        cluster: ctx.cluster,
        line: decl.line,
        message,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::classify;
    use crate::pass1_cluster::split_clusters;

    fn build(src: &str, options: &ParseOptions) -> Result<(ObjectRecord, Vec<Diagnostic>), ConfError> {
        let lines = classify(src, "t.conf").unwrap();
        let cluster = split_clusters(&lines).next().unwrap();
        let mut ctx = BuildCtx::new("t.conf", options, IdAllocator::new());
        let record = build_cluster_record(&cluster, &mut ctx)?;
        Ok((record, ctx.diagnostics))
    }

    #[test]
    fn merges_chain_most_general_first() {
        let src = "\
core_Trace.has_changed[==][{bool}] true
||||
propbundle_Device.manufacturer[==][{str}] Acme
";
        let (record, diags) = build(src, &ParseOptions::default()).unwrap();
        assert_eq!(record.classes, vec!["core_Trace", "propbundle_Device"]);
        assert_eq!(record.get("has_changed"), Some(&Value::Bool(true)));
        assert_eq!(record.get("manufacturer"), Some(&Value::Str("Acme".into())));
        assert_eq!(record.field("manufacturer").unwrap().class, "propbundle_Device");
        assert!(diags.is_empty());
    }

    #[test]
    fn property_less_group_contributes_its_class() {
        let src = "core_Trace.[==][{}]\n||||\npropbundle_File.size[==][{int}] 3\n";
        let (record, _) = build(src, &ParseOptions::default()).unwrap();
        assert_eq!(record.classes, vec!["core_Trace", "propbundle_File"]);
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn later_group_wins_and_is_flagged() {
        let src = "a.name[==][{str}] first\n||||\nb.name[==][{str}] second\n";
        let (record, diags) = build(src, &ParseOptions::default()).unwrap();
        assert_eq!(record.get("name"), Some(&Value::Str("second".into())));
        assert_eq!(record.field("name").unwrap().class, "b");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::MergeConflict);
        assert_eq!(diags[0].line, 3);
    }

    #[test]
    fn strict_merge_turns_conflicts_into_errors() {
        let src = "a.name[==][{str}] first\n||||\nb.name[==][{str}] second\n";
        let options = ParseOptions {
            strict_merge: true,
            ..ParseOptions::default()
        };
        let err = build(src, &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MergeConflict);
        assert_eq!(err.field.as_deref(), Some("b.name"));
    }

    #[test]
    fn mixing_classes_without_separator_is_malformed() {
        let err = build("a.x[==][{int}] 1\nb.y[==][{int}] 2\n", &ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedDocument);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn dangling_separators_are_malformed() {
        let leading = build("||||\na.x[==][{int}] 1\n", &ParseOptions::default()).unwrap_err();
        assert_eq!(leading.kind, ErrorKind::MalformedDocument);
        assert_eq!(leading.line, 1);
        let trailing = build("a.x[==][{int}] 1\n||||\n", &ParseOptions::default()).unwrap_err();
        assert_eq!(trailing.line, 2);
        assert!(trailing.message.contains("after it"));
    }

    #[test]
    fn decode_errors_carry_the_cluster() {
        let err = build("a.x[==][{int}] nope\n", &ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DecodeError);
        assert_eq!(err.cluster, Some(0));
    }

    #[test]
    fn embedded_ids_precede_the_parent() {
        let src = "|~~|\nsub.v[==][{int}] 1\n|~~|\ntop.child[==][{|^^|}]\n";
        let (record, _) = build(src, &ParseOptions::default()).unwrap();
        match record.get("child") {
            Some(Value::EmbeddedObject(sub)) => assert!(*sub < record.id),
            other => panic!("expected embedded object, got {:?}", other),
        }
    }
}
