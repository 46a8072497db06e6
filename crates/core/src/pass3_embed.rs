//! Pass 3: embedded blocks.
//!
//! A `|~~|` pair fences a sub-object. The first separator starts collecting
//! lines, the second commits them: the collected lines are built into a
//! record (through pass 2, so they may carry their own inheritance chain)
//! moved into the context's arena, and become the block every later inherit
//! marker refers to by id. Blocks do not
//! nest lexically; a marker inside a block refers to the block committed
//! before it opened, which is how deeper embedding is written.

use crate::ast::{FieldDecl, LineKind, RawLine, EMBED_SEPARATOR};
use crate::error::{ConfError, Diagnostic, DiagnosticKind, ErrorKind};
use crate::graph::{ObjectId, Value};
use crate::pass2_inherit::{self, BuildCtx};
use tracing::{debug, warn};

/// What is left of a line sequence once blocks are taken out.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupItem {
    Separator {
        line: u32,
    },
    Field {
        decl: FieldDecl,
        /// Set for inherit-marker fields; everything else is decoded in pass 2.
        embedded: Option<Value>,
    },
}

/// The most recently committed block. Its record is in `BuildCtx::embedded`.
#[derive(Debug)]
pub struct Committed {
    pub id: ObjectId,
    pub open_line: u32,
    pub used: bool,
}

#[derive(Debug)]
enum BlockState<'a> {
    Outside,
    Collecting {
        open_line: u32,
        lines: Vec<&'a RawLine>,
    },
    Committing {
        open_line: u32,
        close_line: u32,
        lines: Vec<&'a RawLine>,
    },
}

impl<'a> BlockState<'a> {
    /// Feed one line. Field and separator lines seen while outside a block
    /// are pushed to `items`.
    fn step(self, raw: &'a RawLine, items: &mut Vec<GroupItem>) -> BlockState<'a> {
        match (self, &raw.kind) {
            (BlockState::Outside, LineKind::EmbedSeparator) => BlockState::Collecting {
                open_line: raw.line,
                lines: Vec::new(),
            },
            (BlockState::Outside, LineKind::InheritSeparator) => {
                items.push(GroupItem::Separator { line: raw.line });
                BlockState::Outside
            }
            (BlockState::Outside, LineKind::Field(decl)) => {
                items.push(GroupItem::Field {
                    decl: decl.clone(),
                    embedded: None,
                });
                BlockState::Outside
            }
            (BlockState::Outside, _) => BlockState::Outside,
            (BlockState::Collecting { open_line, lines }, LineKind::EmbedSeparator) => {
                BlockState::Committing {
                    open_line,
                    close_line: raw.line,
                    lines,
                }
            }
            (BlockState::Collecting { open_line, mut lines }, _) => {
                lines.push(raw);
                BlockState::Collecting { open_line, lines }
            }
            // Committing is resolved by the driver before the next line.
            (state @ BlockState::Committing { .. }, _) => state,
        }
    }
}

/// Run the block state machine over `lines`.
///
/// Inherit-marker fields are resolved on the spot against `last`, which is
/// replaced each time a block commits. The caller owns `last` so that a
/// nested call (building a block's own record) sees the block before it.
pub fn resolve_blocks<'a, I>(
    lines: I,
    last: &mut Option<Committed>,
    ctx: &mut BuildCtx<'_>,
) -> Result<Vec<GroupItem>, ConfError>
where
    I: IntoIterator<Item = &'a RawLine>,
{
    let mut items = Vec::new();
    let mut state = BlockState::Outside;

    for raw in lines {
        let before = items.len();
        state = state.step(raw, &mut items);

        if let BlockState::Committing {
            open_line,
            close_line,
            lines,
        } = state
        {
            commit(open_line, close_line, lines, last, ctx)?;
            state = BlockState::Outside;
        }

        // A field just pushed outside a block may need the committed record.
        if items.len() > before {
            if let Some(GroupItem::Field { decl, embedded }) = items.last_mut() {
                if decl.is_embedding_site() {
                    *embedded = Some(inherit(decl, last, ctx)?);
                }
            }
        }
    }

    if let BlockState::Collecting { open_line, .. } = state {
        return Err(ConfError::new(
            3,
            ErrorKind::EmbeddedBlockError,
            ctx.filename,
            open_line,
            format!("embedded block opened with '{}' is never closed", EMBED_SEPARATOR),
        )
        .in_cluster(ctx.cluster));
    }

    Ok(items)
}

fn commit(
    open_line: u32,
    close_line: u32,
    lines: Vec<&RawLine>,
    last: &mut Option<Committed>,
    ctx: &mut BuildCtx<'_>,
) -> Result<(), ConfError> {
    if !lines.iter().any(|l| matches!(l.kind, LineKind::Field(_))) {
        return Err(ConfError::new(
            3,
            ErrorKind::EmbeddedBlockError,
            ctx.filename,
            open_line,
            format!(
                "embedded block at lines {}-{} declares no fields",
                open_line, close_line
            ),
        )
        .in_cluster(ctx.cluster));
    }

    let record = pass2_inherit::build_record(lines, open_line, last, ctx)?;
    let id = record.id;
    debug!(
        cluster = ctx.cluster,
        open_line,
        close_line,
        id = %id,
        "committed embedded block"
    );
    ctx.embedded.push(record);

    if let Some(previous) = last.take() {
        report_unused(&previous, ctx);
    }
    *last = Some(Committed {
        id,
        open_line,
        used: false,
    });
    Ok(())
}

fn inherit(
    decl: &FieldDecl,
    last: &mut Option<Committed>,
    ctx: &BuildCtx<'_>,
) -> Result<Value, ConfError> {
    let committed = last.as_mut().ok_or_else(|| {
        ConfError::new(
            3,
            ErrorKind::EmbeddedBlockError,
            ctx.filename,
            decl.line,
            format!(
                "inherit marker on '{}' has no committed embedded block above it",
                decl.qualified_name()
            ),
        )
        .in_cluster(ctx.cluster)
        .on_field(decl.qualified_name())
    })?;
    committed.used = true;

    let object = Value::EmbeddedObject(committed.id);
    if decl.type_tag.is_list() {
        Ok(Value::List(vec![object]))
    } else {
        Ok(object)
    }
}

/// Record a diagnostic if `committed` was never consumed by a marker, and
/// drop its record from the arena.
pub fn report_unused(committed: &Committed, ctx: &mut BuildCtx<'_>) {
    if committed.used {
        return;
    }
    if let Ok(i) = ctx.embedded.binary_search_by_key(&committed.id, |r| r.id) {
        ctx.embedded.remove(i);
    }
    let message = format!(
        "embedded block opened at line {} is never referenced by an inherit marker",
        committed.open_line
    );
    warn!(cluster = ctx.cluster, "{}", message);
    ctx.diagnostics.push(Diagnostic {
        kind: DiagnosticKind::UnusedEmbeddedBlock,
        cluster: ctx.cluster,
        line: committed.open_line,
        message,
    });
}
