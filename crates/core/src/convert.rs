//! Document converter: CASE/NLG config text -> [`ObjectGraph`].
//!
//! This is a thin orchestrator that calls each pass module in order.
//! Passes 0-4 run cluster by cluster in document order; pass 5 runs once
//! every cluster has been built, since tag references may point forward.

use crate::error::{ConfError, ErrorKind};
use crate::graph::{IdAllocator, ObjectGraph, ObjectId, TagEntry, TagTable};
use crate::lexer;
use crate::pass1_cluster::{self, PendingTag};
use crate::pass2_inherit::{self, BuildCtx};
use crate::pass5_refs;
use crate::source::{FileSystemProvider, SourceProvider};
use std::path::Path;
use tracing::debug;

/// Settings that change how a document is converted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Fail on a property defined twice in one record instead of recording
    /// a diagnostic and keeping the later value.
    pub strict_merge: bool,
}

/// Convert the document at `path` with default options.
pub fn convert(path: &Path) -> Result<ObjectGraph, ConfError> {
    convert_with_provider(path, &FileSystemProvider, &ParseOptions::default())
}

/// Convert the document at `path`, reading it through `provider`.
pub fn convert_with_provider(
    path: &Path,
    provider: &dyn SourceProvider,
    options: &ParseOptions,
) -> Result<ObjectGraph, ConfError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let src = provider.read_source(path).map_err(|e| {
        ConfError::new(
            0,
            ErrorKind::Io,
            &filename,
            0,
            format!("cannot read {}: {}", path.display(), e),
        )
    })?;
    convert_str(&src, &filename, options)
}

/// Convert document text. `filename` is only used in error reports.
pub fn convert_str(
    src: &str,
    filename: &str,
    options: &ParseOptions,
) -> Result<ObjectGraph, ConfError> {
    // Pass 0: line classification
    let lines = lexer::classify(src, filename)?;

    let mut ctx = BuildCtx::new(filename, options, IdAllocator::new());
    let mut records = Vec::new();
    let mut tags = TagTable::new();
    let mut carried: Option<PendingTag> = None;

    for cluster in pass1_cluster::split_clusters(&lines) {
        // Pass 1: tag attachment
        let tag = pass1_cluster::attach_tag(&cluster, &mut carried, filename)?;
        if !cluster.has_body() {
            continue;
        }

        // Passes 2-4: inheritance, embedded blocks, values
        let mut record = pass2_inherit::build_cluster_record(&cluster, &mut ctx)?;

        if let Some((name, line)) = tag {
            declare_tag(&mut tags, &name, line, record.id, filename, cluster.index)?;
            record.tag = Some(name);
        }
        records.push(record);
    }

    if let Some((name, line)) = carried {
        return Err(ConfError::malformed(
            1,
            filename,
            line,
            format!("tag '{}' is not followed by an object", name),
        ));
    }

    // Pass 5: reference resolution
    pass5_refs::resolve_references(&mut records, &tags, filename)?;
    pass5_refs::resolve_references(&mut ctx.embedded, &tags, filename)?;

    debug!(
        file = filename,
        records = records.len(),
        embedded = ctx.embedded.len(),
        tags = tags.len(),
        diagnostics = ctx.diagnostics.len(),
        "converted document"
    );
    Ok(ObjectGraph::new(records, ctx.embedded, tags, ctx.diagnostics))
}

fn declare_tag(
    tags: &mut TagTable,
    name: &str,
    line: u32,
    id: ObjectId,
    filename: &str,
    cluster: usize,
) -> Result<(), ConfError> {
    tags.declare(name, TagEntry { id, line }).map_err(|first| {
        ConfError::new(
            1,
            ErrorKind::DuplicateTagDeclaration,
            filename,
            line,
            format!(
                "duplicate tag '{}': first declared at line {}",
                name, first.line
            ),
        )
        .in_cluster(cluster)
    })
}
