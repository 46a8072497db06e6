//! Pass 1: split classified lines into blank-line-delimited clusters and
//! work out which tag, if any, each cluster's record carries.

use crate::ast::{LineKind, RawLine};
use crate::error::{ConfError, ErrorKind};

/// A maximal run of non-blank lines.
#[derive(Debug, Clone, Copy)]
pub struct Cluster<'a> {
    /// Zero-based position among all clusters of the document.
    pub index: usize,
    pub lines: &'a [RawLine],
}

impl<'a> Cluster<'a> {
    pub fn first_line(&self) -> u32 {
        self.lines.first().map_or(0, |l| l.line)
    }

    /// Lines that make up the object: everything except tags and comments.
    pub fn body(&self) -> impl Iterator<Item = &'a RawLine> + 'a {
        let lines: &'a [RawLine] = self.lines;
        lines
            .iter()
            .filter(|l| !matches!(l.kind, LineKind::Tag(_) | LineKind::Comment))
    }

    pub fn has_body(&self) -> bool {
        self.body().next().is_some()
    }

    pub fn tags(&self) -> impl Iterator<Item = (&'a str, u32)> + 'a {
        let lines: &'a [RawLine] = self.lines;
        lines.iter().filter_map(|l| match &l.kind {
            LineKind::Tag(name) => Some((name.as_str(), l.line)),
            _ => None,
        })
    }
}

/// Lazy iterator over the clusters of a classified document.
pub struct Clusters<'a> {
    lines: &'a [RawLine],
    pos: usize,
    index: usize,
}

pub fn split_clusters(lines: &[RawLine]) -> Clusters<'_> {
    Clusters {
        lines,
        pos: 0,
        index: 0,
    }
}

impl<'a> Iterator for Clusters<'a> {
    type Item = Cluster<'a>;

    fn next(&mut self) -> Option<Cluster<'a>> {
        while self.pos < self.lines.len() && self.lines[self.pos].kind == LineKind::Blank {
            self.pos += 1;
        }
        if self.pos >= self.lines.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < self.lines.len() && self.lines[self.pos].kind != LineKind::Blank {
            self.pos += 1;
        }
        let cluster = Cluster {
            index: self.index,
            lines: &self.lines[start..self.pos],
        };
        self.index += 1;
        Some(cluster)
    }
}

/// Tag name and declaration line.
pub type PendingTag = (String, u32);

/// Decide the tag for `cluster`'s record.
///
/// A cluster holding only tag lines hands its tag to the next cluster through
/// `carried`. Returns `None` for such clusters and for untagged ones.
pub fn attach_tag(
    cluster: &Cluster<'_>,
    carried: &mut Option<PendingTag>,
    filename: &str,
) -> Result<Option<PendingTag>, ConfError> {
    let mut tag: Option<PendingTag> = carried.take();
    for (name, line) in cluster.tags() {
        if let Some((existing, first_line)) = &tag {
            let err = if existing == name {
                ConfError::new(
                    1,
                    ErrorKind::DuplicateTagDeclaration,
                    filename,
                    line,
                    format!(
                        "duplicate tag '{}': first declared at line {}",
                        name, first_line
                    ),
                )
            } else {
                ConfError::malformed(
                    1,
                    filename,
                    line,
                    format!(
                        "object is already tagged '{}'; cannot also tag it '{}'",
                        existing, name
                    ),
                )
            };
            return Err(err.in_cluster(cluster.index));
        }
        tag = Some((name.to_owned(), line));
    }

    if cluster.has_body() {
        Ok(tag)
    } else {
        *carried = tag;
        Ok(None)
    }
}
