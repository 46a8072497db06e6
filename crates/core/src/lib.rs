#![allow(clippy::result_large_err)]
//! caseconf-core: converter for the CASE/NLG flat-file config grammar.
//!
//! Turns a config document into an [`ObjectGraph`] through a numbered pass
//! pipeline:
//!
//! - pass 0 [`lexer`] -- classify every line
//! - pass 1 [`pass1_cluster`] -- split into clusters, attach tags
//! - pass 2 [`pass2_inherit`] -- merge `||||` class groups into one record
//! - pass 3 [`pass3_embed`] -- resolve `|~~|` blocks and `|^^|` markers
//! - pass 4 [`pass4_values`] -- decode typed values
//! - pass 5 [`pass5_refs`] -- resolve `OBJ-REF` tag references
//! - pass 6 [`pass6_serialize`] -- structural JSON dump of the graph
//!
//! [`emit()`] writes a graph back in the grammar and [`apply_assignments`]
//! layers pre-built `key=value` strings on top of a converted graph.

pub mod assign;
pub mod ast;
pub mod convert;
pub mod emit;
pub mod error;
pub mod graph;
pub mod lexer;
pub mod pass1_cluster;
pub mod pass2_inherit;
pub mod pass3_embed;
pub mod pass4_values;
pub mod pass5_refs;
pub mod pass6_serialize;
pub mod source;

// ── Convenience re-exports: key types ────────────────────────────────

pub use assign::Assignment;
pub use ast::{FieldDecl, TypeTag};
pub use error::{ConfError, Diagnostic, DiagnosticKind, ErrorKind};
pub use graph::{Field, GraphVisitor, ObjectGraph, ObjectId, ObjectRecord, TagTable, Value};
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use assign::apply_assignments;
pub use convert::{convert, convert_str, convert_with_provider, ParseOptions};
pub use emit::emit;
pub use pass6_serialize::serialize;
