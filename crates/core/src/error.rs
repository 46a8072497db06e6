use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a conversion failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The source could not be read.
    Io,
    /// A line matches no grammar rule.
    ClassificationError,
    /// A property was defined twice in one record while strict merging is on.
    MergeConflict,
    /// Unmatched or empty `|~~|` pair, or an inherit marker with nothing to inherit.
    EmbeddedBlockError,
    /// Scalar text does not match its declared type.
    DecodeError,
    /// An `OBJ-REF` names a tag that was never declared.
    UndefinedTagReference,
    /// The same tag name was declared twice.
    DuplicateTagDeclaration,
    /// Structural problem with the document as a whole.
    MalformedDocument,
    /// The graph holds a value the grammar cannot express.
    Unrepresentable,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Io => "Io",
            ErrorKind::ClassificationError => "ClassificationError",
            ErrorKind::MergeConflict => "MergeConflict",
            ErrorKind::EmbeddedBlockError => "EmbeddedBlockError",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::UndefinedTagReference => "UndefinedTagReference",
            ErrorKind::DuplicateTagDeclaration => "DuplicateTagDeclaration",
            ErrorKind::MalformedDocument => "MalformedDocument",
            ErrorKind::Unrepresentable => "Unrepresentable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversion error. Every error aborts the whole conversion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{file}:{line}: {kind}: {message}")]
pub struct ConfError {
    pub pass: u8,
    pub kind: ErrorKind,
    /// Zero-based index of the cluster being converted, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<usize>,
    /// `Class.property` of the field in progress, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl ConfError {
    pub fn new(
        pass: u8,
        kind: ErrorKind,
        file: &str,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        ConfError {
            pass,
            kind,
            cluster: None,
            field: None,
            file: file.to_owned(),
            line,
            message: message.into(),
        }
    }

    pub fn in_cluster(mut self, cluster: usize) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn classify(file: &str, line: u32, message: impl Into<String>) -> Self {
        ConfError::new(0, ErrorKind::ClassificationError, file, line, message)
    }

    pub fn malformed(pass: u8, file: &str, line: u32, message: impl Into<String>) -> Self {
        ConfError::new(pass, ErrorKind::MalformedDocument, file, line, message)
    }

    /// Serialize to the JSON error record format.
    /// Every key is present (null for missing), unlike the serde derive.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "cluster": self.cluster,
            "field":   self.field,
            "file":    self.file,
            "kind":    self.kind.as_str(),
            "line":    self.line,
            "message": self.message,
            "pass":    self.pass,
        })
    }
}

/// Kinds of non-fatal findings recorded on the graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A property was defined more than once in one record; the later value won.
    MergeConflict,
    /// An embedded block was committed but no inherit marker consumed it.
    UnusedEmbeddedBlock,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::MergeConflict => "MergeConflict",
            DiagnosticKind::UnusedEmbeddedBlock => "UnusedEmbeddedBlock",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub cluster: usize,
    pub line: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "cluster": self.cluster,
            "kind":    self.kind.as_str(),
            "line":    self.line,
            "message": self.message,
        })
    }
}
