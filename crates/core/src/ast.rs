//! Line-level types produced by the classifier and consumed by the
//! cluster, inheritance and embedded-block passes.

use std::fmt;

// ──────────────────────────────────────────────
// Grammar literals
// ──────────────────────────────────────────────

pub const INHERIT_SEPARATOR: &str = "||||";
pub const EMBED_SEPARATOR: &str = "|~~|";
pub const INHERIT_MARKER: &str = "|^^|";
pub const TAG_PREFIX: &str = "[{OBJ-TAG}";
pub const FIELD_ASSIGN: &str = "[==]";
pub const LIST_SEPARATOR: &str = "[ | ]";
pub const COMMENT_PREFIX: char = '#';

// ──────────────────────────────────────────────
// Type tags
// ──────────────────────────────────────────────

/// How a field's raw text must be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Bool,
    Str,
    Int,
    DateTime,
    /// `list:<inner>`; inner is a scalar or the inherit marker.
    List(Box<TypeTag>),
    /// `|^^|` -- take the most recently committed embedded block.
    InheritMarker,
    ObjRef,
    ListObjRef,
    /// `{}` -- only legal on a property-less class line.
    Empty,
}

impl TypeTag {
    /// Parse the text between `[{` and `}]`.
    pub fn parse(spec: &str) -> Option<TypeTag> {
        if let Some(inner) = spec.strip_prefix("list:") {
            return match inner {
                "OBJ-REF" => Some(TypeTag::ListObjRef),
                INHERIT_MARKER => Some(TypeTag::List(Box::new(TypeTag::InheritMarker))),
                other => TypeTag::parse_scalar(other).map(|s| TypeTag::List(Box::new(s))),
            };
        }
        match spec {
            "" => Some(TypeTag::Empty),
            "OBJ-REF" => Some(TypeTag::ObjRef),
            INHERIT_MARKER => Some(TypeTag::InheritMarker),
            other => TypeTag::parse_scalar(other),
        }
    }

    fn parse_scalar(spec: &str) -> Option<TypeTag> {
        match spec {
            "bool" => Some(TypeTag::Bool),
            "str" => Some(TypeTag::Str),
            "int" => Some(TypeTag::Int),
            "datetime" => Some(TypeTag::DateTime),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, TypeTag::List(_) | TypeTag::ListObjRef)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TypeTag::ObjRef | TypeTag::ListObjRef)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Bool => f.write_str("bool"),
            TypeTag::Str => f.write_str("str"),
            TypeTag::Int => f.write_str("int"),
            TypeTag::DateTime => f.write_str("datetime"),
            TypeTag::List(inner) => write!(f, "list:{}", inner),
            TypeTag::InheritMarker => f.write_str(INHERIT_MARKER),
            TypeTag::ObjRef => f.write_str("OBJ-REF"),
            TypeTag::ListObjRef => f.write_str("list:OBJ-REF"),
            TypeTag::Empty => Ok(()),
        }
    }
}

// ──────────────────────────────────────────────
// Field declarations
// ──────────────────────────────────────────────

/// One `Class.property[==][{spec}] value` line.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub class: String,
    /// Empty for a property-less class line.
    pub property: String,
    pub type_tag: TypeTag,
    pub raw_value: String,
    pub line: u32,
}

impl FieldDecl {
    /// `Class.property`, used in error reports.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.class, self.property)
    }

    pub fn is_class_only(&self) -> bool {
        self.property.is_empty()
    }

    /// Whether this field takes its value from an embedded block.
    pub fn is_embedding_site(&self) -> bool {
        match &self.type_tag {
            TypeTag::InheritMarker => true,
            TypeTag::List(inner) if **inner == TypeTag::InheritMarker => true,
            t if t.is_reference() || *t == TypeTag::Empty => false,
            _ => self.raw_value == INHERIT_MARKER,
        }
    }
}

// ──────────────────────────────────────────────
// Classified lines
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Blank,
    Comment,
    InheritSeparator,
    EmbedSeparator,
    Tag(String),
    Field(FieldDecl),
}

/// A source line with its classification. Lines are numbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub line: u32,
    pub kind: LineKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_documented_spec() {
        assert_eq!(TypeTag::parse("bool"), Some(TypeTag::Bool));
        assert_eq!(TypeTag::parse("datetime"), Some(TypeTag::DateTime));
        assert_eq!(
            TypeTag::parse("list:str"),
            Some(TypeTag::List(Box::new(TypeTag::Str)))
        );
        assert_eq!(TypeTag::parse("OBJ-REF"), Some(TypeTag::ObjRef));
        assert_eq!(TypeTag::parse("list:OBJ-REF"), Some(TypeTag::ListObjRef));
        assert_eq!(TypeTag::parse("|^^|"), Some(TypeTag::InheritMarker));
        assert_eq!(
            TypeTag::parse("list:|^^|"),
            Some(TypeTag::List(Box::new(TypeTag::InheritMarker)))
        );
        assert_eq!(TypeTag::parse(""), Some(TypeTag::Empty));
    }

    #[test]
    fn rejects_nested_lists_and_unknown_kinds() {
        assert_eq!(TypeTag::parse("list:list:int"), None);
        assert_eq!(TypeTag::parse("float"), None);
        assert_eq!(TypeTag::parse("list:"), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for spec in ["bool", "list:int", "OBJ-REF", "list:OBJ-REF", "|^^|", "list:|^^|"] {
            let tag = TypeTag::parse(spec).unwrap();
            assert_eq!(tag.to_string(), spec);
        }
    }

    #[test]
    fn raw_marker_value_makes_an_embedding_site() {
        let decl = FieldDecl {
            class: "core_Trace".into(),
            property: "bundle".into(),
            type_tag: TypeTag::Str,
            raw_value: INHERIT_MARKER.into(),
            line: 3,
        };
        assert!(decl.is_embedding_site());
        let reference = FieldDecl {
            type_tag: TypeTag::ObjRef,
            ..decl
        };
        assert!(!reference.is_embedding_site());
    }
}
