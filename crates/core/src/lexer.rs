//! Pass 0: line classification.
//!
//! Every physical line is classified on its own, without looking at its
//! neighbours. Structure (clusters, groups, blocks) is the business of the
//! later passes.

use crate::ast::*;
use crate::error::ConfError;

/// Classify every line of `src`. Fails on the first unrecognized line, or
/// when a non-empty document does not end with a newline.
pub fn classify(src: &str, filename: &str) -> Result<Vec<RawLine>, ConfError> {
    let mut lines = Vec::new();
    let mut line: u32 = 0;
    for text in src.lines() {
        line += 1;
        let kind = classify_line(text, line, filename)?;
        lines.push(RawLine { line, kind });
    }

    if !src.is_empty() && !src.ends_with('\n') {
        return Err(ConfError::malformed(
            0,
            filename,
            line,
            "document must end with a newline",
        ));
    }

    Ok(lines)
}

/// Classify one line. `line` is only used for error reporting.
pub fn classify_line(text: &str, line: u32, filename: &str) -> Result<LineKind, ConfError> {
    let text = text.trim();

    if text.is_empty() {
        return Ok(LineKind::Blank);
    }
    if text.starts_with(COMMENT_PREFIX) {
        return Ok(LineKind::Comment);
    }
    if text == INHERIT_SEPARATOR {
        return Ok(LineKind::InheritSeparator);
    }
    if text == EMBED_SEPARATOR {
        return Ok(LineKind::EmbedSeparator);
    }
    if let Some(rest) = text.strip_prefix(TAG_PREFIX) {
        return classify_tag(rest, line, filename);
    }
    if text.contains(FIELD_ASSIGN) {
        return classify_field(text, line, filename).map(LineKind::Field);
    }

    Err(ConfError::classify(
        filename,
        line,
        format!("unrecognized line '{}'", text),
    ))
}

fn classify_tag(rest: &str, line: u32, filename: &str) -> Result<LineKind, ConfError> {
    // Both `[{OBJ-TAG}name` and `[{OBJ-TAG}]name` are in use.
    let name = rest.strip_prefix(']').unwrap_or(rest).trim();
    if name.is_empty() {
        return Err(ConfError::classify(filename, line, "tag declaration without a name"));
    }
    if name.contains(char::is_whitespace) {
        return Err(ConfError::classify(
            filename,
            line,
            format!("tag name '{}' contains whitespace", name),
        ));
    }
    Ok(LineKind::Tag(name.to_owned()))
}

/// Parse `Class.property[==][{spec}] value`.
pub fn classify_field(text: &str, line: u32, filename: &str) -> Result<FieldDecl, ConfError> {
    let err = |msg: String| ConfError::classify(filename, line, msg);

    let (head, tail) = text
        .split_once(FIELD_ASSIGN)
        .ok_or_else(|| err(format!("expected '{}' in field declaration", FIELD_ASSIGN)))?;
    let (class, property) = head
        .split_once('.')
        .ok_or_else(|| err(format!("expected 'Class.property' before '[==]', got '{}'", head)))?;
    if !is_name(class) {
        return Err(err(format!("invalid class name '{}'", class)));
    }
    if !property.is_empty() && !is_name(property) {
        return Err(err(format!("invalid property name '{}'", property)));
    }
    let qualified = format!("{}.{}", class, property);

    let tail = tail
        .strip_prefix("[{")
        .ok_or_else(|| err(format!("expected '[{{' after '[==]' in '{}'", qualified)).on_field(&qualified))?;
    let (spec, value) = tail
        .split_once("}]")
        .ok_or_else(|| err(format!("unterminated type spec in '{}'", qualified)).on_field(&qualified))?;
    let type_tag = TypeTag::parse(spec)
        .ok_or_else(|| err(format!("unknown type spec '{}'", spec)).on_field(&qualified))?;
    let raw_value = value.trim();

    if property.is_empty() && !raw_value.is_empty() {
        return Err(err(format!(
            "property-less line for class '{}' cannot carry a value",
            class
        ))
        .on_field(&qualified));
    }
    if !property.is_empty() && type_tag == TypeTag::Empty {
        return Err(err(format!("missing type spec for '{}'", qualified)).on_field(&qualified));
    }
    let marker_spec = match &type_tag {
        TypeTag::InheritMarker => true,
        TypeTag::List(inner) => **inner == TypeTag::InheritMarker,
        _ => false,
    };
    if marker_spec && !raw_value.is_empty() && raw_value != INHERIT_MARKER {
        return Err(err(format!(
            "'{}' is an inherit-marker field and cannot carry the value '{}'",
            qualified, raw_value
        ))
        .on_field(&qualified));
    }

    Ok(FieldDecl {
        class: class.to_owned(),
        property: property.to_owned(),
        type_tag,
        raw_value: raw_value.to_owned(),
        line,
    })
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn field(text: &str) -> FieldDecl {
        match classify_line(text, 1, "t.conf").unwrap() {
            LineKind::Field(f) => f,
            other => panic!("expected field, got {:?}", other),
        }
    }

    #[test]
    fn classifies_markers_and_blanks() {
        assert_eq!(classify_line("", 1, "t").unwrap(), LineKind::Blank);
        assert_eq!(classify_line("   \t", 1, "t").unwrap(), LineKind::Blank);
        assert_eq!(classify_line("||||", 1, "t").unwrap(), LineKind::InheritSeparator);
        assert_eq!(classify_line("|~~|  ", 1, "t").unwrap(), LineKind::EmbedSeparator);
        assert_eq!(classify_line("# note", 1, "t").unwrap(), LineKind::Comment);
    }

    #[test]
    fn tag_accepts_both_spellings() {
        assert_eq!(
            classify_line("[{OBJ-TAG}my-tag", 1, "t").unwrap(),
            LineKind::Tag("my-tag".into())
        );
        assert_eq!(
            classify_line("[{OBJ-TAG}]my-tag", 1, "t").unwrap(),
            LineKind::Tag("my-tag".into())
        );
    }

    #[test]
    fn tag_without_name_is_rejected() {
        let err = classify_line("[{OBJ-TAG}]", 3, "t.conf").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ClassificationError);
        assert_eq!(err.line, 3);
    }

    #[test]
    fn parses_scalar_field_with_value() {
        let f = field("propbundle_Device.manufacturer[==][{str}] Acme Corp");
        assert_eq!(f.class, "propbundle_Device");
        assert_eq!(f.property, "manufacturer");
        assert_eq!(f.type_tag, TypeTag::Str);
        assert_eq!(f.raw_value, "Acme Corp");
    }

    #[test]
    fn parses_property_less_class_line() {
        let f = field("core_Trace.[==][{}]");
        assert!(f.is_class_only());
        assert_eq!(f.type_tag, TypeTag::Empty);
    }

    #[test]
    fn property_less_line_with_value_is_rejected() {
        let err = classify_line("core_Trace.[==][{str}] x", 2, "t").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ClassificationError);
        assert_eq!(err.field.as_deref(), Some("core_Trace."));
    }

    #[test]
    fn unknown_type_spec_is_rejected() {
        let err = classify_line("core_Trace.x[==][{float}] 1.5", 1, "t").unwrap_err();
        assert!(err.message.contains("unknown type spec 'float'"));
    }

    #[test]
    fn marker_field_cannot_carry_other_text() {
        assert!(classify_line("a.b[==][{|^^|}] hello", 1, "t").is_err());
        assert!(classify_line("a.b[==][{|^^|}] |^^|", 1, "t").is_ok());
    }

    #[test]
    fn garbage_line_is_a_classification_error() {
        let err = classify_line("just some words", 7, "t.conf").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ClassificationError);
        assert_eq!(err.message, "unrecognized line 'just some words'");
    }

    #[test]
    fn missing_trailing_newline_is_malformed() {
        let err = classify("a.b[==][{int}] 1", "t.conf").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedDocument);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn numbers_lines_from_one() {
        let lines = classify("\n||||\n", "t").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].line, 2);
        assert_eq!(lines[1].kind, LineKind::InheritSeparator);
    }

    #[test]
    fn empty_document_is_fine() {
        assert!(classify("", "t").unwrap().is_empty());
    }
}
