//! Pass 4: decode a field's raw text according to its type tag.
//!
//! References are not resolved here; `OBJ-REF` names become
//! [`Value::TagRef`] placeholders for pass 5. Inherit markers are handled by
//! pass 3 and never reach this module.

use crate::ast::{FieldDecl, TypeTag, LIST_SEPARATOR};
use crate::error::{ConfError, ErrorKind};
use crate::graph::Value;
use time::macros::format_description;
use time::PrimitiveDateTime;

/// Decode `decl.raw_value` per `decl.type_tag`.
pub fn decode_field(decl: &FieldDecl, filename: &str) -> Result<Value, ConfError> {
    decode(&decl.type_tag, &decl.raw_value).map_err(|msg| {
        ConfError::new(4, ErrorKind::DecodeError, filename, decl.line, msg)
            .on_field(decl.qualified_name())
    })
}

/// Decode `raw` per `tag`; the error is a bare message for the caller to place.
pub fn decode(tag: &TypeTag, raw: &str) -> Result<Value, String> {
    match tag {
        TypeTag::List(inner) => raw
            .split(LIST_SEPARATOR)
            .map(|item| decode(inner, item.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        TypeTag::ObjRef => tag_ref(raw),
        TypeTag::ListObjRef => raw
            .split(LIST_SEPARATOR)
            .map(|item| tag_ref(item.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        TypeTag::InheritMarker => Err("inherit marker outside an embedding site".to_owned()),
        TypeTag::Empty => Err("empty type spec has no value".to_owned()),
        scalar => decode_scalar(scalar, raw),
    }
}

fn decode_scalar(tag: &TypeTag, raw: &str) -> Result<Value, String> {
    match tag {
        TypeTag::Str => Ok(Value::Str(raw.trim_matches('"').to_owned())),
        TypeTag::Bool => match raw {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            _ => Err(format!("expected bool, got '{}'", raw)),
        },
        TypeTag::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("expected int, got '{}'", raw)),
        TypeTag::DateTime => parse_datetime(raw)
            .map(Value::DateTime)
            .map_err(|e| format!("expected datetime 'YYYY-MM-DDTHH:MM:SS.fffZ', got '{}': {}", raw, e)),
        other => Err(format!("'{}' is not a scalar type", other)),
    }
}

fn tag_ref(raw: &str) -> Result<Value, String> {
    if raw.is_empty() {
        return Err("empty OBJ-REF tag name".to_owned());
    }
    Ok(Value::TagRef(raw.to_owned()))
}

pub fn parse_datetime(raw: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]Z"),
    )
}

pub fn format_datetime(dt: &PrimitiveDateTime) -> String {
    dt.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]Z"
    ))
    .unwrap_or_else(|_| dt.to_string())
}
