use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::NormalizationError;
use crate::model::{ColumnSpec, SemanticType, TimestampValue, TypedValue};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Converts one external value into the typed value the column expects.
///
/// Nullability is checked before any conversion, so a null in a non-nullable
/// column is always `NotNullable` whatever the column type.
pub fn coerce(raw: &Value, spec: &ColumnSpec) -> Result<TypedValue, NormalizationError> {
    if raw.is_null() {
        if !spec.nullable {
            return Err(NormalizationError::NotNullable {
                column: spec.name.clone(),
            });
        }
        return Ok(TypedValue::Null);
    }

    let literal = external_literal(raw);
    let typed = match spec.semantic_type {
        SemanticType::Integer => parse_integer(&literal).map(TypedValue::Integer),
        SemanticType::Float => parse_float(&literal).map(TypedValue::Float),
        SemanticType::Text => Some(TypedValue::Text(literal.to_string())),
        SemanticType::Timestamp => parse_timestamp(&literal).map(TypedValue::Timestamp),
    };

    typed.ok_or_else(|| NormalizationError::TypeMismatch {
        column: spec.name.clone(),
        expected: spec.semantic_type,
        value: literal.into_owned(),
    })
}

/// Textual form of a JSON value: strings verbatim, everything else as its
/// compact JSON literal.
fn external_literal(raw: &Value) -> Cow<'_, str> {
    match raw {
        Value::String(text) => Cow::Borrowed(text),
        other => Cow::Owned(other.to_string()),
    }
}

fn parse_integer(literal: &str) -> Option<i64> {
    literal.trim().parse().ok()
}

fn parse_float(literal: &str) -> Option<f64> {
    literal
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn parse_timestamp(literal: &str) -> Option<TimestampValue> {
    let trimmed = literal.trim();

    if let Ok(value) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(TimestampValue::Zoned(value));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(TimestampValue::Naive(value));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(TimestampValue::Date)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const ALL_TYPES: [SemanticType; 4] = [
        SemanticType::Integer,
        SemanticType::Float,
        SemanticType::Text,
        SemanticType::Timestamp,
    ];

    fn column(semantic_type: SemanticType, nullable: bool) -> ColumnSpec {
        ColumnSpec {
            name: "somecolumn".to_string(),
            semantic_type,
            nullable,
        }
    }

    #[test]
    fn null_in_non_nullable_column_is_rejected_for_every_type() {
        for semantic_type in ALL_TYPES {
            let error = coerce(&Value::Null, &column(semantic_type, false))
                .expect_err("null must be rejected");
            assert_eq!(
                error,
                NormalizationError::NotNullable {
                    column: "somecolumn".to_string()
                }
            );
        }
    }

    #[test]
    fn null_in_nullable_column_is_typed_null() {
        for semantic_type in ALL_TYPES {
            let value = coerce(&Value::Null, &column(semantic_type, true)).expect("null allowed");
            assert_eq!(value, TypedValue::Null);
        }
    }

    #[test]
    fn valid_literals_round_trip() {
        let cases = [
            (SemanticType::Integer, json!("42")),
            (SemanticType::Integer, json!(-7)),
            (SemanticType::Float, json!("1.25")),
            (SemanticType::Float, json!(3.5)),
            (SemanticType::Float, json!("2")),
            (SemanticType::Text, json!("Red room")),
            (SemanticType::Timestamp, json!("2011-08-22T00:00:00.000000")),
            (SemanticType::Timestamp, json!("2011-08-22T10:15:30.250")),
            (SemanticType::Timestamp, json!("2011-08-22")),
            (SemanticType::Timestamp, json!("2011-08-22T10:15:30+02:00")),
        ];

        for (semantic_type, raw) in cases {
            let spec = column(semantic_type, false);
            let first = coerce(&raw, &spec).expect("literal should coerce");
            let literal = first.to_literal().expect("non-null literal");
            let second = coerce(&Value::String(literal.clone()), &spec)
                .expect("re-serialized literal should coerce");
            assert_eq!(first, second, "round trip of {raw} via {literal}");
        }
    }

    #[test]
    fn integer_literals_keep_their_value() {
        let spec = column(SemanticType::Integer, false);
        assert_eq!(coerce(&json!(" 17 "), &spec), Ok(TypedValue::Integer(17)));
        assert_eq!(coerce(&json!(3), &spec), Ok(TypedValue::Integer(3)));
    }

    #[test]
    fn mismatched_literals_are_type_mismatch() {
        let cases = [
            (SemanticType::Integer, json!(1.1)),
            (SemanticType::Integer, json!("x")),
            (SemanticType::Integer, json!(true)),
            (SemanticType::Float, json!("t")),
            (SemanticType::Float, json!("inf")),
            (SemanticType::Float, json!([1, 2])),
            (SemanticType::Timestamp, json!("a")),
            (SemanticType::Timestamp, json!("2011-13-40")),
            (SemanticType::Timestamp, json!(20110822)),
        ];

        for (semantic_type, raw) in cases {
            let error = coerce(&raw, &column(semantic_type, true))
                .expect_err("mismatched literal should fail");
            assert!(
                matches!(
                    &error,
                    NormalizationError::TypeMismatch { expected, .. } if *expected == semantic_type
                ),
                "{raw} as {semantic_type}: {error:?}"
            );
        }
    }

    #[test]
    fn text_accepts_any_value_stringified() {
        let spec = column(SemanticType::Text, false);
        assert_eq!(coerce(&json!(12), &spec), Ok(TypedValue::Text("12".to_string())));
        assert_eq!(coerce(&json!(false), &spec), Ok(TypedValue::Text("false".to_string())));
        assert_eq!(
            coerce(&json!({"floor": 2}), &spec),
            Ok(TypedValue::Text("{\"floor\":2}".to_string()))
        );
    }

    #[test]
    fn mismatch_reports_the_offending_value() {
        let error = coerce(&json!("x"), &column(SemanticType::Integer, false))
            .expect_err("should fail");
        assert_eq!(error.column(), "somecolumn");
        assert_eq!(
            error.to_string(),
            "column somecolumn expects integer, got \"x\""
        );
    }
}
