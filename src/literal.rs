// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recognition of rendered text that spells a JSON scalar.
//!
//! Rendering always produces text. When a template is effectively a single
//! block or helper call, its output is passed back through
//! [`coerce_rendered_text`] so that `"42"` becomes the number `42` again.
//! The number grammar is deliberately narrow: an optional `-`, digits, and an
//! optional fraction. Exponents, hex, `+` signs, leading dots and digit
//! separators are all treated as plain text.

use core::str::FromStr;

use crate::number::Number;
use crate::schema::{Schema, SchemaType};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LiteralCategory {
    Number,
    Boolean,
    Null,
}

impl LiteralCategory {
    pub fn schema_type(&self) -> SchemaType {
        match self {
            LiteralCategory::Number => SchemaType::Number,
            LiteralCategory::Boolean => SchemaType::Boolean,
            LiteralCategory::Null => SchemaType::Null,
        }
    }

    pub fn to_schema(&self) -> Schema {
        Schema::of_type(self.schema_type())
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `-?[0-9]+(\.[0-9]+)?`
pub fn is_number_literal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    match unsigned.split_once('.') {
        Some((int, frac)) => all_digits(int) && all_digits(frac),
        None => all_digits(unsigned),
    }
}

pub fn detect_literal_category(text: &str) -> Option<LiteralCategory> {
    match text {
        "true" | "false" => Some(LiteralCategory::Boolean),
        "null" => Some(LiteralCategory::Null),
        t if is_number_literal(t) => Some(LiteralCategory::Number),
        _ => None,
    }
}

/// Convert rendered output back to a scalar when the trimmed text is a literal.
/// Anything else is returned as the original, untrimmed string.
pub fn coerce_rendered_text(raw: &str) -> Value {
    let trimmed = raw.trim();
    match detect_literal_category(trimmed) {
        Some(LiteralCategory::Boolean) => Value::Bool(trimmed == "true"),
        Some(LiteralCategory::Null) => Value::Null,
        Some(LiteralCategory::Number) => match Number::from_str(trimmed) {
            Ok(n) => Value::Number(n),
            Err(_) => Value::from(raw),
        },
        None => Value::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_grammar() {
        for ok in ["0", "42", "-7", "3.14", "-0.5", "007"] {
            assert!(is_number_literal(ok), "{ok}");
        }
        for bad in ["", "-", "1.", ".5", "+1", "1e5", "0x10", "1_000", "1,000", "1.2.3", " 1"] {
            assert!(!is_number_literal(bad), "{bad}");
        }
    }

    #[test]
    fn categories() {
        assert_eq!(detect_literal_category("true"), Some(LiteralCategory::Boolean));
        assert_eq!(detect_literal_category("false"), Some(LiteralCategory::Boolean));
        assert_eq!(detect_literal_category("null"), Some(LiteralCategory::Null));
        assert_eq!(detect_literal_category("12.5"), Some(LiteralCategory::Number));
        assert_eq!(detect_literal_category("True"), None);
        assert_eq!(detect_literal_category("undefined"), None);
    }

    #[test]
    fn coercion_round_trips_numbers() {
        for n in [0i64, 1, -1, 30, 123_456_789, i64::MIN] {
            assert_eq!(coerce_rendered_text(&n.to_string()), Value::from(n));
        }
        for f in [0.5, -2.25, 1234.5678] {
            assert_eq!(coerce_rendered_text(&Number::from(f).to_string()), Value::from(f));
        }
        assert_eq!(coerce_rendered_text(&u64::MAX.to_string()), Value::from(u64::MAX));
    }

    #[test]
    fn coercion_scalars_and_text() {
        assert_eq!(coerce_rendered_text("true"), Value::Bool(true));
        assert_eq!(coerce_rendered_text(" false\n"), Value::Bool(false));
        assert_eq!(coerce_rendered_text("null"), Value::Null);
        assert_eq!(coerce_rendered_text("  20  "), Value::from(20i64));
        assert_eq!(coerce_rendered_text("  hello "), Value::from("  hello "));
        assert_eq!(coerce_rendered_text(""), Value::from(""));
        assert_eq!(coerce_rendered_text("1e3"), Value::from("1e3"));
    }
}
