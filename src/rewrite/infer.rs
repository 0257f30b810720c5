use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::types::{RowValues, SqlType};

/// How parameters bound without a declared type are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeInference {
    /// Always quote as a string.
    #[default]
    Off,
    /// Trust the value's storage: integers, floats and booleans are numeric.
    Lenient,
    /// Scan the textual form: optional leading `-`, one `.`, digits.
    Strict,
}

/// Whether a parameter is emitted as an unquoted number.
pub(crate) fn is_numeric(value: &RowValues, declared: Option<SqlType>, inference: TypeInference) -> bool {
    if let Some(sql_type) = declared {
        return sql_type.is_numeric();
    }
    match inference {
        TypeInference::Off => false,
        TypeInference::Lenient => value.has_numeric_storage(),
        TypeInference::Strict => value.to_text().is_some_and(|text| looks_numeric(&text)),
    }
}

/// Strict textual scan. Requires at least one digit.
pub(crate) fn looks_numeric(text: &[u8]) -> bool {
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (idx, &b) in text.iter().enumerate() {
        match b {
            b'-' if idx == 0 => {}
            b'.' if !seen_dot => seen_dot = true,
            b'0'..=b'9' => seen_digit = true,
            _ => return false,
        }
    }
    seen_digit
}

/// Split `text` into the prefix emitted as a numeric literal and the
/// discarded remainder.
///
/// Inside a `LIMIT` clause only digits and spaces survive; elsewhere a
/// leading `-` and a single `.` are kept too.
pub(crate) fn numeric_prefix(text: &[u8], limit_clause: bool) -> (&[u8], &[u8]) {
    let mut seen_dot = false;
    let mut end = 0;
    for (idx, &b) in text.iter().enumerate() {
        let keep = match b {
            b'0'..=b'9' | b' ' => true,
            b'-' => !limit_clause && idx == 0,
            b'.' if !limit_clause && !seen_dot => {
                seen_dot = true;
                true
            }
            _ => false,
        };
        if !keep {
            break;
        }
        end = idx + 1;
    }
    text.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_scan() {
        assert!(looks_numeric(b"42"));
        assert!(looks_numeric(b"-3.25"));
        assert!(looks_numeric(b".5"));
        assert!(!looks_numeric(b"--1"));
        assert!(!looks_numeric(b"1-2"));
        assert!(!looks_numeric(b"1.2.3"));
        assert!(!looks_numeric(b"12abc"));
        assert!(!looks_numeric(b""));
        assert!(!looks_numeric(b"-"));
    }

    #[test]
    fn declared_type_wins() {
        let text = RowValues::Text("7".into());
        assert!(is_numeric(&text, Some(SqlType::Integer), TypeInference::Off));
        assert!(!is_numeric(&RowValues::Int(7), Some(SqlType::Varchar), TypeInference::Strict));
    }

    #[test]
    fn inference_strengths() {
        let int = RowValues::Int(7);
        let text = RowValues::Text("7".into());
        assert!(!is_numeric(&int, None, TypeInference::Off));
        assert!(is_numeric(&int, None, TypeInference::Lenient));
        assert!(!is_numeric(&text, None, TypeInference::Lenient));
        assert!(is_numeric(&text, None, TypeInference::Strict));
        assert!(!is_numeric(&RowValues::Text("7 apples".into()), None, TypeInference::Strict));
    }

    #[test]
    fn prefixes() {
        assert_eq!(numeric_prefix(b"10; DROP TABLE t", true), (&b"10"[..], &b"; DROP TABLE t"[..]));
        assert_eq!(numeric_prefix(b"-1.5", true), (&b""[..], &b"-1.5"[..]));
        assert_eq!(numeric_prefix(b"-1.5", false), (&b"-1.5"[..], &b""[..]));
        assert_eq!(numeric_prefix(b"1.2.3", false), (&b"1.2"[..], &b".3"[..]));
        assert_eq!(numeric_prefix(b"5 ", true), (&b"5 "[..], &b""[..]));
    }
}
