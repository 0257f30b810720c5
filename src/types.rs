use std::borrow::Cow;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be bound as statement parameters or read back from a row.
///
/// The same enum is used on both sides so callers can feed fetched values
/// straight back into a bind:
/// ```rust
/// use sql_emulation::prelude::*;
///
/// let params = vec![
///     RowValues::Int(5),
///     RowValues::Text("O'Brien".into()),
///     RowValues::Null,
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value, sent as `1` / `0`
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value, sent as its serialized text
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value is stored as a number (the lenient inference rule).
    #[must_use]
    pub fn has_numeric_storage(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Bool(_))
    }

    /// Textual form sent to the server, or `None` for NULL.
    #[must_use]
    pub fn to_text(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            RowValues::Null => None,
            RowValues::Int(v) => Some(Cow::Owned(v.to_string().into_bytes())),
            RowValues::Float(v) => Some(Cow::Owned(v.to_string().into_bytes())),
            RowValues::Text(s) => Some(Cow::Borrowed(s.as_bytes())),
            RowValues::Bool(b) => Some(Cow::Borrowed(if *b { b"1" } else { b"0" })),
            RowValues::Timestamp(ts) => Some(Cow::Owned(
                ts.format("%Y-%m-%d %H:%M:%S%.f").to_string().into_bytes(),
            )),
            RowValues::JSON(v) => Some(Cow::Owned(v.to_string().into_bytes())),
            RowValues::Blob(bytes) => Some(Cow::Borrowed(bytes.as_slice())),
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Raw bytes for `Blob` and `Text` cells.
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            RowValues::Blob(bytes) => Some(bytes),
            RowValues::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Portable (ODBC-style) SQL type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Unknown,
    Char,
    Numeric,
    Decimal,
    Integer,
    SmallInt,
    Float,
    Real,
    Double,
    Date,
    Time,
    Timestamp,
    Varchar,
    LongVarchar,
    Binary,
    VarBinary,
    LongVarBinary,
    BigInt,
    TinyInt,
    Bit,
}

impl SqlType {
    #[must_use]
    pub fn code(self) -> i16 {
        match self {
            SqlType::Unknown => 0,
            SqlType::Char => 1,
            SqlType::Numeric => 2,
            SqlType::Decimal => 3,
            SqlType::Integer => 4,
            SqlType::SmallInt => 5,
            SqlType::Float => 6,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::Date => 9,
            SqlType::Time => 10,
            SqlType::Timestamp => 11,
            SqlType::Varchar => 12,
            SqlType::LongVarchar => -1,
            SqlType::Binary => -2,
            SqlType::VarBinary => -3,
            SqlType::LongVarBinary => -4,
            SqlType::BigInt => -5,
            SqlType::TinyInt => -6,
            SqlType::Bit => -7,
        }
    }

    #[must_use]
    pub fn from_code(code: i16) -> Option<Self> {
        let ty = match code {
            0 => SqlType::Unknown,
            1 => SqlType::Char,
            2 => SqlType::Numeric,
            3 => SqlType::Decimal,
            4 => SqlType::Integer,
            5 => SqlType::SmallInt,
            6 => SqlType::Float,
            7 => SqlType::Real,
            8 => SqlType::Double,
            9 => SqlType::Date,
            10 => SqlType::Time,
            11 => SqlType::Timestamp,
            12 => SqlType::Varchar,
            -1 => SqlType::LongVarchar,
            -2 => SqlType::Binary,
            -3 => SqlType::VarBinary,
            -4 => SqlType::LongVarBinary,
            -5 => SqlType::BigInt,
            -6 => SqlType::TinyInt,
            -7 => SqlType::Bit,
            _ => return None,
        };
        Some(ty)
    }

    /// Declared types whose values are emitted unquoted.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            SqlType::Numeric
                | SqlType::Decimal
                | SqlType::Integer
                | SqlType::SmallInt
                | SqlType::Float
                | SqlType::Real
                | SqlType::Double
                | SqlType::BigInt
                | SqlType::TinyInt
        )
    }
}

/// Row count reported by an execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCount {
    Known(u64),
    /// Streaming result whose size is only known once it is drained.
    Unknown,
}

impl RowCount {
    #[must_use]
    pub fn known(self) -> Option<u64> {
        match self {
            RowCount::Known(n) => Some(n),
            RowCount::Unknown => None,
        }
    }
}

/// What a successful execute produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOutcome {
    pub rows: RowCount,
    /// `false` for INSERT/UPDATE/DDL; `rows` is then the affected count.
    pub has_result_set: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_type_codes_round_trip() {
        for code in -7..=12 {
            let ty = SqlType::from_code(code).expect("known code");
            assert_eq!(ty.code(), code);
        }
        assert!(SqlType::from_code(91).is_none());
    }

    #[test]
    fn numeric_kinds() {
        assert!(SqlType::Integer.is_numeric());
        assert!(SqlType::Real.is_numeric());
        assert!(!SqlType::Varchar.is_numeric());
        assert!(!SqlType::Timestamp.is_numeric());
        assert!(!SqlType::Bit.is_numeric());
    }

    #[test]
    fn textual_forms() {
        assert_eq!(RowValues::Null.to_text(), None);
        assert_eq!(RowValues::Int(-42).to_text().as_deref(), Some(&b"-42"[..]));
        assert_eq!(RowValues::Bool(true).to_text().as_deref(), Some(&b"1"[..]));
        assert_eq!(RowValues::Float(1.5).to_text().as_deref(), Some(&b"1.5"[..]));
        let ts = NaiveDateTime::parse_from_str("2024-01-02 03:04:05", "%Y-%m-%d %H:%M:%S")
            .expect("timestamp");
        assert_eq!(
            RowValues::Timestamp(ts).to_text().as_deref(),
            Some(&b"2024-01-02 03:04:05"[..])
        );
        assert!(RowValues::Float(0.0).has_numeric_storage());
        assert!(!RowValues::Text("1".into()).has_numeric_storage());
    }
}
