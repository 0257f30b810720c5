//! Client-side placeholder substitution.
//!
//! Used whenever a statement runs over the text protocol: each unquoted `?` is
//! replaced by the next bound value rendered as a SQL literal.

pub mod escape;
mod infer;

pub use infer::TypeInference;
pub(crate) use infer::looks_numeric;

use std::borrow::Cow;

use crate::params::BoundParam;
use crate::placeholders::{is_limit_placeholder, is_quote, skip_quoted};

/// Characters dropped from a value emitted as a numeric literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardedSuffix {
    /// 1-based parameter position.
    pub position: usize,
    pub suffix: Vec<u8>,
}

/// Result of [`rewrite`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewritten {
    pub sql: Vec<u8>,
    /// Non-empty when numeric filtering threw characters away.
    pub discarded: Vec<DiscardedSuffix>,
}

impl Rewritten {
    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.sql)
    }
}

/// Substitute bound values into `sql`.
///
/// * NULL values become `NULL`.
/// * Numeric values (declared, inferred, or positioned after `LIMIT ?`) are
///   emitted unquoted, filtered down to their numeric prefix. After `LIMIT ?`
///   only digits survive; a value without any leaves the clause empty and the
///   server rejects the statement.
/// * Everything else is escaped with `escape` and single-quoted.
///
/// Quoted regions are copied verbatim. Placeholders beyond the end of
/// `params` are left as `?`; surplus parameters are ignored. With no
/// parameters at all the statement is returned unchanged.
///
/// ```rust
/// use sql_emulation::prelude::*;
/// use sql_emulation::rewrite::{rewrite, escape::escape_string};
///
/// let params = vec![
///     BoundParam::new(RowValues::Int(5), Some(SqlType::Integer)),
///     BoundParam::new(RowValues::Text("O'Brien".into()), None),
/// ];
/// let out = rewrite(
///     "SELECT * FROM t WHERE a = ? AND b = ?",
///     &params,
///     TypeInference::Off,
///     escape_string,
/// );
/// assert_eq!(out.to_string_lossy(), r"SELECT * FROM t WHERE a = 5 AND b = 'O\'Brien'");
/// ```
pub fn rewrite<E>(sql: &str, params: &[BoundParam], inference: TypeInference, escape: E) -> Rewritten
where
    E: Fn(&[u8]) -> Vec<u8>,
{
    if params.is_empty() {
        return Rewritten {
            sql: sql.as_bytes().to_vec(),
            discarded: Vec::new(),
        };
    }

    let bytes = sql.trim_start_matches(|c: char| c.is_ascii_whitespace()).as_bytes();
    let worst_case: usize = params.iter().map(BoundParam::rewrite_width).sum();
    let mut out = Rewritten {
        sql: Vec::with_capacity(bytes.len() + worst_case),
        discarded: Vec::new(),
    };
    let mut pending = params.iter().enumerate();
    let mut in_limit = false;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        if is_quote(b) {
            let end = skip_quoted(bytes, idx);
            out.sql.extend_from_slice(&bytes[idx..end]);
            idx = end;
            continue;
        }
        if !in_limit && is_limit_placeholder(bytes, idx) {
            in_limit = true;
        }
        match b {
            b'?' => match pending.next() {
                Some((i, param)) => emit_param(&mut out, i + 1, param, in_limit, inference, &escape),
                None => out.sql.push(b'?'),
            },
            // a nested LIMIT ends with its subquery
            b')' => {
                in_limit = false;
                out.sql.push(b);
            }
            _ => out.sql.push(b),
        }
        idx += 1;
    }
    out
}

fn emit_param<E>(
    out: &mut Rewritten,
    position: usize,
    param: &BoundParam,
    in_limit: bool,
    inference: TypeInference,
    escape: &E,
) where
    E: Fn(&[u8]) -> Vec<u8>,
{
    let Some(text) = param.value.to_text() else {
        out.sql.extend_from_slice(b"NULL");
        return;
    };

    if in_limit || infer::is_numeric(&param.value, param.declared, inference) {
        let (keep, dropped) = infer::numeric_prefix(&text, in_limit);
        // a LIMIT value is never quoted, even when no digits survive
        if in_limit || keep.iter().any(u8::is_ascii_digit) {
            out.sql.extend_from_slice(keep);
            if !dropped.is_empty() {
                out.discarded.push(DiscardedSuffix {
                    position,
                    suffix: dropped.to_vec(),
                });
            }
            return;
        }
    }

    out.sql.push(b'\'');
    out.sql.extend_from_slice(&escape(&text));
    out.sql.push(b'\'');
}
