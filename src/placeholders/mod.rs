//! Placeholder discovery.
//!
//! Both execution paths size their parameter arrays from
//! [`count_placeholders`], so the emulated rewriter and the native prepare
//! must agree on what counts as a `?`.

mod parsers;
mod scanner;

pub(crate) use parsers::is_limit_placeholder;
pub(crate) use scanner::{is_quote, skip_quoted};

use parsers::{LISTFIELDS_PREFIX, is_listfields, is_show_command};

/// Facts about a statement that drive execution-mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatementShape {
    pub placeholders: usize,
    /// The statement is a `SHOW ...` command.
    pub is_show: bool,
    /// A placeholder appears inside a `LIMIT ?` clause.
    pub limit_placeholder: bool,
    /// The statement is the `LISTFIELDS <table>` pseudo-command.
    pub is_listfields: bool,
}

impl StatementShape {
    /// Whether the binary protocol can run this statement.
    #[must_use]
    pub fn supports_native(&self) -> bool {
        !(self.is_show || self.limit_placeholder || self.is_listfields)
    }
}

/// Count `?` markers outside quoted regions.
///
/// ```rust
/// use sql_emulation::placeholders::count_placeholders;
///
/// assert_eq!(count_placeholders("SELECT ? FROM t WHERE a = '?' AND b = ?"), 2);
/// ```
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    analyze(sql).placeholders
}

/// Single pass over `sql` collecting its [`StatementShape`].
#[must_use]
pub fn analyze(sql: &str) -> StatementShape {
    let bytes = sql.as_bytes();
    let mut shape = StatementShape {
        is_show: is_show_command(sql),
        is_listfields: is_listfields(sql),
        ..StatementShape::default()
    };
    let mut in_limit = false;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        if is_quote(b) {
            idx = skip_quoted(bytes, idx);
            continue;
        }
        if !in_limit && is_limit_placeholder(bytes, idx) {
            in_limit = true;
        }
        match b {
            b'?' => {
                shape.placeholders += 1;
                if in_limit {
                    shape.limit_placeholder = true;
                }
            }
            b')' => in_limit = false,
            _ => {}
        }
        idx += 1;
    }
    shape
}

/// Table named by a `LISTFIELDS <table>` statement.
///
/// Returns `None` when the statement is not a LISTFIELDS command or the table
/// name is missing.
#[must_use]
pub fn listfields_table(sql: &str) -> Option<&str> {
    let trimmed = sql.trim_start();
    if !is_listfields(trimmed) {
        return None;
    }
    trimmed[LISTFIELDS_PREFIX.len()..].split_whitespace().next()
}
