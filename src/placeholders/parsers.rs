pub(crate) const LISTFIELDS_PREFIX: &str = "LISTFIELDS ";

/// `LIMIT ?` (any case) starting at `idx`.
pub(crate) fn is_limit_placeholder(bytes: &[u8], idx: usize) -> bool {
    const PATTERN: &[u8] = b"limit ?";
    bytes
        .get(idx..idx + PATTERN.len())
        .is_some_and(|window| window.eq_ignore_ascii_case(PATTERN))
}

/// Whether the first keyword of the statement is `SHOW`.
pub(crate) fn is_show_command(sql: &str) -> bool {
    starts_with_keyword(sql, "SHOW ")
}

pub(crate) fn is_listfields(sql: &str) -> bool {
    starts_with_keyword(sql, LISTFIELDS_PREFIX)
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    let trimmed = sql.trim_start().as_bytes();
    trimmed
        .get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword.as_bytes()))
}
