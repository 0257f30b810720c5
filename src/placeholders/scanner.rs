/// Lexical state while walking a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Normal,
    /// Inside a region opened by the contained quote byte.
    Quoted(u8),
}

pub(crate) fn is_quote(b: u8) -> bool {
    matches!(b, b'\'' | b'"' | b'`')
}

/// Index just past the quoted region that opens at `start`.
///
/// A backslash inside the region consumes the following byte, so `\'` does
/// not close a single-quoted string. An unterminated region runs to the end.
pub(crate) fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let State::Quoted(end_token) = open(bytes[start]) else {
        return start + 1;
    };
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b if b == end_token => return idx + 1,
            _ => idx += 1,
        }
    }
    bytes.len()
}

fn open(b: u8) -> State {
    if is_quote(b) {
        State::Quoted(b)
    } else {
        State::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_to_matching_quote() {
        let sql = br#"'it\'s' ?"#;
        assert_eq!(skip_quoted(sql, 0), 7);
        let sql = b"`col?` x";
        assert_eq!(skip_quoted(sql, 0), 6);
    }

    #[test]
    fn unterminated_runs_to_end() {
        assert_eq!(skip_quoted(b"'abc", 0), 4);
        assert_eq!(skip_quoted(b"'abc\\", 0), 5);
    }
}
