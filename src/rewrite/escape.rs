/// Append `input` to `out` with MySQL string-literal escaping applied.
pub fn escape_into(out: &mut Vec<u8>, input: &[u8]) {
    for &b in input {
        match b {
            0 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(b),
        }
    }
}

#[must_use]
pub fn escape_string(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 2);
    escape_into(&mut out, input);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_specials() {
        assert_eq!(escape_string(b"O'Brien"), b"O\\'Brien");
        assert_eq!(escape_string(b"a\"b\\c"), b"a\\\"b\\\\c");
        assert_eq!(escape_string(b"\0\n\r\x1a"), b"\\0\\n\\r\\Z");
        assert_eq!(escape_string(b"plain"), b"plain");
    }
}
