//! Line framing for the relay.

use bytes::BytesMut;

/// Parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// Content to echo back, trailing whitespace removed.
    Echo(&'a [u8]),
    /// Nothing left after stripping.
    Blank,
}

/// Parse result.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult<'a> {
    /// Successfully parsed line with bytes consumed (delimiter included).
    Complete(Line<'a>, usize),
    /// No newline in the buffer yet.
    Incomplete,
}

/// Parse one newline-terminated line from the input buffer.
pub fn parse(input: &[u8]) -> ParseResult<'_> {
    let line_end = match find_lf(input) {
        Some(pos) => pos,
        None => return ParseResult::Incomplete,
    };

    let consumed = line_end + 1;
    let content = strip_trailing(&input[..line_end]);

    if content.is_empty() {
        ParseResult::Complete(Line::Blank, consumed)
    } else {
        ParseResult::Complete(Line::Echo(content), consumed)
    }
}

/// Remove trailing ASCII whitespace, including any `\r` left by CRLF peers.
pub fn strip_trailing(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !is_space(*b))
        .map_or(0, |pos| pos + 1);
    &line[..end]
}

/// Format an echo reply: the content followed by a single `\n`.
pub fn response_echo(content: &[u8], output: &mut BytesMut) {
    output.clear();
    output.reserve(content.len() + 1);
    output.extend_from_slice(content);
    output.extend_from_slice(b"\n");
}

/// Render bytes for diagnostics, escaping anything non-printable.
pub fn escape(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c)
}

fn find_lf(buffer: &[u8]) -> Option<usize> {
    buffer.iter().position(|&b| b == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        match parse(b"hello\n") {
            ParseResult::Complete(Line::Echo(content), consumed) => {
                assert_eq!(content, b"hello");
                assert_eq!(consumed, 6);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_crlf_and_trailing_spaces() {
        assert_eq!(
            parse(b"pos 1 2 3 \t\r\n"),
            ParseResult::Complete(Line::Echo(b"pos 1 2 3"), 13)
        );
    }

    #[test]
    fn test_leading_whitespace_kept() {
        assert_eq!(
            parse(b"  indented\n"),
            ParseResult::Complete(Line::Echo(b"  indented"), 11)
        );
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(parse(b"\n"), ParseResult::Complete(Line::Blank, 1));
        assert_eq!(parse(b" \t\r\n"), ParseResult::Complete(Line::Blank, 4));
    }

    #[test]
    fn test_incomplete() {
        assert_eq!(parse(b"hel"), ParseResult::Incomplete);
        assert_eq!(parse(b""), ParseResult::Incomplete);
    }

    #[test]
    fn test_only_first_line_consumed() {
        assert_eq!(
            parse(b"a\nb\n"),
            ParseResult::Complete(Line::Echo(b"a"), 2)
        );
    }

    #[test]
    fn test_non_utf8_is_opaque() {
        assert_eq!(
            parse(b"\xff\xfe\x00\n"),
            ParseResult::Complete(Line::Echo(b"\xff\xfe\x00"), 4)
        );
    }

    #[test]
    fn test_response_echo() {
        let mut buf = BytesMut::from(&b"stale"[..]);
        response_echo(b"hello", &mut buf);
        assert_eq!(&buf[..], b"hello\n");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(b"hi\r\x01"), "hi\\r\\x01");
    }
}
