//! Escape-aware scanning of quoted values inside semi-structured text.
//!
//! Works on byte offsets. `"` and `\` are ASCII and never appear inside a
//! multi-byte UTF-8 sequence, so every offset returned here is a char boundary.

use std::borrow::Cow;

/// Offset of the closing quote matching an opening quote that sits just
/// before `start`, or `None` if the text ends first.
///
/// A quote terminates the string when the run of backslashes directly in
/// front of it has even length (zero included).
pub fn find_closing_quote(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if start > bytes.len() {
        return None;
    }
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            let mut run = 0usize;
            let mut j = i;
            while j > start && bytes[j - 1] == b'\\' {
                run += 1;
                j -= 1;
            }
            if run % 2 == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Reverse JSON-style escapes in one pass.
///
/// Handles `\n \t \r \" \\ \/ \uXXXX`; anything else (including a lone
/// trailing backslash or a surrogate escape) is kept verbatim.
pub fn unescape(span: &str) -> Cow<'_, str> {
    if !span.contains('\\') {
        return Cow::Borrowed(span);
    }
    let mut out = String::with_capacity(span.len());
    let mut chars = span.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().map(|&(_, n)| n) {
            Some('n') => {
                out.push('\n');
                chars.next();
            }
            Some('t') => {
                out.push('\t');
                chars.next();
            }
            Some('r') => {
                out.push('\r');
                chars.next();
            }
            Some('"') => {
                out.push('"');
                chars.next();
            }
            Some('\\') => {
                out.push('\\');
                chars.next();
            }
            Some('/') => {
                out.push('/');
                chars.next();
            }
            Some('u') => match decode_unicode_escape(&span[idx..]) {
                Some(ch) => {
                    out.push(ch);
                    // 'u' plus four hex digits
                    for _ in 0..5 {
                        chars.next();
                    }
                }
                None => out.push('\\'),
            },
            _ => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

fn decode_unicode_escape(s: &str) -> Option<char> {
    let hex = s.get(2..6)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// Scan and unescape the value starting at `start`; also returns the offset
/// of the closing quote so callers can resume after it.
pub fn extract_quoted(text: &str, start: usize) -> Option<(Cow<'_, str>, usize)> {
    let end = find_closing_quote(text, start)?;
    Some((unescape(&text[start..end]), end))
}

/// Position of the first non-whitespace byte at or after `from`.
pub fn skip_whitespace(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Given the offset right after a key's closing quote, returns the offset
/// right after the opening quote of its string value, if the value is one.
pub fn value_start_after_key(text: &str, after_key: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let i = skip_whitespace(text, after_key);
    if bytes.get(i) != Some(&b':') {
        return None;
    }
    let i = skip_whitespace(text, i + 1);
    if bytes.get(i) != Some(&b'"') {
        return None;
    }
    Some(i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_backslashes_terminates() {
        let text = r#""abc" tail"#;
        assert_eq!(find_closing_quote(text, 1), Some(4));
    }

    #[test]
    fn one_backslash_is_escaped_quote() {
        let text = r#""a\"b" tail"#;
        assert_eq!(find_closing_quote(text, 1), Some(5));
    }

    #[test]
    fn two_backslashes_escape_each_other() {
        let text = r#""a\\" b""#;
        assert_eq!(find_closing_quote(text, 1), Some(4));
    }

    #[test]
    fn three_backslashes_then_real_quote() {
        // \\\" is an escaped backslash followed by an escaped quote
        let text = r#""a\\\"b""#;
        assert_eq!(find_closing_quote(text, 1), Some(7));
        assert_eq!(unescape(&text[1..7]), r#"a\"b"#);
    }

    #[test]
    fn four_backslashes_then_quote_terminates() {
        let text = r#""a\\\\" rest""#;
        assert_eq!(find_closing_quote(text, 1), Some(6));
        assert_eq!(unescape(&text[1..6]), r"a\\");
    }

    #[test]
    fn unterminated_is_not_found() {
        assert_eq!(find_closing_quote(r#""abc\""#, 1), None);
        assert_eq!(find_closing_quote(r#""abc"#, 1), None);
        assert_eq!(find_closing_quote("\"", 1), None);
        assert_eq!(find_closing_quote("x", 5), None);
    }

    #[test]
    fn backslashes_before_start_are_ignored() {
        // opening quote is itself preceded by a backslash, value is empty
        let text = r#"\"""#;
        assert_eq!(find_closing_quote(text, 2), Some(2));
    }

    #[test]
    fn unescape_borrows_when_clean() {
        assert!(matches!(unescape("<p>plain</p>"), Cow::Borrowed(_)));
    }

    #[test]
    fn unescape_handles_standard_sequences() {
        assert_eq!(unescape(r#"a\nb\t\"c\" \\ \/ é"#), "a\nb\t\"c\" \\ / é");
        assert_eq!(unescape(r"trailing\"), r"trailing\");
        assert_eq!(unescape(r"\x"), r"\x");
        assert_eq!(unescape(r"\u12"), r"\u12");
    }

    #[test]
    fn value_start_skips_colon_and_spaces() {
        let text = r#""index.html" :  "<html>""#;
        let start = value_start_after_key(text, 12).unwrap();
        assert_eq!(&text[start..start + 6], "<html>");
        assert_eq!(value_start_after_key(r#""k": 12"#, 3), None);
    }

    proptest! {
        #[test]
        fn scanner_finds_terminator_of_json_encoded_strings(s in "\\PC*") {
            let encoded = serde_json::to_string(&s).unwrap();
            let text = format!("{encoded}, \"next\": \"x\"");
            let end = find_closing_quote(&text, 1).unwrap();
            prop_assert_eq!(end, encoded.len() - 1);
            prop_assert_eq!(unescape(&text[1..end]).into_owned(), s);
        }
    }
}
