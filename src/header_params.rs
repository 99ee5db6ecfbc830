//! Parsing `Content-Type`/`Content-Disposition`-style header values of the
//! form `main; k=v; k="v"`.
//!
//! The quoted-value scanner is a single forward pass over the bytes tracking
//! `in_quote`/`escape_next`, never a regex — this is the crate's ReDoS guard,
//! structural rather than configured.

use std::collections::HashMap;

/// The parsed form of a header value like
/// `form-data; name="field"; filename="f.txt"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderParams {
    /// The portion before the first `;` (e.g. `form-data`, or a MIME type).
    pub value: Vec<u8>,
    /// Parameter name → value, both unquoted and unescaped. Keys are
    /// compared case-sensitively as bytes, matching the wire representation;
    /// callers needing case-insensitive lookup should lowercase first.
    pub params: HashMap<Vec<u8>, Vec<u8>>,
}

impl HeaderParams {
    /// Look up a parameter by name, decoded as UTF-8 lossily is left to the
    /// caller; this returns the raw bytes.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.params.get(name.as_bytes()).map(Vec::as_slice)
    }
}

/// Parse a header value into its main value and `;`-separated parameters.
///
/// Splitting on `;` respects double-quoted segments: a `;` inside a quoted
/// parameter value does not start a new parameter. Whitespace around `;` and
/// `=` is trimmed. A quoted value has its surrounding quotes stripped and
/// `\X` escapes inside it collapsed to `X`. A `filename` parameter whose
/// value contains a `\` or `/` path separator is reduced to its final
/// component (the IE6 full-path-filename workaround).
pub fn parse(header_value: &[u8]) -> HeaderParams {
    let segments = split_unquoted_semicolons(header_value);
    let mut iter = segments.into_iter();

    let value = iter.next().map(trim).unwrap_or_default().to_vec();
    let mut params = HashMap::new();

    for segment in iter {
        let segment = trim(segment);
        if segment.is_empty() {
            continue;
        }

        let eq = match segment.iter().position(|&b| b == b'=') {
            Some(idx) => idx,
            None => continue,
        };

        let name = trim(&segment[..eq]).to_vec();
        let raw_value = trim(&segment[eq + 1..]);
        let mut value = unquote(raw_value);

        if name == b"filename" {
            value = basename(&value);
        }

        params.insert(name, value);
    }

    HeaderParams { value, params }
}

/// Split `input` on `;` bytes that are not inside a double-quoted span.
/// Linear time: one pass, two booleans of state, no backtracking.
fn split_unquoted_semicolons(input: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut escape_next = false;

    for (i, &b) in input.iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match b {
            b'\\' if in_quote => escape_next = true,
            b'"' => in_quote = !in_quote,
            b';' if !in_quote => {
                segments.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&input[start..]);
    segments
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Strip surrounding double quotes (if present) and collapse `\X` → `X`.
/// Also linear time over the value, same state machine as the splitter.
fn unquote(value: &[u8]) -> Vec<u8> {
    if value.len() < 2 || value[0] != b'"' || value[value.len() - 1] != b'"' {
        return value.to_vec();
    }

    let inner = &value[1..value.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut escape_next = false;

    for &b in inner {
        if escape_next {
            out.push(b);
            escape_next = false;
        } else if b == b'\\' {
            escape_next = true;
        } else {
            out.push(b);
        }
    }

    out
}

fn basename(path: &[u8]) -> Vec<u8> {
    let last_sep = path.iter().rposition(|&b| b == b'\\' || b == b'/');
    match last_sep {
        Some(idx) => path[idx + 1..].to_vec(),
        None => path.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_params() {
        let got = parse(b"application/json;par=val;asdf=foo");
        assert_eq!(got.value, b"application/json");
        assert_eq!(got.get("par"), Some(&b"val"[..]));
        assert_eq!(got.get("asdf"), Some(&b"foo"[..]));
    }

    #[test]
    fn ie6_path_filename() {
        let got = parse(br#"text/plain; filename="C:\this\is\a\path\file.txt""#);
        assert_eq!(got.get("filename"), Some(&b"file.txt"[..]));
    }

    #[test]
    fn semicolon_inside_quotes_is_not_a_separator() {
        let got = parse(br#"form-data; name=field; x-attr="some;value"; filename=file.bin"#);
        assert_eq!(got.get("x-attr"), Some(&b"some;value"[..]));
        assert_eq!(got.get("filename"), Some(&b"file.bin"[..]));
    }

    #[test]
    fn unquoted_value_without_forbidden_chars() {
        let got = parse(b"form-data; name = field");
        assert_eq!(got.get("name"), Some(&b"field"[..]));
    }

    #[test]
    fn escaped_quote_inside_quoted_value() {
        let got = parse(br#"form-data; name="fo\"o""#);
        assert_eq!(got.get("name"), Some(&b"fo\"o"[..]));
    }

    #[test]
    fn redos_guard_completes_quickly_on_backslash_run() {
        let mut header = b"form-data; name=\"".to_vec();
        header.extend(std::iter::repeat(b'\\').take(200));
        header.extend_from_slice(b"\"");

        let start = std::time::Instant::now();
        let _ = parse(&header);
        assert!(start.elapsed() < std::time::Duration::from_millis(100));
    }
}
