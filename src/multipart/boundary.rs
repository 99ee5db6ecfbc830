//! Boundary scanning for `MultipartParser`'s `PART_DATA` state.
//!
//! Scans for the literal byte sequence `CRLF--boundary` within part body
//! data. A `memchr::memmem::Finder` is built once per boundary and reused
//! for every `write` call; when a chunk ends mid-match, the matched prefix
//! length is kept as a first-class state variable (`match_idx`) rather than
//! held in a separate buffer — the bytes it represents are, by definition,
//! a copy of the needle itself, so they can be reconstructed from the
//! needle when a resumed match turns out to be false.

use memchr::memmem::Finder;

/// The result of scanning one `write`'s worth of part-body bytes for the
/// boundary delimiter.
pub enum ScanResult<'a> {
    /// No full boundary match was found. `reconstructed` holds bytes that
    /// were tentatively held back as a partial match in a previous call but
    /// turned out to be literal body data; `literal` is the (possibly
    /// empty) run of body bytes found in this call after that point. Both
    /// should be flushed to the part's data callback, in that order.
    NoMatch { reconstructed: Vec<u8>, literal: &'a [u8] },
    /// The boundary delimiter was matched. `reconstructed` and `literal`
    /// (as above) are the final body bytes of this part; `rest` is
    /// whatever followed the delimiter in this same chunk, to be
    /// reprocessed as the start of the next state.
    Match { reconstructed: Vec<u8>, literal: &'a [u8], rest: &'a [u8] },
}

/// Scans part-body bytes for `\r\n--boundary`.
pub struct BoundaryFinder {
    needle: Vec<u8>,
    finder: Finder<'static>,
    /// Length of the needle prefix tentatively matched at the end of the
    /// previously scanned chunk; 0 when no match is pending.
    match_idx: usize,
}

impl BoundaryFinder {
    /// Build a scanner for the boundary `CRLF--boundary`, as used while
    /// scanning a part's body for the delimiter that ends it.
    pub fn new(boundary: &[u8]) -> Self {
        let mut needle = Vec::with_capacity(4 + boundary.len());
        needle.extend_from_slice(b"\r\n--");
        needle.extend_from_slice(boundary);
        Self::from_needle(needle)
    }

    /// Build a scanner for the literal `--boundary`, with no leading CRLF
    /// requirement — used once, to find the first boundary after the
    /// preamble (which may or may not have a CRLF immediately before it).
    pub fn new_start(boundary: &[u8]) -> Self {
        let mut needle = Vec::with_capacity(2 + boundary.len());
        needle.extend_from_slice(b"--");
        needle.extend_from_slice(boundary);
        Self::from_needle(needle)
    }

    fn from_needle(needle: Vec<u8>) -> Self {
        let finder = Finder::new(&needle).into_owned();
        BoundaryFinder { needle, finder, match_idx: 0 }
    }

    /// The full needle this scanner searches for (`\r\n--boundary`).
    pub fn needle(&self) -> &[u8] {
        &self.needle
    }

    /// `true` if a partial match is pending across a `write` boundary.
    pub fn has_pending_match(&self) -> bool {
        self.match_idx > 0
    }

    /// Scan `data` for the boundary, consuming all of it in one call.
    pub fn scan<'a>(&mut self, data: &'a [u8]) -> ScanResult<'a> {
        let mut reconstructed = Vec::new();
        let mut search_from = 0usize;

        if self.match_idx > 0 {
            let remaining_needle_len = self.needle.len() - self.match_idx;
            let try_len = remaining_needle_len.min(data.len());
            let remaining_needle = &self.needle[self.match_idx..self.match_idx + try_len];

            if data[..try_len] == *remaining_needle {
                if try_len == remaining_needle_len {
                    // Match completed using only bytes from this chunk.
                    self.match_idx = 0;
                    let rest = &data[try_len..];
                    return ScanResult::Match { reconstructed, literal: &data[..0], rest };
                }
                // Chunk ended while still inside a pending match; nothing to
                // flush yet, nothing new to report.
                self.match_idx += try_len;
                return ScanResult::NoMatch { reconstructed, literal: &data[..0] };
            }

            // Find the first byte that broke the pending match.
            let mismatch_at = (0..try_len)
                .find(|&k| data[k] != remaining_needle[k])
                .expect("mismatch must exist: the slices compared unequal above");

            reconstructed = self.needle[..self.match_idx + mismatch_at].to_vec();
            search_from = mismatch_at;
            self.match_idx = 0;
        }

        match self.finder.find(&data[search_from..]) {
            Some(rel_idx) => {
                let match_start = search_from + rel_idx;
                let match_end = match_start + self.needle.len();
                ScanResult::Match {
                    reconstructed,
                    literal: &data[search_from..match_start],
                    rest: &data[match_end..],
                }
            }
            None => {
                let tail = &data[search_from..];
                let max_check = (self.needle.len() - 1).min(tail.len());
                let mut partial_len = 0;
                for k in (1..=max_check).rev() {
                    if tail[tail.len() - k..] == self.needle[..k] {
                        partial_len = k;
                        break;
                    }
                }

                let literal_end = tail.len() - partial_len;
                self.match_idx = partial_len;
                ScanResult::NoMatch { reconstructed, literal: &tail[..literal_end] }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(scanner: &mut BoundaryFinder, chunks: &[&[u8]]) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        let mut matched = false;
        for chunk in chunks {
            match scanner.scan(chunk) {
                ScanResult::NoMatch { reconstructed, literal } => {
                    out.extend_from_slice(&reconstructed);
                    out.extend_from_slice(literal);
                }
                ScanResult::Match { reconstructed, literal, rest: _ } => {
                    out.extend_from_slice(&reconstructed);
                    out.extend_from_slice(literal);
                    matched = true;
                    break;
                }
            }
        }
        (out, matched)
    }

    #[test]
    fn finds_boundary_in_one_chunk() {
        let mut scanner = BoundaryFinder::new(b"xyz");
        let (body, matched) = collect(&mut scanner, &[b"hello world\r\n--xyz"]);
        assert!(matched);
        assert_eq!(body, b"hello world");
    }

    #[test]
    fn boundary_split_across_chunks() {
        let mut scanner = BoundaryFinder::new(b"xyz");
        let (body, matched) = collect(&mut scanner, &[b"hello\r\n--x", b"yz"]);
        assert!(matched);
        assert_eq!(body, b"hello");
    }

    #[test]
    fn false_partial_match_is_flushed_as_body() {
        let mut scanner = BoundaryFinder::new(b"xyz");
        // "\r\n--x" looks like the start of the boundary but is followed by
        // "q", not "yz" -- it was body data all along.
        let (body, matched) = collect(&mut scanner, &[b"hello\r\n--x", b"q more data\r\n--xyz"]);
        assert!(matched);
        assert_eq!(body, b"hello\r\n--xq more data");
    }

    #[test]
    fn no_boundary_at_all() {
        let mut scanner = BoundaryFinder::new(b"xyz");
        let (body, matched) = collect(&mut scanner, &[b"just some data"]);
        assert!(!matched);
        assert_eq!(body, b"just some data");
    }

    #[test]
    fn byte_by_byte_matches_whole_chunk_result() {
        let data = b"hello\r\n--xyz".to_vec();
        let mut whole_scanner = BoundaryFinder::new(b"xyz");
        let (whole, whole_matched) = collect(&mut whole_scanner, &[&data]);

        let mut byte_scanner = BoundaryFinder::new(b"xyz");
        let chunks: Vec<&[u8]> = data.iter().map(std::slice::from_ref).collect();
        let (byte_by_byte, byte_matched) = collect(&mut byte_scanner, &chunks);

        assert_eq!(whole_matched, byte_matched);
        assert_eq!(whole, byte_by_byte);
    }
}
