//! `multipart/form-data` parsing: the boundary-finding state machine over
//! part headers and bodies.

mod boundary;

use crate::error::{ConfigError, MultipartParseError};
use boundary::{BoundaryFinder, ScanResult};

/// Callbacks a [`MultipartParser`] drives. Every method defaults to a
/// no-op.
pub trait MultipartCallbacks {
    /// A new part has started (its headers are about to be read).
    fn on_part_begin(&mut self) {}
    /// A run of consecutive header-name bytes.
    fn on_header_field(&mut self, _data: &[u8]) {}
    /// A run of consecutive header-value bytes.
    fn on_header_value(&mut self, _data: &[u8]) {}
    /// One header line is complete.
    fn on_header_end(&mut self) {}
    /// The blank line ending the headers section was seen.
    fn on_headers_finished(&mut self) {}
    /// A run of consecutive part-body bytes.
    fn on_part_data(&mut self, _data: &[u8]) {}
    /// The current part's body is complete.
    fn on_part_end(&mut self) {}
    /// The closing boundary has been consumed.
    fn on_end(&mut self) {}

    /// A facade layered on top of this parser recorded a fatal error while
    /// handling a callback above. Once this returns `true`, the driving
    /// [`MultipartParser::write`] stops dispatching further callbacks for
    /// the remainder of the buffer it was given, rather than finishing the
    /// scan and surfacing the error only at the end.
    fn is_poisoned(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Discarding bytes before the first boundary.
    Preamble,
    /// Just matched a boundary delimiter; deciding whether it is the
    /// terminator (`--`) or introduces a new part (`CRLF`).
    AfterBoundary,
    HeaderFieldStart,
    HeaderField,
    HeaderValueStart,
    HeaderValue,
    HeaderValueAlmostDone,
    HeadersAlmostDone,
    PartData,
    End,
}

/// Streaming parser for `multipart/form-data` bodies.
pub struct MultipartParser<C> {
    callbacks: C,
    state: State,
    start_finder: BoundaryFinder,
    body_finder: BoundaryFinder,
    /// Up to 2 bytes following a matched boundary, while deciding terminator
    /// vs. new-part.
    boundary_tail: Vec<u8>,
    /// Byte offset of the first (as yet unseen) byte of `boundary_tail`,
    /// captured when the tail starts accumulating so a `BadStartBoundary`
    /// raised after the tail is split across `write` calls still reports
    /// the offset of its first byte, not its last.
    boundary_tail_offset: u64,
    max_size: u64,
    received: u64,
}

impl<C: MultipartCallbacks> MultipartParser<C> {
    /// Construct a parser for parts delimited by `boundary`. `max_size` of
    /// `Some(0)` is a configuration error.
    pub fn new(callbacks: C, boundary: &[u8], max_size: Option<u64>) -> Result<Self, ConfigError> {
        let max_size = match max_size {
            Some(0) => return Err(ConfigError::InvalidMaxSize),
            Some(n) => n,
            None => u64::MAX,
        };

        Ok(MultipartParser {
            callbacks,
            state: State::Preamble,
            start_finder: BoundaryFinder::new_start(boundary),
            body_finder: BoundaryFinder::new(boundary),
            boundary_tail: Vec::with_capacity(2),
            boundary_tail_offset: 0,
            max_size,
            received: 0,
        })
    }

    /// Feed a chunk of body bytes. Returns the number of bytes accepted,
    /// which is `data.len()` unless `max_size` was reached, in which case
    /// it is the accepted prefix length.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, MultipartParseError> {
        let mut pos = 0;

        while pos < data.len() {
            if self.received >= self.max_size || self.callbacks.is_poisoned() {
                break;
            }

            let budget = (self.max_size - self.received) as usize;
            let before = pos;
            pos = match self.state {
                State::Preamble => self.step_preamble(data, pos)?,
                State::AfterBoundary => self.step_after_boundary(data, pos)?,
                State::HeaderFieldStart => self.step_header_field_start(data, pos)?,
                State::HeaderField => self.step_header_field(data, pos, budget),
                State::HeaderValueStart => self.step_header_value_start(data, pos),
                State::HeaderValue => self.step_header_value(data, pos, budget),
                State::HeaderValueAlmostDone => self.step_header_value_almost_done(data, pos)?,
                State::HeadersAlmostDone => self.step_headers_almost_done(data, pos)?,
                State::PartData => self.step_part_data(data, pos, budget)?,
                State::End => data.len(),
            };

            self.received += (pos - before) as u64;
        }

        Ok(pos)
    }

    /// Signal end of input. Errors if a closing boundary was never seen.
    pub fn finalize(&mut self) -> Result<(), MultipartParseError> {
        if self.state != State::End {
            return Err(MultipartParseError::UnexpectedEnd(Some(self.received as usize)));
        }
        self.callbacks.on_end();
        Ok(())
    }

    /// Consume the parser, returning the callbacks.
    pub fn into_callbacks(self) -> C {
        self.callbacks
    }

    /// Borrow the callbacks mutably, for facades layered on top.
    pub(crate) fn callbacks_mut_ref(&mut self) -> &mut C {
        &mut self.callbacks
    }

    fn step_preamble(&mut self, data: &[u8], pos: usize) -> Result<usize, MultipartParseError> {
        match self.start_finder.scan(&data[pos..]) {
            ScanResult::NoMatch { .. } => Ok(data.len()),
            ScanResult::Match { rest, .. } => {
                self.state = State::AfterBoundary;
                Ok(data.len() - rest.len())
            }
        }
    }

    fn step_after_boundary(&mut self, data: &[u8], pos: usize) -> Result<usize, MultipartParseError> {
        if self.boundary_tail.is_empty() {
            self.boundary_tail_offset = self.received;
        }

        let need = 2 - self.boundary_tail.len();
        let avail = need.min(data.len() - pos);
        self.boundary_tail.extend_from_slice(&data[pos..pos + avail]);
        let pos = pos + avail;

        if self.boundary_tail.len() < 2 {
            return Ok(pos);
        }

        let outcome = match self.boundary_tail.as_slice() {
            b"--" => {
                self.state = State::End;
                Ok(())
            }
            b"\r\n" => {
                self.callbacks.on_part_begin();
                self.state = State::HeaderFieldStart;
                Ok(())
            }
            _ => Err(MultipartParseError::BadStartBoundary(Some(self.boundary_tail_offset as usize))),
        };
        self.boundary_tail.clear();
        outcome.map(|()| pos)
    }

    fn step_header_field_start(&mut self, data: &[u8], pos: usize) -> Result<usize, MultipartParseError> {
        if data[pos] == b'\r' {
            self.state = State::HeadersAlmostDone;
            Ok(pos + 1)
        } else {
            self.state = State::HeaderField;
            Ok(pos)
        }
    }

    fn step_header_field(&mut self, data: &[u8], pos: usize, budget: usize) -> usize {
        let end = pos + budget.min(data.len() - pos);
        match data[pos..end].iter().position(|&b| b == b':') {
            Some(idx) => {
                if idx > 0 {
                    self.callbacks.on_header_field(&data[pos..pos + idx]);
                }
                self.state = State::HeaderValueStart;
                pos + idx + 1
            }
            None => {
                if !data[pos..end].is_empty() {
                    self.callbacks.on_header_field(&data[pos..end]);
                }
                end
            }
        }
    }

    fn step_header_value_start(&mut self, data: &[u8], pos: usize) -> usize {
        self.state = State::HeaderValue;
        if data[pos] == b' ' {
            pos + 1
        } else {
            pos
        }
    }

    fn step_header_value(&mut self, data: &[u8], pos: usize, budget: usize) -> usize {
        let end = pos + budget.min(data.len() - pos);
        match data[pos..end].iter().position(|&b| b == b'\r') {
            Some(idx) => {
                if idx > 0 {
                    self.callbacks.on_header_value(&data[pos..pos + idx]);
                }
                self.state = State::HeaderValueAlmostDone;
                pos + idx + 1
            }
            None => {
                if !data[pos..end].is_empty() {
                    self.callbacks.on_header_value(&data[pos..end]);
                }
                end
            }
        }
    }

    fn step_header_value_almost_done(
        &mut self,
        data: &[u8],
        pos: usize,
    ) -> Result<usize, MultipartParseError> {
        if data[pos] != b'\n' {
            return Err(MultipartParseError::MalformedHeader(
                Some(self.received as usize),
                "expected LF after CR ending a header line".into(),
            ));
        }
        self.callbacks.on_header_end();
        self.state = State::HeaderFieldStart;
        Ok(pos + 1)
    }

    fn step_headers_almost_done(&mut self, data: &[u8], pos: usize) -> Result<usize, MultipartParseError> {
        if data[pos] != b'\n' {
            return Err(MultipartParseError::MalformedHeader(
                Some(self.received as usize),
                "expected LF after CR ending the headers section".into(),
            ));
        }
        self.callbacks.on_headers_finished();
        self.state = State::PartData;
        Ok(pos + 1)
    }

    fn step_part_data(&mut self, data: &[u8], pos: usize, budget: usize) -> Result<usize, MultipartParseError> {
        let end = pos + budget.min(data.len() - pos);
        match self.body_finder.scan(&data[pos..end]) {
            ScanResult::NoMatch { reconstructed, literal } => {
                if !reconstructed.is_empty() {
                    self.callbacks.on_part_data(&reconstructed);
                }
                if !literal.is_empty() {
                    self.callbacks.on_part_data(literal);
                }
                Ok(end)
            }
            ScanResult::Match { reconstructed, literal, rest } => {
                if !reconstructed.is_empty() {
                    self.callbacks.on_part_data(&reconstructed);
                }
                if !literal.is_empty() {
                    self.callbacks.on_part_data(literal);
                }
                self.callbacks.on_part_end();
                self.state = State::AfterBoundary;
                Ok(end - rest.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Part {
        headers: Vec<(Vec<u8>, Vec<u8>)>,
        data: Vec<u8>,
    }

    #[derive(Default)]
    struct Recorder {
        parts: Vec<Part>,
        cur_field: Vec<u8>,
        cur_value: Vec<u8>,
        ended: bool,
    }

    impl MultipartCallbacks for Recorder {
        fn on_part_begin(&mut self) {
            self.parts.push(Part::default());
        }
        fn on_header_field(&mut self, data: &[u8]) {
            self.cur_field.extend_from_slice(data);
        }
        fn on_header_value(&mut self, data: &[u8]) {
            self.cur_value.extend_from_slice(data);
        }
        fn on_header_end(&mut self) {
            let field = std::mem::take(&mut self.cur_field);
            let value = std::mem::take(&mut self.cur_value);
            self.parts.last_mut().unwrap().headers.push((field, value));
        }
        fn on_part_data(&mut self, data: &[u8]) {
            self.parts.last_mut().unwrap().data.extend_from_slice(data);
        }
        fn on_end(&mut self) {
            self.ended = true;
        }
    }

    fn body(boundary: &str, parts: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (headers, data) in parts {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            out.extend_from_slice(headers.as_bytes());
            out.extend_from_slice(b"\r\n\r\n");
            out.extend_from_slice(data.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        out
    }

    #[test]
    fn one_field_one_file_fed_whole() {
        let data = body(
            "XYZ",
            &[
                ("Content-Disposition: form-data; name=\"field\"", "test1"),
                (
                    "Content-Disposition: form-data; name=\"file\"; filename=\"file.txt\"\r\nContent-Type: text/plain",
                    "test2",
                ),
            ],
        );

        let mut parser = MultipartParser::new(Recorder::default(), b"XYZ", None).unwrap();
        parser.write(&data).unwrap();
        parser.finalize().unwrap();
        let rec = parser.into_callbacks();

        assert!(rec.ended);
        assert_eq!(rec.parts.len(), 2);
        assert_eq!(rec.parts[0].data, b"test1");
        assert_eq!(rec.parts[1].data, b"test2");
        assert_eq!(
            rec.parts[1].headers[0],
            (
                b"Content-Disposition".to_vec(),
                b"form-data; name=\"file\"; filename=\"file.txt\"".to_vec()
            )
        );
    }

    #[test]
    fn byte_by_byte_matches_whole_write() {
        let data = body("XYZ", &[("Content-Disposition: form-data; name=\"field\"", "test1")]);

        let mut parser = MultipartParser::new(Recorder::default(), b"XYZ", None).unwrap();
        for byte in &data {
            parser.write(std::slice::from_ref(byte)).unwrap();
        }
        parser.finalize().unwrap();
        let rec = parser.into_callbacks();

        assert!(rec.ended);
        assert_eq!(rec.parts.len(), 1);
        assert_eq!(rec.parts[0].data, b"test1");
    }

    #[test]
    fn bad_start_boundary_crlf_then_garbage_is_rejected() {
        let mut parser = MultipartParser::new(Recorder::default(), b"boundary", None).unwrap();
        let err = parser.write(b"--boundary\rfoobar").unwrap_err();
        assert!(matches!(err, MultipartParseError::BadStartBoundary(_)));
    }

    #[test]
    fn bad_start_boundary_no_separator_is_rejected() {
        let mut parser = MultipartParser::new(Recorder::default(), b"boundary", None).unwrap();
        let err = parser.write(b"--boundaryfoobar").unwrap_err();
        assert!(matches!(err, MultipartParseError::BadStartBoundary(_)));
    }

    #[test]
    fn truncated_body_errors_on_finalize() {
        let mut parser = MultipartParser::new(Recorder::default(), b"XYZ", None).unwrap();
        parser
            .write(b"--XYZ\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\npartial")
            .unwrap();
        assert!(parser.finalize().is_err());
    }

    #[test]
    fn zero_max_size_is_a_config_error() {
        assert!(MultipartParser::new(Recorder::default(), b"XYZ", Some(0)).is_err());
    }

    #[test]
    fn max_size_truncates_part_data_and_returns_accepted_prefix() {
        let part_data = "a".repeat(100);
        let data = body("XYZ", &[("Content-Disposition: form-data; name=\"f\"", &part_data)]);
        let half = data.len() as u64 / 2;

        let mut parser = MultipartParser::new(Recorder::default(), b"XYZ", Some(half)).unwrap();
        let accepted = parser.write(&data).unwrap();
        assert_eq!(accepted as u64, half);
    }

    #[test]
    fn max_size_truncates_mid_header_and_returns_accepted_prefix() {
        let data = body("XYZ", &[("Content-Disposition: form-data; name=\"field-with-a-long-name\"", "x")]);
        let cap = 20u64;

        let mut parser = MultipartParser::new(Recorder::default(), b"XYZ", Some(cap)).unwrap();
        let accepted = parser.write(&data).unwrap();
        assert_eq!(accepted as u64, cap);
    }
}
