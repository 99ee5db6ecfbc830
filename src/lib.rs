// Copyright 2017 `multipart-async` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! A streaming, chunk-agnostic parser for HTTP request bodies: `multipart/form-data`,
//! `application/x-www-form-urlencoded`, and `application/octet-stream`.
//!
//! Every parser in this crate is callback-driven and byte-oriented: feed it bytes through
//! `write` in whatever chunk sizes your I/O layer happens to hand you (a single byte at a time
//! is a supported, tested case), and it drives the matching `*Callbacks` trait as soon as it has
//! enough to report. Nothing is buffered beyond what's needed to resolve a boundary, header, or
//! escape sequence that straddles a chunk.
//!
//! For most callers, [`create_form_parser`] or [`parse_form`] is the entry point: they inspect
//! `Content-Type`, pick the right parser, and assemble [`Field`]s and [`File`]s for you via
//! [`FormCallbacks`]. Reach for the lower-level parsers in the `multipart`, `querystring`, and
//! `octet_stream` modules directly if you need the raw callback stream instead.
#![deny(missing_docs)]

#[macro_use]
extern crate log;

pub extern crate http;

mod config;
mod decode;
mod error;
mod field;
mod file;
mod form_parser;
mod header_params;
mod multipart;
mod octet_stream;
mod querystring;
mod sink;

pub use config::Config;
pub use error::{ConfigError, DecodeError, FileError, FormParserError, MultipartParseError, QuerystringParseError};
pub use field::Field;
pub use file::File;
pub use form_parser::{create_form_parser, parse_form, FormCallbacks, FormParser};
pub use header_params::{parse as parse_header_params, HeaderParams};
pub use sink::Sink;

pub use multipart::{MultipartCallbacks, MultipartParser};
pub use octet_stream::{OctetStreamCallbacks, OctetStreamParser};
pub use querystring::{QuerystringCallbacks, QuerystringParser};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Collected {
        fields: Vec<(Vec<u8>, Option<Vec<u8>>)>,
        files: Vec<(String, Option<String>, Vec<u8>)>,
        ended: bool,
    }

    struct Collector(Rc<RefCell<Collected>>);

    impl FormCallbacks for Collector {
        fn on_field(&mut self, field: Field) {
            self.0.borrow_mut().fields.push((field.field_name.clone(), field.value().map(|v| v.to_vec())));
        }
        fn on_file(&mut self, file: File) {
            let contents = file.memory_contents().map(|b| b.to_vec()).unwrap_or_default();
            let mut collected = self.0.borrow_mut();
            collected.files.push((file.field_name.clone(), file.file_name.clone(), contents));
        }
        fn on_end(&mut self) {
            self.0.borrow_mut().ended = true;
        }
    }

    fn headers_with_content_type(ct: &str) -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, ct.parse().unwrap());
        headers
    }

    #[test]
    fn multipart_round_trip_through_form_parser() {
        let body = b"--XYZ\r\n\
Content-Disposition: form-data; name=\"field\"\r\n\
\r\n\
hello\r\n\
--XYZ\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"f.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
file contents\r\n\
--XYZ--\r\n";

        let headers = headers_with_content_type("multipart/form-data; boundary=XYZ");
        let state = Rc::new(RefCell::new(Collected::default()));
        let mut parser = create_form_parser(&headers, Collector(state.clone()), Config::default(), None).unwrap();
        parser.write(body).unwrap();
        parser.finalize().unwrap();

        let collected = state.borrow();
        assert!(collected.ended);
        assert_eq!(collected.fields, vec![(b"field".to_vec(), Some(b"hello".to_vec()))]);
        assert_eq!(collected.files.len(), 1);
        assert_eq!(collected.files[0].0, "file");
        assert_eq!(collected.files[0].1.as_deref(), Some("f.txt"));
        assert_eq!(collected.files[0].2, b"file contents");
    }

    #[test]
    fn base64_part_is_decoded_before_reaching_the_file() {
        let body = b"--XYZ\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"f.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
aGVsbG8=\r\n\
--XYZ--\r\n";

        let headers = headers_with_content_type("multipart/form-data; boundary=XYZ");
        let state = Rc::new(RefCell::new(Collected::default()));
        let mut parser = create_form_parser(&headers, Collector(state.clone()), Config::default(), None).unwrap();
        parser.write(body).unwrap();
        parser.finalize().unwrap();

        assert_eq!(state.borrow().files[0].2, b"hello");
    }

    #[test]
    fn querystring_round_trip_through_form_parser() {
        let headers = headers_with_content_type("application/x-www-form-urlencoded");
        let state = Rc::new(RefCell::new(Collected::default()));
        let mut parser = create_form_parser(&headers, Collector(state.clone()), Config::default(), None).unwrap();
        parser.write(b"a=1&b=2").unwrap();
        parser.finalize().unwrap();

        assert_eq!(
            state.borrow().fields,
            vec![(b"a".to_vec(), Some(b"1".to_vec())), (b"b".to_vec(), Some(b"2".to_vec()))]
        );
    }

    #[test]
    fn octet_stream_round_trip_through_form_parser() {
        let headers = headers_with_content_type("application/octet-stream");
        let state = Rc::new(RefCell::new(Collected::default()));
        let mut parser = create_form_parser(
            &headers,
            Collector(state.clone()),
            Config::default(),
            Some("upload.bin".to_string()),
        )
        .unwrap();
        parser.write(b"raw bytes").unwrap();
        parser.finalize().unwrap();

        assert_eq!(state.borrow().files[0].2, b"raw bytes");
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let headers = headers_with_content_type("text/plain");
        let state = Rc::new(RefCell::new(Collected::default()));
        let err = create_form_parser(&headers, Collector(state), Config::default(), None).unwrap_err();
        assert!(matches!(err, FormParserError::UnknownContentType(_)));
    }

    #[test]
    fn multipart_without_boundary_is_rejected() {
        let headers = headers_with_content_type("multipart/form-data");
        let state = Rc::new(RefCell::new(Collected::default()));
        let err = create_form_parser(&headers, Collector(state), Config::default(), None).unwrap_err();
        assert!(matches!(err, FormParserError::MissingBoundary));
    }
}
