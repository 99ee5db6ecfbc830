//! `FormParser`: the facade that picks a parser by `Content-Type` and wires
//! its callbacks into `Field`/`File` construction.

use crate::config::Config;
use crate::decode::{Base64Decoder, QuotedPrintableDecoder};
use crate::error::{ConfigError, FileError, FormParserError, MultipartParseError};
use crate::field::Field;
use crate::file::File;
use crate::header_params;
use crate::multipart::{MultipartCallbacks, MultipartParser};
use crate::octet_stream::{OctetStreamCallbacks, OctetStreamParser};
use crate::querystring::{QuerystringCallbacks, QuerystringParser};
use crate::sink::Sink;
use std::io;

/// Callbacks the facade emits: one `Field`/`File` per submitted part, in
/// order, and an optional end-of-body notification.
pub trait FormCallbacks {
    /// A plain field (no filename) has been fully received.
    fn on_field(&mut self, field: Field);
    /// A file upload has been fully received.
    fn on_file(&mut self, file: File);
    /// The body has been completely parsed.
    fn on_end(&mut self) {}
}

fn max_size_opt(config: &Config) -> Option<u64> {
    if config.max_size == u64::MAX {
        None
    } else {
        Some(config.max_size)
    }
}

enum FileSink {
    Plain(File),
    Base64(Base64Decoder<File>),
    QuotedPrintable(QuotedPrintableDecoder<File>),
}

impl FileSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            FileSink::Plain(f) => Sink::write(f, data),
            FileSink::Base64(d) => d.write(data),
            FileSink::QuotedPrintable(d) => d.write(data),
        }
    }

    fn finalize_into_file(mut self) -> io::Result<File> {
        match &mut self {
            FileSink::Plain(_) => {}
            FileSink::Base64(d) => d.finalize()?,
            FileSink::QuotedPrintable(d) => d.finalize()?,
        }
        Ok(match self {
            FileSink::Plain(f) => f,
            FileSink::Base64(d) => d.into_inner(),
            FileSink::QuotedPrintable(d) => d.into_inner(),
        })
    }
}

enum PartTarget {
    Field(Field),
    File(FileSink),
}

/// Shared state driving `Field`/`File` construction for whichever
/// underlying parser is active; implements all three parsers' callback
/// traits so one type can back any of them.
struct FormState<F> {
    callbacks: F,
    config: Config,
    pending_error: Option<FormParserError>,

    // multipart per-part scratch
    cur_header_name: Vec<u8>,
    cur_header_value: Vec<u8>,
    part_headers: Vec<(Vec<u8>, Vec<u8>)>,
    current: Option<PartTarget>,

    // octet-stream scratch
    octet_stream_file_name: Option<String>,

    // querystring scratch
    qs_name: Vec<u8>,
    qs_value: Option<Vec<u8>>,
}

impl<F: FormCallbacks> FormState<F> {
    fn new(callbacks: F, config: Config) -> Self {
        FormState {
            callbacks,
            config,
            pending_error: None,
            cur_header_name: Vec::new(),
            cur_header_value: Vec::new(),
            part_headers: Vec::new(),
            current: None,
            octet_stream_file_name: None,
            qs_name: Vec::new(),
            qs_value: None,
        }
    }

    fn header(&self, name: &str) -> Option<&[u8]> {
        self.part_headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, v)| v.as_slice())
    }
}

impl<F: FormCallbacks> QuerystringCallbacks for FormState<F> {
    fn on_field_start(&mut self) {
        self.qs_name.clear();
        self.qs_value = None;
    }

    fn on_field_name(&mut self, data: &[u8]) {
        self.qs_name.extend_from_slice(data);
    }

    fn on_field_data(&mut self, data: &[u8]) {
        self.qs_value.get_or_insert_with(Vec::new).extend_from_slice(data);
    }

    fn on_field_end(&mut self) {
        let mut field = Field::new(std::mem::take(&mut self.qs_name));
        if let Some(value) = self.qs_value.take() {
            field.write(&value);
        }
        field.finalize();
        self.callbacks.on_field(field);
    }
}

impl<F: FormCallbacks> OctetStreamCallbacks for FormState<F> {
    fn on_start(&mut self) {
        let name = self.octet_stream_file_name.clone();
        let field_name = name.clone().unwrap_or_default();
        self.current = Some(PartTarget::File(FileSink::Plain(File::new(
            field_name,
            name,
            self.config.clone(),
        ))));
    }

    fn on_data(&mut self, data: &[u8]) {
        if let Some(PartTarget::File(sink)) = &mut self.current {
            if let Err(e) = sink.write(data) {
                self.pending_error = Some(FormParserError::File(FileError::Write(e)));
            }
        }
    }

    fn on_end(&mut self) {
        if let Some(PartTarget::File(sink)) = self.current.take() {
            match sink.finalize_into_file() {
                Ok(mut file) => {
                    file.close();
                    self.callbacks.on_file(file);
                }
                Err(e) => self.pending_error = Some(FormParserError::File(FileError::Write(e))),
            }
        }
        self.callbacks.on_end();
    }
}

impl<F: FormCallbacks> MultipartCallbacks for FormState<F> {
    fn on_part_begin(&mut self) {
        self.cur_header_name.clear();
        self.cur_header_value.clear();
        self.part_headers.clear();
        self.current = None;
    }

    fn on_header_field(&mut self, data: &[u8]) {
        self.cur_header_name.extend_from_slice(data);
    }

    fn on_header_value(&mut self, data: &[u8]) {
        self.cur_header_value.extend_from_slice(data);
    }

    fn on_header_end(&mut self) {
        let name = std::mem::take(&mut self.cur_header_name);
        let value = std::mem::take(&mut self.cur_header_value);
        self.part_headers.push((name, value));
    }

    fn on_headers_finished(&mut self) {
        let cont_disp = match self.header("Content-Disposition") {
            Some(v) => v.to_vec(),
            None => {
                self.pending_error = Some(MultipartParseError::MissingName(None).into());
                return;
            }
        };

        let parsed = header_params::parse(&cont_disp);
        let field_name = match parsed.get("name") {
            Some(n) => String::from_utf8_lossy(n).into_owned(),
            None => {
                self.pending_error = Some(MultipartParseError::MissingName(None).into());
                return;
            }
        };
        let filename = parsed.get("filename").map(|n| String::from_utf8_lossy(n).into_owned());

        let cte = self
            .header("Content-Transfer-Encoding")
            .map(|v| String::from_utf8_lossy(v).trim().to_ascii_lowercase());

        let sink_for_file = |file: File, cte: Option<&str>, config: &Config| -> Result<FileSink, FormParserError> {
            match cte {
                None | Some("binary") | Some("7bit") | Some("8bit") => Ok(FileSink::Plain(file)),
                Some("base64") => Ok(FileSink::Base64(Base64Decoder::new(file))),
                Some("quoted-printable") => Ok(FileSink::QuotedPrintable(QuotedPrintableDecoder::new(file))),
                Some(_) if config.upload_error_on_bad_cte => {
                    Err(FormParserError::UnknownContentType("unsupported Content-Transfer-Encoding".into()))
                }
                Some(_) => Ok(FileSink::Plain(file)),
            }
        };

        if let Some(filename) = filename {
            let file = File::new(field_name, Some(filename), self.config.clone());
            match sink_for_file(file, cte.as_deref(), &self.config) {
                Ok(sink) => self.current = Some(PartTarget::File(sink)),
                Err(e) => self.pending_error = Some(e),
            }
        } else {
            self.current = Some(PartTarget::Field(Field::new(field_name.into_bytes())));
        }
    }

    fn on_part_data(&mut self, data: &[u8]) {
        match &mut self.current {
            Some(PartTarget::Field(field)) => field.write(data),
            Some(PartTarget::File(sink)) => {
                if let Err(e) = sink.write(data) {
                    self.pending_error = Some(FormParserError::File(FileError::Write(e)));
                }
            }
            None => {}
        }
    }

    fn on_part_end(&mut self) {
        match self.current.take() {
            Some(PartTarget::Field(mut field)) => {
                field.finalize();
                self.callbacks.on_field(field);
            }
            Some(PartTarget::File(sink)) => match sink.finalize_into_file() {
                Ok(mut file) => {
                    file.close();
                    self.callbacks.on_file(file);
                }
                Err(e) => self.pending_error = Some(FormParserError::File(FileError::Write(e))),
            },
            None => {}
        }
    }

    fn on_end(&mut self) {
        self.callbacks.on_end();
    }

    fn is_poisoned(&self) -> bool {
        self.pending_error.is_some()
    }
}

enum Inner<F: FormCallbacks> {
    Multipart(MultipartParser<FormState<F>>),
    Querystring(QuerystringParser<FormState<F>>),
    OctetStream(OctetStreamParser<FormState<F>>),
}

/// The facade dispatching a body to the right parser based on
/// `Content-Type`, and assembling `Field`/`File` objects from its events.
pub struct FormParser<F: FormCallbacks> {
    inner: Inner<F>,
}

impl<F: FormCallbacks> FormParser<F> {
    fn pending_error(&mut self) -> Option<FormParserError> {
        match &mut self.inner {
            Inner::Multipart(p) => take_pending(p.callbacks_mut()),
            Inner::Querystring(p) => take_pending(p.callbacks_mut()),
            Inner::OctetStream(p) => take_pending(p.callbacks_mut()),
        }
    }

    /// Feed a chunk of body bytes. Returns the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FormParserError> {
        let n = match &mut self.inner {
            Inner::Multipart(p) => p.write(data)?,
            Inner::Querystring(p) => p.write(data)?,
            Inner::OctetStream(p) => p.write(data),
        };
        if let Some(e) = self.pending_error() {
            return Err(e);
        }
        Ok(n)
    }

    /// Signal end of input.
    pub fn finalize(&mut self) -> Result<(), FormParserError> {
        match &mut self.inner {
            Inner::Multipart(p) => p.finalize()?,
            Inner::Querystring(p) => p.finalize()?,
            Inner::OctetStream(p) => p.finalize(),
        }
        if let Some(e) = self.pending_error() {
            return Err(e);
        }
        Ok(())
    }

    /// Consume the parser, returning the caller's callbacks.
    pub fn into_callbacks(self) -> F {
        match self.inner {
            Inner::Multipart(p) => p.into_callbacks().callbacks,
            Inner::Querystring(p) => p.into_callbacks().callbacks,
            Inner::OctetStream(p) => p.into_callbacks().callbacks,
        }
    }
}

fn take_pending<F>(state: &mut FormState<F>) -> Option<FormParserError> {
    state.pending_error.take()
}

// Small accessors so `FormParser` can reach into each parser's callbacks
// without those parsers exposing their internals publicly.
trait CallbacksMut<F> {
    fn callbacks_mut(&mut self) -> &mut FormState<F>;
}

impl<F: FormCallbacks> CallbacksMut<F> for MultipartParser<FormState<F>> {
    fn callbacks_mut(&mut self) -> &mut FormState<F> {
        self.callbacks_mut_ref()
    }
}

impl<F: FormCallbacks> CallbacksMut<F> for QuerystringParser<FormState<F>> {
    fn callbacks_mut(&mut self) -> &mut FormState<F> {
        self.callbacks_mut_ref()
    }
}

impl<F: FormCallbacks> CallbacksMut<F> for OctetStreamParser<FormState<F>> {
    fn callbacks_mut(&mut self) -> &mut FormState<F> {
        self.callbacks_mut_ref()
    }
}

/// Look up `Content-Type`, dispatch to the matching parser, and return a
/// ready-to-drive `FormParser`.
pub fn create_form_parser<F: FormCallbacks>(
    headers: &http::HeaderMap,
    callbacks: F,
    config: Config,
    octet_stream_file_name: Option<String>,
) -> Result<FormParser<F>, FormParserError> {
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .ok_or_else(|| FormParserError::UnknownContentType("<missing Content-Type>".into()))?;

    let parsed = header_params::parse(content_type.as_bytes());
    let main_value = String::from_utf8_lossy(&parsed.value).trim().to_ascii_lowercase();

    let max_size = max_size_opt(&config);
    let mut state = FormState::new(callbacks, config);
    state.octet_stream_file_name = octet_stream_file_name;

    let inner = match main_value.as_str() {
        "multipart/form-data" => {
            let boundary = parsed
                .get("boundary")
                .ok_or(FormParserError::MissingBoundary)?
                .to_vec();
            Inner::Multipart(MultipartParser::new(state, &boundary, max_size).map_err(config_err)?)
        }
        "application/x-www-form-urlencoded" | "application/x-url-encoded" => {
            Inner::Querystring(QuerystringParser::new(state, max_size, false).map_err(config_err)?)
        }
        "application/octet-stream" => {
            Inner::OctetStream(OctetStreamParser::new(state, max_size).map_err(config_err)?)
        }
        _ => return Err(FormParserError::UnknownContentType(main_value)),
    };

    Ok(FormParser { inner })
}

fn config_err(e: ConfigError) -> FormParserError {
    FormParserError::Config(e)
}

/// Drive a `FormParser` from a `Read` stream in chunks, honoring
/// `Content-Length` if present by never reading past it.
pub fn parse_form<F: FormCallbacks, R: io::Read>(
    headers: &http::HeaderMap,
    mut reader: R,
    callbacks: F,
    config: Config,
    octet_stream_file_name: Option<String>,
) -> Result<F, FormParserError> {
    let mut parser = create_form_parser(headers, callbacks, config, octet_stream_file_name)?;

    let mut remaining = headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());

    let mut buf = [0u8; 8192];
    loop {
        if let Some(0) = remaining {
            break;
        }
        let want = match remaining {
            Some(r) => (buf.len() as u64).min(r) as usize,
            None => buf.len(),
        };
        let n = reader.read(&mut buf[..want]).map_err(FileError::Write).map_err(FormParserError::File)?;
        if n == 0 {
            break;
        }

        let mut consumed = 0;
        while consumed < n {
            let written = parser.write(&buf[consumed..n])?;
            if written == 0 {
                break; // max_size reached: stop feeding, still honor the rest of Content-Length
            }
            consumed += written;
        }

        if let Some(r) = &mut remaining {
            *r -= n as u64;
        }
    }

    parser.finalize()?;
    Ok(parser.into_callbacks())
}
