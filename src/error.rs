//! Error taxonomy.
//!
//! Every error here is a plain enum or struct with a hand-written `Display`
//! and `std::error::Error` impl — no `thiserror`, matching how the rest of
//! this crate's error handling is done.

use std::fmt;
use std::io;

/// A byte offset into the input that was being processed when a parser
/// failed. `None` when the failure isn't tied to a specific position.
pub type Offset = Option<usize>;

/// Failure to decode a `Content-Transfer-Encoding`-wrapped byte stream.
#[derive(Debug)]
pub enum DecodeError {
    /// A Base64 group contained a byte outside the alphabet (and wasn't `=`).
    InvalidByte(u8),
    /// A Base64 stream ended with a number of data characters that is not a
    /// valid group length (i.e. not a multiple of 4 once padding is
    /// accounted for).
    InvalidLength,
    /// A quoted-printable escape (`=XX`) was not followed by two valid hex
    /// digits, and wasn't a soft line break (`=\r\n`).
    InvalidEscape,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidByte(b) => write!(f, "invalid encoded byte: 0x{b:02x}"),
            DecodeError::InvalidLength => write!(f, "encoded data has invalid length"),
            DecodeError::InvalidEscape => write!(f, "invalid quoted-printable escape sequence"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Failure parsing an `application/x-www-form-urlencoded` body.
#[derive(Debug, PartialEq, Eq)]
pub enum QuerystringParseError {
    /// Strict mode rejected two separators (`&`/`;`) in a row.
    EmptyKey(usize),
    /// Strict mode rejected a key with no `=` and no value.
    MissingValue(usize),
}

impl fmt::Display for QuerystringParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuerystringParseError::EmptyKey(pos) => {
                write!(f, "empty key at byte offset {pos}")
            }
            QuerystringParseError::MissingValue(pos) => {
                write!(f, "key with no value at byte offset {pos}")
            }
        }
    }
}

impl std::error::Error for QuerystringParseError {}

/// Failure parsing a `multipart/form-data` body.
#[derive(Debug)]
pub enum MultipartParseError {
    /// The data immediately following the leading `--boundary` was not a
    /// valid boundary terminator (`\r\n` or `--`). Carries the byte offset
    /// of the start of the offending terminator.
    BadStartBoundary(Offset),
    /// A part's headers could not be parsed (missing `:`, unterminated
    /// quoted value, bare LF where CRLF was required, ...). Carries the
    /// byte offset of the offending byte.
    MalformedHeader(Offset, String),
    /// A `Content-Disposition` header on a part was missing or lacked a
    /// `name` parameter. Carries the byte offset of the part's header
    /// section, when known.
    MissingName(Offset),
    /// Input ended before the closing boundary was seen. Carries the byte
    /// offset at which input ended.
    UnexpectedEnd(Offset),
    /// Underlying I/O error writing a part's data to a `Sink`. Carries the
    /// byte offset of the write that failed, when known.
    Io(Offset, String),
}

impl fmt::Display for MultipartParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartParseError::BadStartBoundary(None) => {
                write!(f, "malformed start boundary")
            }
            MultipartParseError::BadStartBoundary(Some(offset)) => {
                write!(f, "malformed start boundary at byte offset {offset}")
            }
            MultipartParseError::MalformedHeader(None, msg) => {
                write!(f, "malformed part header: {msg}")
            }
            MultipartParseError::MalformedHeader(Some(offset), msg) => {
                write!(f, "malformed part header at byte offset {offset}: {msg}")
            }
            MultipartParseError::MissingName(None) => {
                write!(f, "part is missing a name")
            }
            MultipartParseError::MissingName(Some(offset)) => {
                write!(f, "part at byte offset {offset} is missing a name")
            }
            MultipartParseError::UnexpectedEnd(None) => {
                write!(f, "input ended before the closing boundary")
            }
            MultipartParseError::UnexpectedEnd(Some(offset)) => {
                write!(f, "input ended at byte offset {offset} before the closing boundary")
            }
            MultipartParseError::Io(None, msg) => write!(f, "I/O error: {msg}"),
            MultipartParseError::Io(Some(offset), msg) => {
                write!(f, "I/O error at byte offset {offset}: {msg}")
            }
        }
    }
}

impl std::error::Error for MultipartParseError {}

impl From<io::Error> for MultipartParseError {
    fn from(err: io::Error) -> Self {
        MultipartParseError::Io(None, err.to_string())
    }
}

/// A fallible-construction failure: a bad configuration value was passed to a
/// parser constructor.
#[derive(Debug)]
pub enum ConfigError {
    /// A `max_size` argument was zero or otherwise not usable.
    InvalidMaxSize,
    /// `UPLOAD_DIR` does not exist or is not writable.
    InvalidUploadDir(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidMaxSize => write!(f, "max_size must be greater than zero"),
            ConfigError::InvalidUploadDir(dir) => {
                write!(f, "upload directory is not usable: {dir}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure creating or writing to a `File`'s backing storage.
#[derive(Debug)]
pub enum FileError {
    /// Could not create or open the backing file.
    Create(String, io::Error),
    /// Could not write to the backing file or in-memory buffer.
    Write(io::Error),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Create(path, err) => {
                write!(f, "failed to create file '{path}': {err}")
            }
            FileError::Write(err) => write!(f, "failed to write file: {err}"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Create(_, err) | FileError::Write(err) => Some(err),
        }
    }
}

/// The umbrella error returned by `FormParser` and the top-level
/// `parse_form`/`create_form_parser` entry points.
#[derive(Debug)]
pub enum FormParserError {
    /// The `Content-Type` header was missing, unparseable, or named a media
    /// type this crate does not handle.
    UnknownContentType(String),
    /// A `multipart/form-data` body had no `boundary` parameter.
    MissingBoundary,
    /// A bad value was passed to a constructor.
    Config(ConfigError),
    /// Failure inside the nested multipart parser.
    Multipart(MultipartParseError),
    /// Failure inside the nested querystring parser.
    Querystring(QuerystringParseError),
    /// Failure writing a part's data.
    File(FileError),
}

impl fmt::Display for FormParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormParserError::UnknownContentType(ct) => {
                write!(f, "unknown or unsupported Content-Type: '{ct}'")
            }
            FormParserError::MissingBoundary => {
                write!(f, "multipart/form-data Content-Type has no boundary parameter")
            }
            FormParserError::Config(err) => write!(f, "{err}"),
            FormParserError::Multipart(err) => write!(f, "{err}"),
            FormParserError::Querystring(err) => write!(f, "{err}"),
            FormParserError::File(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for FormParserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormParserError::Config(err) => Some(err),
            FormParserError::Multipart(err) => Some(err),
            FormParserError::Querystring(err) => Some(err),
            FormParserError::File(err) => Some(err),
            FormParserError::UnknownContentType(_) | FormParserError::MissingBoundary => None,
        }
    }
}

impl From<ConfigError> for FormParserError {
    fn from(err: ConfigError) -> Self {
        FormParserError::Config(err)
    }
}

impl From<MultipartParseError> for FormParserError {
    fn from(err: MultipartParseError) -> Self {
        FormParserError::Multipart(err)
    }
}

impl From<QuerystringParseError> for FormParserError {
    fn from(err: QuerystringParseError) -> Self {
        FormParserError::Querystring(err)
    }
}

impl From<FileError> for FormParserError {
    fn from(err: FileError) -> Self {
        FormParserError::File(err)
    }
}
