//! Streaming RFC 2045 §6.7 quoted-printable decoding.

use crate::error::DecodeError;
use crate::sink::Sink;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// Not in the middle of an escape.
    None,
    /// Just saw `=`.
    AfterEquals,
    /// Saw `=\r`; a following `\n` completes a soft break, anything else
    /// starts fresh (the `\r` alone was already a valid soft break).
    AfterEqualsCr,
    /// Saw `=` followed by one hex digit, whose value is stored here.
    AfterFirstHex(u8),
}

/// A [`Sink`] that decodes quoted-printable bytes written to it and forwards
/// the decoded bytes to a downstream sink.
pub struct QuotedPrintableDecoder<W> {
    inner: W,
    state: Pending,
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

impl<W: Sink> QuotedPrintableDecoder<W> {
    /// Wrap `inner`, decoding quoted-printable into it as data is written.
    pub fn new(inner: W) -> Self {
        QuotedPrintableDecoder { inner, state: Pending::None }
    }

    /// Unwrap the decoder, discarding any incomplete trailing escape.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn push_byte(&mut self, b: u8, out: &mut Vec<u8>) -> io::Result<()> {
        match self.state {
            Pending::None => {
                if b == b'=' {
                    self.state = Pending::AfterEquals;
                } else {
                    out.push(b);
                }
                Ok(())
            }
            Pending::AfterEquals => {
                if b == b'\r' {
                    self.state = Pending::AfterEqualsCr;
                } else if b == b'\n' {
                    self.state = Pending::None;
                } else if let Some(hi) = hex_val(b) {
                    self.state = Pending::AfterFirstHex(hi);
                } else {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, DecodeError::InvalidEscape));
                }
                Ok(())
            }
            Pending::AfterEqualsCr => {
                self.state = Pending::None;
                if b == b'\n' {
                    Ok(())
                } else {
                    self.push_byte(b, out)
                }
            }
            Pending::AfterFirstHex(hi) => {
                if let Some(lo) = hex_val(b) {
                    self.state = Pending::None;
                    out.push((hi << 4) | lo);
                    Ok(())
                } else {
                    Err(io::Error::new(io::ErrorKind::InvalidData, DecodeError::InvalidEscape))
                }
            }
        }
    }
}

fn write_all<W: Sink>(sink: &mut W, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        let n = sink.write(data)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "sink accepted zero bytes"));
        }
        data = &data[n..];
    }
    Ok(())
}

impl<W: Sink> Sink for QuotedPrintableDecoder<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut out = Vec::with_capacity(data.len());
        for &b in data {
            self.push_byte(b, &mut out)?;
        }
        write_all(&mut self.inner, &out)?;
        Ok(data.len())
    }

    fn finalize(&mut self) -> io::Result<()> {
        match self.state {
            Pending::AfterEquals | Pending::AfterFirstHex(_) => {
                Err(io::Error::new(io::ErrorKind::InvalidData, DecodeError::InvalidEscape))
            }
            Pending::None | Pending::AfterEqualsCr => self.inner.finalize(),
        }
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
