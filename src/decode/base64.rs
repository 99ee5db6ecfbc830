//! Streaming RFC 4648 Base64 decoding.

use crate::error::DecodeError;
use crate::sink::Sink;
use std::io;

const INVALID: u8 = 0xff;
const PAD: u8 = 0xfe;

fn decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let alphabet = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    for (i, &b) in alphabet.iter().enumerate() {
        table[b as usize] = i as u8;
    }
    table[b'=' as usize] = PAD;
    table
}

/// A [`Sink`] that decodes Base64-encoded bytes written to it and forwards
/// the decoded bytes to a downstream sink.
pub struct Base64Decoder<W> {
    inner: W,
    /// Up to 3 pending encoded bytes not yet forming a full 4-byte group.
    buf: Vec<u8>,
}

impl<W: Sink> Base64Decoder<W> {
    /// Wrap `inner`, decoding Base64 into it as data is written.
    pub fn new(inner: W) -> Self {
        Base64Decoder { inner, buf: Vec::with_capacity(4) }
    }

    /// Unwrap the decoder, discarding any incomplete trailing group.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn decode_group(&mut self, group: &[u8; 4]) -> io::Result<()> {
        let table = decode_table();
        let mut vals = [0u8; 4];
        let mut pad_count = 0;

        for (i, &b) in group.iter().enumerate() {
            let v = table[b as usize];
            if v == INVALID {
                return Err(io::Error::new(io::ErrorKind::InvalidData, DecodeError::InvalidByte(b)));
            }
            if v == PAD {
                pad_count += 1;
                // padding must only appear in the trailing position(s)
                if i < 2 {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, DecodeError::InvalidByte(b)));
                }
            } else if pad_count > 0 {
                // a data byte after padding started within the group
                return Err(io::Error::new(io::ErrorKind::InvalidData, DecodeError::InvalidByte(b)));
            } else {
                vals[i] = v;
            }
        }

        let b0 = (vals[0] << 2) | (vals[1] >> 4);
        let b1 = (vals[1] << 4) | (vals[2] >> 2);
        let b2 = (vals[2] << 6) | vals[3];

        let out: &[u8] = match pad_count {
            0 => &[b0, b1, b2],
            1 => &[b0, b1],
            2 => &[b0],
            _ => return Err(io::Error::new(io::ErrorKind::InvalidData, DecodeError::InvalidLength)),
        };

        write_all(&mut self.inner, out)
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

impl<W: Sink> Sink for Base64Decoder<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let total = data.len();
        let mut data = data;

        while !data.is_empty() {
            let need = 4 - self.buf.len();
            let take = need.min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.buf.len() == 4 {
                let group: [u8; 4] = [self.buf[0], self.buf[1], self.buf[2], self.buf[3]];
                self.decode_group(&group)?;
                self.buf.clear();
            }
        }

        Ok(total)
    }

    fn finalize(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, DecodeError::InvalidLength));
        }
        self.inner.finalize()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut decoder = Base64Decoder::new(&mut out);
            for chunk in chunks {
                decoder.write(chunk)?;
            }
            decoder.finalize()?;
        }
        Ok(out)
    }

    #[test]
    fn decodes_across_writes() {
        let out = decode_all(&[b"Zm9v", b"YmFy"]).unwrap();
        assert_eq!(out, b"foobar");
    }

    #[test]
    fn split_at_every_position_is_invariant() {
        let encoded = b"Zm9vYmFy";
        let whole = decode_all(&[encoded]).unwrap();
        for k in 1..encoded.len() {
            let (a, b) = encoded.split_at(k);
            let split = decode_all(&[a, b]).unwrap();
            assert_eq!(split, whole);
        }
    }

    #[test]
    fn truncated_group_errors_on_finalize() {
        let mut out = Vec::new();
        let mut decoder = Base64Decoder::new(&mut out);
        decoder.write(b"Zm9vYmF").unwrap();
        assert!(decoder.finalize().is_err());
    }

    #[test]
    fn invalid_byte_errors() {
        let mut out = Vec::new();
        let mut decoder = Base64Decoder::new(&mut out);
        assert!(decoder.write(b"Zm9!").is_err());
    }
}
