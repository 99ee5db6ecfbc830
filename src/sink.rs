//! The `Sink` trait: the narrow interface decoders and `File` write through.
//!
//! A `Sink` is anything that can receive a stream of bytes in arbitrary-sized
//! pieces and be told when the stream is done. `Base64Decoder` and
//! `QuotedPrintableDecoder` both wrap a downstream `Sink`; `File` implements
//! it directly so a decoder can write straight into a field's backing store.

use std::io;

/// A destination for decoded bytes.
///
/// `write` may accept fewer bytes than it was given; callers must loop on the
/// returned count exactly as they would with `std::io::Write`. `finalize` is
/// called once, after all input bytes have been written, to let the sink flush
/// any bytes it was holding back (e.g. a decoder's pending partial group).
/// `close` runs after `finalize` and releases any resources (open file
/// handles) the sink holds; it is infallible because callers cannot act on a
/// close failure.
pub trait Sink {
    /// Write as many of `data`'s bytes as possible, returning the count
    /// accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flush any bytes held back pending more input. Called exactly once,
    /// after the final `write`.
    fn finalize(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Release resources. Called exactly once, after `finalize`.
    fn close(&mut self) {}
}

impl Sink for Vec<u8> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(data);
        Ok(data.len())
    }
}

impl<T: Sink + ?Sized> Sink for &mut T {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn finalize(&mut self) -> io::Result<()> {
        (**self).finalize()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
