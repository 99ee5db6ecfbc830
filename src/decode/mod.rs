//! Streaming `Content-Transfer-Encoding` decoders.
//!
//! Both decoders here wrap a downstream [`Sink`](crate::sink::Sink) and are
//! correct no matter how the encoded bytes are split across `write` calls —
//! each buffers only the minimum residue needed to resolve a group/escape
//! that straddled a chunk boundary.

pub mod base64;
pub mod quoted_printable;

pub use base64::Base64Decoder;
pub use quoted_printable::QuotedPrintableDecoder;
