//! `application/octet-stream` pass-through parsing.

use crate::error::ConfigError;

/// Callbacks an [`OctetStreamParser`] drives. Every method defaults to a
/// no-op, so callers override only what they need.
pub trait OctetStreamCallbacks {
    /// Called once, on the first byte written.
    fn on_start(&mut self) {}

    /// Called for each accepted slice of body data.
    fn on_data(&mut self, _data: &[u8]) {}

    /// Called once, from `finalize`.
    fn on_end(&mut self) {}
}

/// A pass-through parser for `application/octet-stream` bodies: the whole
/// body is the field's data, with a size cap.
pub struct OctetStreamParser<C> {
    callbacks: C,
    max_size: u64,
    received: u64,
    started: bool,
}

impl<C: OctetStreamCallbacks> OctetStreamParser<C> {
    /// Construct a parser with an optional `max_size` cap (`None` for
    /// unbounded). `Some(0)` is rejected as a configuration error.
    pub fn new(callbacks: C, max_size: Option<u64>) -> Result<Self, ConfigError> {
        let max_size = match max_size {
            Some(0) => return Err(ConfigError::InvalidMaxSize),
            Some(n) => n,
            None => u64::MAX,
        };

        Ok(OctetStreamParser { callbacks, max_size, received: 0, started: false })
    }

    /// Bytes accepted so far.
    pub fn bytes_received(&self) -> u64 {
        self.received
    }

    /// Feed a chunk of body bytes. Returns the number of input bytes
    /// processed (always `data.len()`; bytes beyond `max_size` are
    /// discarded, not rejected).
    pub fn write(&mut self, data: &[u8]) -> usize {
        if !self.started {
            self.started = true;
            self.callbacks.on_start();
        }

        let remaining = self.max_size.saturating_sub(self.received);
        let accepted = (data.len() as u64).min(remaining) as usize;

        if accepted > 0 {
            self.callbacks.on_data(&data[..accepted]);
            self.received += accepted as u64;
        }

        data.len()
    }

    /// Signal end of input.
    pub fn finalize(&mut self) {
        if !self.started {
            self.started = true;
            self.callbacks.on_start();
        }
        self.callbacks.on_end();
    }

    /// Consume the parser, returning the callbacks.
    pub fn into_callbacks(self) -> C {
        self.callbacks
    }

    /// Borrow the callbacks mutably, for facades layered on top.
    pub(crate) fn callbacks_mut_ref(&mut self) -> &mut C {
        &mut self.callbacks
    }
}
