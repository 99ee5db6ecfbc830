//! `application/x-www-form-urlencoded` (`k=v&k=v`, also accepting `;` as a
//! separator per RFC 3986 §3.4) parsing.

use crate::error::{ConfigError, QuerystringParseError};

/// Callbacks a [`QuerystringParser`] drives. Every method defaults to a
/// no-op.
pub trait QuerystringCallbacks {
    /// Emitted once, before the first name or data byte of a new field.
    fn on_field_start(&mut self) {}

    /// A run of consecutive field-name bytes.
    fn on_field_name(&mut self, _data: &[u8]) {}

    /// A run of consecutive field-value bytes.
    fn on_field_data(&mut self, _data: &[u8]) {}

    /// The field (with or without a value) is complete.
    fn on_field_end(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeField,
    FieldData,
}

fn is_separator(b: u8) -> bool {
    b == b'&' || b == b';'
}

/// Streaming parser for `k=v&k=v`-style bodies.
pub struct QuerystringParser<C> {
    callbacks: C,
    state: State,
    strict: bool,
    max_size: u64,
    received: u64,
    cursor: u64,
    /// Number of name bytes seen for the field currently being accumulated.
    name_len: usize,
    /// Absolute offset of the first byte of the current field's name.
    field_start: u64,
    started: bool,
}

impl<C: QuerystringCallbacks> QuerystringParser<C> {
    /// Construct a parser. `max_size` of `Some(0)` is a configuration error;
    /// `None` means unbounded. `strict` rejects consecutive separators and
    /// valueless keys instead of tolerating them.
    pub fn new(callbacks: C, max_size: Option<u64>, strict: bool) -> Result<Self, ConfigError> {
        let max_size = match max_size {
            Some(0) => return Err(ConfigError::InvalidMaxSize),
            Some(n) => n,
            None => u64::MAX,
        };

        Ok(QuerystringParser {
            callbacks,
            state: State::BeforeField,
            strict,
            max_size,
            received: 0,
            cursor: 0,
            name_len: 0,
            field_start: 0,
            started: false,
        })
    }

    fn ensure_started(&mut self) {
        if !self.started {
            self.started = true;
            self.callbacks.on_field_start();
        }
    }

    fn reset_field(&mut self) {
        self.state = State::BeforeField;
        self.name_len = 0;
        self.started = false;
    }

    /// Feed a chunk of body bytes. Returns the number of bytes accepted,
    /// which is `data.len()` unless `max_size` was reached mid-chunk, in
    /// which case it is the length of the accepted prefix.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, QuerystringParseError> {
        let len = data.len();
        let mut i = 0;

        while i < len {
            if self.received >= self.max_size {
                break;
            }

            let budget = (self.max_size - self.received) as usize;
            let b = data[i];
            let pos = self.cursor + i as u64;

            match self.state {
                State::BeforeField => {
                    if b == b'=' {
                        self.ensure_started();
                        self.state = State::FieldData;
                        self.received += 1;
                        i += 1;
                    } else if is_separator(b) {
                        if self.name_len > 0 {
                            if self.strict {
                                return Err(QuerystringParseError::MissingValue(
                                    self.field_start as usize,
                                ));
                            }
                            self.callbacks.on_field_end();
                            self.reset_field();
                        } else if self.strict {
                            return Err(QuerystringParseError::EmptyKey(pos as usize));
                        }
                        self.received += 1;
                        i += 1;
                    } else {
                        let run_start = i;
                        let mut run_end = i;
                        while run_end < len
                            && run_end - run_start < budget
                            && data[run_end] != b'='
                            && !is_separator(data[run_end])
                        {
                            run_end += 1;
                        }

                        if self.name_len == 0 {
                            self.field_start = self.cursor + run_start as u64;
                            self.ensure_started();
                        }
                        self.name_len += run_end - run_start;
                        self.callbacks.on_field_name(&data[run_start..run_end]);
                        self.received += (run_end - run_start) as u64;
                        i = run_end;
                    }
                }
                State::FieldData => {
                    if is_separator(b) {
                        self.callbacks.on_field_end();
                        self.reset_field();
                        self.received += 1;
                        i += 1;
                    } else {
                        let run_start = i;
                        let mut run_end = i;
                        while run_end < len && run_end - run_start < budget && !is_separator(data[run_end]) {
                            run_end += 1;
                        }
                        self.callbacks.on_field_data(&data[run_start..run_end]);
                        self.received += (run_end - run_start) as u64;
                        i = run_end;
                    }
                }
            }
        }

        self.cursor += i as u64;
        Ok(i)
    }

    /// Signal end of input: any in-progress field (including a trailing
    /// valueless key) is finished.
    pub fn finalize(&mut self) -> Result<(), QuerystringParseError> {
        if self.started {
            self.callbacks.on_field_end();
            self.reset_field();
        }
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
}
