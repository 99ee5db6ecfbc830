//! `Field`: a named, non-file form value.

/// A named form value (as opposed to a [`crate::file::File`] upload).
///
/// Built up by appending bytes via [`Field::write`] and finalized exactly
/// once. A field with no data bytes at all before it ends (e.g. `blank` in
/// `foo=bar&blank&another=asdf`) has a `None` value, matching the
/// valueless-key case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The field's name, as submitted.
    pub field_name: Vec<u8>,
    value: Option<Vec<u8>>,
    finalized: bool,
}

impl Field {
    /// Start a new, empty field.
    pub fn new(field_name: Vec<u8>) -> Self {
        Field { field_name, value: None, finalized: false }
    }

    /// Append bytes to this field's value.
    ///
    /// Panics if called after `finalize`.
    pub fn write(&mut self, data: &[u8]) {
        assert!(!self.finalized, "wrote to a field after it was finalized");
        self.value.get_or_insert_with(Vec::new).extend_from_slice(data);
    }

    /// Mark the field complete. Idempotent.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// `true` once `finalize` has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The field's value, or `None` for a valueless key.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_written_bytes() {
        let mut field = Field::new(b"name".to_vec());
        field.write(b"hello");
        field.write(b" world");
        field.finalize();
        assert_eq!(field.value(), Some(&b"hello world"[..]));
        assert!(field.is_finalized());
    }

    #[test]
    fn never_written_is_a_null_value() {
        let mut field = Field::new(b"blank".to_vec());
        field.finalize();
        assert_eq!(field.value(), None);
    }
}
