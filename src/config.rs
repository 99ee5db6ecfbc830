//! Typed configuration, replacing a stringly-keyed map with a `Default`-able
//! struct — one field per configuration key.

/// Configuration shared by `FormParser` and the parsers it dispatches to.
///
/// Construct with `Config::default()` and override only the fields you need:
///
/// ```
/// use formstream::Config;
///
/// let config = Config {
///     max_size: 10 * 1024 * 1024,
///     ..Config::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound, in bytes, on the total size of a single field/file's
    /// data. `u64::MAX` (the default) means unbounded; `0` is rejected by
    /// every parser constructor as a configuration error.
    pub max_size: u64,

    /// Size, in bytes, above which a part's data is spilled from memory to a
    /// temporary file on disk.
    pub max_memory_file_size: u64,

    /// Directory uploaded files are written into. `None` uses the system
    /// temporary directory.
    pub upload_dir: Option<String>,

    /// Keep the original filename from `Content-Disposition` when naming the
    /// spilled file on disk, instead of a random unique name.
    pub upload_keep_filename: bool,

    /// When `upload_keep_filename` is false, still keep the original file
    /// extension on the randomly generated name.
    pub upload_keep_extensions: bool,

    /// Reject a part whose `Content-Transfer-Encoding` is neither `binary`,
    /// `7bit`, `8bit`, `base64`, nor `quoted-printable`, instead of passing
    /// its data through unmodified.
    pub upload_error_on_bad_cte: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_size: u64::MAX,
            max_memory_file_size: 1024 * 1024,
            upload_dir: None,
            upload_keep_filename: false,
            upload_keep_extensions: false,
            upload_error_on_bad_cte: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.max_memory_file_size, 1024 * 1024);
        assert!(!config.upload_keep_filename);
        assert!(!config.upload_keep_extensions);
        assert!(!config.upload_error_on_bad_cte);
        assert!(config.upload_dir.is_none());
    }
}
