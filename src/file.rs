//! `File`: in-memory-then-spill-to-disk storage for an uploaded part.

use crate::config::Config;
use crate::error::FileError;
use crate::sink::Sink;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

enum Storage {
    Memory(Vec<u8>),
    Disk(fs::File),
}

/// A file uploaded as part of a `multipart/form-data` body.
///
/// Starts backed by an in-memory buffer; once the accumulated size would
/// exceed `config.max_memory_file_size`, the buffer is spilled to a file on
/// disk and all subsequent writes go straight to it. The transition happens
/// at most once.
pub struct File {
    /// The field name this file was submitted under.
    pub field_name: String,
    /// The filename the client claims, verbatim.
    pub file_name: Option<String>,
    /// The filename actually used on disk, once spilled.
    pub actual_file_name: Option<String>,
    storage: Storage,
    size: u64,
    config: Config,
}

fn random_suffix() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(16).map(char::from).collect()
}

/// Split `name` into `(stem, extension)`, where `extension` includes the
/// leading dot. No extension yields `None`.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx..])),
        _ => (name, None),
    }
}

fn choose_file_name(requested: Option<&str>, config: &Config) -> String {
    let ext = requested.and_then(|n| split_extension(n).1);

    if config.upload_keep_filename {
        if let Some(name) = requested {
            let (stem, existing_ext) = split_extension(name);
            let mut out = stem.to_string();
            if config.upload_keep_extensions {
                if let Some(ext) = existing_ext {
                    out.push_str(ext);
                }
            }
            return out;
        }
    }

    let mut out = random_suffix();
    if config.upload_keep_extensions {
        if let Some(ext) = ext {
            out.push_str(ext);
        }
    }
    out
}

impl File {
    /// Start a new in-memory file for `field_name`, with the client-supplied
    /// `file_name` (used only for naming on spill).
    pub fn new(field_name: String, file_name: Option<String>, config: Config) -> Self {
        File {
            field_name,
            file_name,
            actual_file_name: None,
            storage: Storage::Memory(Vec::new()),
            size: 0,
            config,
        }
    }

    /// Total bytes accepted so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// `true` while the backing store is still the in-memory buffer.
    pub fn in_memory(&self) -> bool {
        matches!(self.storage, Storage::Memory(_))
    }

    /// If still in memory, returns the buffered bytes.
    pub fn memory_contents(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Memory(buf) => Some(buf),
            Storage::Disk(_) => None,
        }
    }

    /// Force the spill-to-disk transition now, even if under the memory
    /// cap. A no-op if already spilled.
    pub fn flush_to_disk(&mut self) -> Result<(), FileError> {
        if let Storage::Memory(buf) = &self.storage {
            let mut file = self.create_backing_file()?;
            file.write_all(buf).map_err(FileError::Write)?;
            self.storage = Storage::Disk(file);
        }
        Ok(())
    }

    fn create_backing_file(&mut self) -> Result<fs::File, FileError> {
        let name = choose_file_name(self.file_name.as_deref(), &self.config);
        let path = self.destination_path(&name)?;

        let file = fs::File::create(&path)
            .map_err(|e| FileError::Create(path.display().to_string(), e))?;

        self.actual_file_name = Some(name);
        Ok(file)
    }

    fn destination_path(&self, name: &str) -> Result<PathBuf, FileError> {
        let dir: PathBuf = match &self.config.upload_dir {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                if !dir.is_dir() {
                    return Err(FileError::Create(
                        dir.display().to_string(),
                        io::Error::new(io::ErrorKind::NotFound, "UPLOAD_DIR is not a directory"),
                    ));
                }
                dir
            }
            None => std::env::temp_dir(),
        };
        Ok(dir.join(name))
    }

    /// Write `data`, spilling to disk first if this write would exceed
    /// `config.max_memory_file_size`.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FileError> {
        let would_be = self.size + data.len() as u64;

        if self.in_memory() && would_be > self.config.max_memory_file_size {
            self.flush_to_disk()?;
        }

        let written = match &mut self.storage {
            Storage::Memory(buf) => {
                buf.extend_from_slice(data);
                data.len()
            }
            Storage::Disk(file) => file.write(data).map_err(FileError::Write)?,
        };

        self.size += written as u64;
        Ok(written)
    }

    /// No-op; present for symmetry with the `Sink` contract. Files have no
    /// held-back bytes to flush.
    pub fn finalize(&mut self) -> Result<(), FileError> {
        Ok(())
    }

    /// Release the backing file handle (a no-op for in-memory files).
    pub fn close(&mut self) {
        if let Storage::Disk(file) = &mut self.storage {
            let _ = file.flush();
        }
    }

    /// Path on disk, once spilled.
    pub fn path(&self) -> Option<PathBuf> {
        match (&self.storage, &self.actual_file_name) {
            (Storage::Disk(_), Some(name)) => self.destination_path(name).ok(),
            _ => None,
        }
    }
}

impl Sink for File {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        File::write(self, data).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn finalize(&mut self) -> io::Result<()> {
        File::finalize(self).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn close(&mut self) {
        File::close(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_memory_cap(cap: u64) -> Config {
        Config { max_memory_file_size: cap, ..Config::default() }
    }

    #[test]
    fn stays_in_memory_under_cap() {
        let mut file = File::new("f".into(), None, Config::default());
        file.write(b"hello").unwrap();
        assert!(file.in_memory());
        assert_eq!(file.size(), 5);
    }

    #[test]
    fn spills_once_cap_exceeded() {
        let mut file = File::new("f".into(), Some("doc.txt".into()), config_with_memory_cap(10));
        file.write(&[b'a'; 10]).unwrap();
        assert!(file.in_memory());
        file.write(&[b'b'; 10]).unwrap();
        assert!(!file.in_memory());
        assert_eq!(file.size(), 20);
    }

    #[test]
    fn keeps_extension_when_configured_without_upload_dir() {
        let config = Config {
            max_memory_file_size: 0,
            upload_keep_extensions: true,
            ..Config::default()
        };
        let mut file = File::new("f".into(), Some("photo.jpg".into()), config);
        file.write(b"data").unwrap();
        assert!(!file.in_memory());
        assert!(file.actual_file_name.as_ref().unwrap().ends_with(".jpg"));
    }

    #[test]
    fn keeps_original_filename_when_configured() {
        let config = Config {
            max_memory_file_size: 0,
            upload_keep_filename: true,
            upload_keep_extensions: true,
            ..Config::default()
        };
        let mut file = File::new("f".into(), Some("report.csv".into()), config);
        file.write(b"data").unwrap();
        assert_eq!(file.actual_file_name.as_deref(), Some("report.csv"));
    }

    #[test]
    fn bad_upload_dir_is_a_file_error() {
        let config = Config {
            max_memory_file_size: 0,
            upload_dir: Some("/nonexistent/path/for/sure".into()),
            ..Config::default()
        };
        let mut file = File::new("f".into(), None, config);
        assert!(file.write(b"data").is_err());
    }
}
