use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use clone_jobs::CloneError;
use clone_wire::{Descriptor, Offset};
use tracing::trace;

/// Writes incoming descriptor-tagged chunks to files under a destination
/// data directory.
///
/// Requires chunks for one file to arrive in order relative to each other
/// (though chunks for different files may still be serialized through the
/// same stream): a chunk with an empty name is a continuation of whichever
/// file the most recently seen non-empty name opened.
pub struct FileApplier {
    base_dir: PathBuf,
    current_name: Option<String>,
    open_files: HashMap<String, File>,
}

impl FileApplier {
    #[must_use]
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir, current_name: None, open_files: HashMap::new() }
    }

    /// Applies one descriptor+payload pair, opening, appending to, or
    /// truncating the named file as the descriptor's offset requires.
    ///
    /// # Errors
    /// Returns [`CloneError::InvalidInput`] if a continuation chunk
    /// arrives with no prior file open, or [`CloneError::Io`] for any
    /// filesystem failure.
    pub fn apply(&mut self, descriptor: &Descriptor, payload: &[u8]) -> Result<(), CloneError> {
        let name = if descriptor.name.is_empty() {
            self.current_name
                .clone()
                .ok_or_else(|| CloneError::invalid_input("continuation chunk with no open file"))?
        } else {
            descriptor.name.clone()
        };

        match descriptor.offset {
            Offset::NoData => {
                let path = self.full_path(&name);
                self.ensure_parent_dir(&path)?;
                OpenOptions::new()
                    .create(true)
                    .truncate(true)
                    .write(true)
                    .open(&path)
                    .map_err(|e| CloneError::io(format!("creating {name}"), e))?;
                trace!(file = %name, "applied empty file");
            }
            Offset::Append => {
                let file = self.open_for_append(&name)?;
                file.write_all(payload)
                    .map_err(|e| CloneError::io(format!("appending to {name}"), e))?;
            }
            Offset::AtByte(pos) => {
                let file = self.open_for_append(&name)?;
                file.seek(SeekFrom::Start(pos))
                    .map_err(|e| CloneError::io(format!("seeking in {name}"), e))?;
                if pos == 0 {
                    file.set_len(0).map_err(|e| CloneError::io(format!("truncating {name}"), e))?;
                }
                file.write_all(payload)
                    .map_err(|e| CloneError::io(format!("writing {name} at {pos}"), e))?;
            }
        }

        self.current_name = Some(name);
        Ok(())
    }

    fn open_for_append(&mut self, name: &str) -> Result<&mut File, CloneError> {
        if !self.open_files.contains_key(name) {
            let path = self.full_path(name);
            self.ensure_parent_dir(&path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| CloneError::io(format!("opening {name}"), e))?;
            self.open_files.insert(name.to_string(), file);
        }
        Ok(self.open_files.get_mut(name).expect("just inserted"))
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn ensure_parent_dir(&self, path: &Path) -> Result<(), CloneError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CloneError::io(format!("creating {}", parent.display()), e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clone_wire::HeaderKind;

    fn descriptor(offset: Offset, name: &str) -> Descriptor {
        Descriptor { kind: HeaderKind::Common, offset, flags: 0, name: name.to_string() }
    }

    #[test]
    fn first_chunk_opens_continuation_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut applier = FileApplier::new(dir.path().to_path_buf());

        applier.apply(&descriptor(Offset::Append, "db/t1.ibd"), b"hello").unwrap();
        applier.apply(&descriptor(Offset::Append, ""), b" world").unwrap();

        let contents = std::fs::read(dir.path().join("db/t1.ibd")).unwrap();
        assert_eq!(contents, b"hello world");
    }

    #[test]
    fn no_data_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut applier = FileApplier::new(dir.path().to_path_buf());

        applier.apply(&descriptor(Offset::NoData, "db/empty.ibd"), &[]).unwrap();

        let contents = std::fs::read(dir.path().join("db/empty.ibd")).unwrap();
        assert!(contents.is_empty());
    }

    #[test]
    fn at_byte_zero_truncates_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aria_log.00000001");
        std::fs::write(&path, b"stale-header-bytes").unwrap();
        let mut applier = FileApplier::new(dir.path().to_path_buf());

        applier
            .apply(&descriptor(Offset::AtByte(0), "aria_log.00000001"), b"NEWHDR")
            .unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, b"NEWHDR");
    }

    #[test]
    fn continuation_without_open_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut applier = FileApplier::new(dir.path().to_path_buf());
        let err = applier.apply(&descriptor(Offset::Append, ""), b"x").unwrap_err();
        assert!(matches!(err, CloneError::InvalidInput(_)));
    }
}
