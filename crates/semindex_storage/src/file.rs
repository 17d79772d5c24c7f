//! File-backed metadata store.
//!
//! Layout of a metadata directory:
//!
//! ```text
//! <path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ <id>.cbor         # One CBOR-encoded property map per index
//! └─ <id>.cbor.tmp     # Transient, only during an atomic write
//! ```

use crate::error::{StorageError, StorageResult};
use crate::store::{MetadataStore, Properties};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const RECORD_EXTENSION: &str = "cbor";
const TEMP_SUFFIX: &str = ".tmp";

/// A metadata store keeping one CBOR file per index in a directory.
///
/// # Durability
///
/// Every `put` writes a temporary file, syncs it, renames it over the record
/// and syncs the directory, so a crash leaves either the old or the new record.
///
/// # Thread Safety
///
/// The store holds an exclusive advisory lock on the directory for its whole
/// lifetime, so only one process writes a metadata directory. Writers within
/// the process are serialized by an internal mutex.
///
/// # Example
///
/// ```no_run
/// use semindex_storage::{FileMetadataStore, MetadataStore, Properties};
/// use std::path::Path;
///
/// let store = FileMetadataStore::open(Path::new("index-metadata"), true).unwrap();
/// store.put("idx-1", &Properties::new()).unwrap();
/// ```
#[derive(Debug)]
pub struct FileMetadataStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    _lock_file: File,
}

impl FileMetadataStore {
    /// Opens or creates a metadata directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> StorageResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StorageError::NotFound(path.display().to_string()));
            }
        }

        if !path.is_dir() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the metadata directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_path(&self, id: &str) -> StorageResult<PathBuf> {
        validate_id(id)?;
        Ok(self.path.join(format!("{id}.{RECORD_EXTENSION}")))
    }

    fn read_record(path: &Path) -> StorageResult<Option<Properties>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let properties: Properties = ciborium::from_reader(BufReader::new(file))
            .map_err(|e| StorageError::Corrupted(format!("{}: {e}", path.display())))?;
        Ok(Some(properties))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        // NTFS journals directory metadata; no explicit fsync available
        Ok(())
    }
}

impl MetadataStore for FileMetadataStore {
    fn get(&self, id: &str) -> StorageResult<Option<Properties>> {
        let path = self.record_path(id)?;
        Self::read_record(&path)
    }

    fn put(&self, id: &str, properties: &Properties) -> StorageResult<()> {
        let path = self.record_path(id)?;
        let temp_path = self
            .path
            .join(format!("{id}.{RECORD_EXTENSION}{TEMP_SUFFIX}"));

        let mut data = Vec::new();
        ciborium::into_writer(properties, &mut data)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let _guard = self.write_lock.lock();
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        self.sync_directory()?;

        debug!(id, bytes = data.len(), "metadata record written");
        Ok(())
    }

    fn delete(&self, id: &str) -> StorageResult<Option<Properties>> {
        let path = self.record_path(id)?;
        let _guard = self.write_lock.lock();

        let previous = Self::read_record(&path)?;
        if previous.is_some() {
            fs::remove_file(&path)?;
            self.sync_directory()?;
            debug!(id, "metadata record deleted");
        }
        Ok(previous)
    }

    fn ids(&self) -> StorageResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Ids become file names, so they are restricted to a portable character set.
fn validate_id(id: &str) -> StorageResult<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn put_and_get_survive_reopen() {
        let dir = tempdir().unwrap();
        let record = props(&[("name", "articles"), ("revision", "42")]);

        {
            let store = FileMetadataStore::open(dir.path(), true).unwrap();
            store.put("idx-1", &record).unwrap();
        }

        let store = FileMetadataStore::open(dir.path(), false).unwrap();
        assert_eq!(store.get("idx-1").unwrap(), Some(record));
        assert_eq!(store.ids().unwrap(), vec!["idx-1"]);
    }

    #[test]
    fn missing_directory_without_create() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = FileMetadataStore::open(&missing, false);
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _first = FileMetadataStore::open(dir.path(), true).unwrap();
        let second = FileMetadataStore::open(dir.path(), true);
        assert!(matches!(second, Err(StorageError::Locked)));
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let store = FileMetadataStore::open(dir.path(), true).unwrap();
        store.put("a", &props(&[("k", "v")])).unwrap();

        assert_eq!(store.delete("a").unwrap(), Some(props(&[("k", "v")])));
        assert!(!dir.path().join("a.cbor").exists());
        assert_eq!(store.delete("a").unwrap(), None);
        assert!(store.ids().unwrap().is_empty());
    }

    #[test]
    fn rejects_path_like_ids() {
        let dir = tempdir().unwrap();
        let store = FileMetadataStore::open(dir.path(), true).unwrap();
        for bad in ["", "../escape", ".hidden", "a/b"] {
            assert!(matches!(
                store.put(bad, &Properties::new()),
                Err(StorageError::InvalidId(_))
            ));
        }
    }

    #[test]
    fn corrupted_record_is_reported() {
        let dir = tempdir().unwrap();
        let store = FileMetadataStore::open(dir.path(), true).unwrap();
        fs::write(dir.path().join("broken.cbor"), b"\xff\xff\xff").unwrap();
        assert!(matches!(
            store.get("broken"),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn ids_ignore_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileMetadataStore::open(dir.path(), true).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        store.put("b", &Properties::new()).unwrap();
        store.put("a", &Properties::new()).unwrap();
        assert_eq!(store.ids().unwrap(), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn arbitrary_properties_persist(
            record in prop::collection::btree_map(".{0,12}", ".{0,40}", 0..8)
        ) {
            let dir = tempdir().unwrap();
            let store = FileMetadataStore::open(dir.path(), true).unwrap();
            store.put("p", &record).unwrap();
            prop_assert_eq!(store.get("p").unwrap(), Some(record));
        }
    }
}
