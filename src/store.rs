//! Persistence of the last extracted document text.
//!
//! Extracting text is cheap next to the LLM call, but re-running a request
//! against the same document (different provider, a retry after a rate
//! limit) should not need the PDF again. A [`TextStore`] keeps exactly one
//! record: the most recent [`StoredText`].
//!
//! Loading never fails on bad data. A record that does not parse, or parses
//! but is invalid, is removed and treated as absent.

use crate::error::TakeoffError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// File name used by [`FileTextStore::default_path`].
pub const STORE_FILE_NAME: &str = "last-text.json";

/// One persisted document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredText {
    pub text: String,
    pub file_name: String,
    pub extracted_at: DateTime<Utc>,
    pub file_size: u64,
}

impl StoredText {
    /// A record stamped with the current time.
    pub fn new(text: impl Into<String>, file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            text: text.into(),
            file_name: file_name.into(),
            extracted_at: Utc::now(),
            file_size,
        }
    }

    /// Text and file name must both be non-empty.
    pub fn is_valid(&self) -> bool {
        !self.text.is_empty() && !self.file_name.is_empty()
    }
}

/// Save, load and clear the last extracted text.
pub trait TextStore: Send + Sync {
    /// Store `text`, replacing any previous record.
    ///
    /// Returns `Ok(None)` without touching the store when the record would
    /// be invalid.
    fn save(
        &self,
        text: &str,
        file_name: &str,
        file_size: u64,
    ) -> Result<Option<StoredText>, TakeoffError>;

    /// The stored record, if one exists and is valid.
    fn load(&self) -> Result<Option<StoredText>, TakeoffError>;

    /// Remove the stored record. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), TakeoffError>;
}

// ── File-backed store ────────────────────────────────────────────────────────

/// A store backed by one JSON file.
#[derive(Debug, Clone)]
pub struct FileTextStore {
    path: PathBuf,
}

impl FileTextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store at [`Self::default_path`].
    pub fn open_default() -> Result<Self, TakeoffError> {
        Self::default_path().map(Self::new).ok_or_else(|| {
            TakeoffError::InvalidConfig(
                "No user data directory found; pass an explicit store path".to_string(),
            )
        })
    }

    /// `<user data dir>/pdf-takeoff/last-text.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("pdf-takeoff").join(STORE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failed(&self, detail: impl ToString) -> TakeoffError {
        TakeoffError::StoreFailed {
            path: self.path.clone(),
            detail: detail.to_string(),
        }
    }

    /// Write to a temp file in the same directory, then rename over the target.
    fn write_atomic(&self, bytes: &[u8]) -> Result<(), TakeoffError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.failed(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.failed(e))?;
        tmp.write_all(bytes).map_err(|e| self.failed(e))?;
        tmp.persist(&self.path).map_err(|e| self.failed(e.error))?;
        Ok(())
    }

    fn remove_corrupt(&self, reason: &str) {
        warn!("Discarding stored text at {}: {}", self.path.display(), reason);
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}

impl TextStore for FileTextStore {
    fn save(
        &self,
        text: &str,
        file_name: &str,
        file_size: u64,
    ) -> Result<Option<StoredText>, TakeoffError> {
        let record = StoredText::new(text, file_name, file_size);
        if !record.is_valid() {
            debug!("Not storing empty text or file name");
            return Ok(None);
        }
        let json = serde_json::to_vec_pretty(&record).map_err(|e| self.failed(e))?;
        self.write_atomic(&json)?;
        debug!(
            "Stored {} chars from {} at {}",
            record.text.chars().count(),
            record.file_name,
            self.path.display()
        );
        Ok(Some(record))
    }

    fn load(&self) -> Result<Option<StoredText>, TakeoffError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.failed(e)),
        };
        match serde_json::from_slice::<StoredText>(&bytes) {
            Ok(record) if record.is_valid() => Ok(Some(record)),
            Ok(_) => {
                self.remove_corrupt("record is missing text or file name");
                Ok(None)
            }
            Err(e) => {
                self.remove_corrupt(&e.to_string());
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<(), TakeoffError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.failed(e)),
        }
    }
}

// ── In-memory store ──────────────────────────────────────────────────────────

/// A store that lives only as long as the value.
#[derive(Debug, Default)]
pub struct MemoryTextStore {
    slot: Mutex<Option<StoredText>>,
}

impl MemoryTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<StoredText>>, TakeoffError> {
        self.slot
            .lock()
            .map_err(|_| TakeoffError::Internal("text store lock poisoned".to_string()))
    }
}

impl TextStore for MemoryTextStore {
    fn save(
        &self,
        text: &str,
        file_name: &str,
        file_size: u64,
    ) -> Result<Option<StoredText>, TakeoffError> {
        let record = StoredText::new(text, file_name, file_size);
        if !record.is_valid() {
            return Ok(None);
        }
        *self.lock()? = Some(record.clone());
        Ok(Some(record))
    }

    fn load(&self) -> Result<Option<StoredText>, TakeoffError> {
        let mut slot = self.lock()?;
        if slot.as_ref().is_some_and(|r| !r.is_valid()) {
            *slot = None;
        }
        Ok(slot.clone())
    }

    fn clear(&self) -> Result<(), TakeoffError> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_store(dir: &TempDir) -> FileTextStore {
        FileTextStore::new(dir.path().join("nested").join(STORE_FILE_NAME))
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);

        let saved = store.save("EF-1 2 EA", "mech.pdf", 4096).unwrap().unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(saved, loaded);
        assert_eq!(loaded.file_size, 4096);
    }

    #[test]
    fn save_replaces_previous_record() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.save("first", "a.pdf", 1).unwrap();
        store.save("second", "b.pdf", 2).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.text, "second");
        assert_eq!(loaded.file_name, "b.pdf");
    }

    #[test]
    fn invalid_save_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        assert!(store.save("", "a.pdf", 1).unwrap().is_none());
        assert!(store.save("text", "", 1).unwrap().is_none());
        assert!(!store.path().exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_removed_on_load() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"{not json").unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn invalid_record_is_removed_on_load() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            br#"{"text":"","fileName":"a.pdf","extractedAt":"2024-05-01T12:00:00Z","fileSize":3}"#,
        )
        .unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.clear().unwrap();
        store.save("x", "a.pdf", 1).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.save("x", "a.pdf", 1).unwrap();
        let entries: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn memory_store_behaves_like_file_store() {
        let store = MemoryTextStore::new();
        assert!(store.load().unwrap().is_none());
        assert!(store.save("", "a.pdf", 1).unwrap().is_none());
        store.save("text", "a.pdf", 1).unwrap();
        assert_eq!(store.load().unwrap().unwrap().text, "text");
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn default_path_ends_with_store_file() {
        if let Some(p) = FileTextStore::default_path() {
            assert!(p.ends_with(Path::new("pdf-takeoff").join(STORE_FILE_NAME)));
        }
    }

    #[test]
    fn stored_text_serialises_camel_case() {
        let r = StoredText::new("t", "f.pdf", 9);
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("fileName").is_some());
        assert!(v.get("extractedAt").is_some());
        assert!(v.get("fileSize").is_some());
    }
}
