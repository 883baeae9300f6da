use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::store::VersionedStore;

const MAX_WRITE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct CursorDoc {
    cursors: HashMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// Per-folder change-feed cursors, one durable document for all folders.
///
/// The cursor is opaque to us; it only ever moves forward via [`set`], and
/// callers commit it strictly after the diff batch it closes out has been
/// dispatched.
///
/// [`set`]: CursorStore::set
pub struct CursorStore {
    store: VersionedStore<CursorDoc>,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: VersionedStore::new(path),
        }
    }

    pub fn get(&self, folder: &str) -> Result<Option<String>, Error> {
        let (doc, _) = self.store.load()?;
        Ok(doc.cursors.get(folder).cloned())
    }

    pub fn set(&self, folder: &str, cursor: &str) -> Result<(), Error> {
        let folder = folder.to_string();
        let cursor = cursor.to_string();
        self.store.update(MAX_WRITE_ATTEMPTS, |doc| {
            doc.cursors.insert(folder.clone(), cursor.clone());
            doc.updated_at = Some(Utc::now());
        })?;
        tracing::debug!(folder = %folder, "cursor_committed");
        Ok(())
    }

    pub fn clear(&self, folder: &str) -> Result<bool, Error> {
        let folder = folder.to_string();
        let removed = self.store.update(MAX_WRITE_ATTEMPTS, |doc| {
            let removed = doc.cursors.remove(&folder).is_some();
            doc.updated_at = Some(Utc::now());
            removed
        })?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn get_of_unknown_folder_is_none() {
        let temp = tempdir().unwrap();
        let cursors = CursorStore::new(temp.path().join("cursors.json"));
        assert!(cursors.get("/transcripts/raw").unwrap().is_none());
    }

    #[test]
    fn set_then_get() {
        let temp = tempdir().unwrap();
        let cursors = CursorStore::new(temp.path().join("cursors.json"));

        cursors.set("/transcripts/raw", "cursor-abc").unwrap();
        assert_eq!(
            cursors.get("/transcripts/raw").unwrap().as_deref(),
            Some("cursor-abc")
        );

        cursors.set("/transcripts/raw", "cursor-def").unwrap();
        assert_eq!(
            cursors.get("/transcripts/raw").unwrap().as_deref(),
            Some("cursor-def")
        );
    }

    #[test]
    fn folders_are_independent() {
        let temp = tempdir().unwrap();
        let cursors = CursorStore::new(temp.path().join("cursors.json"));

        cursors.set("/a", "ca").unwrap();
        cursors.set("/b", "cb").unwrap();

        assert_eq!(cursors.get("/a").unwrap().as_deref(), Some("ca"));
        assert_eq!(cursors.get("/b").unwrap().as_deref(), Some("cb"));
    }

    #[test]
    fn clear_removes_cursor() {
        let temp = tempdir().unwrap();
        let cursors = CursorStore::new(temp.path().join("cursors.json"));

        cursors.set("/a", "ca").unwrap();
        assert!(cursors.clear("/a").unwrap());
        assert!(!cursors.clear("/a").unwrap());
        assert!(cursors.get("/a").unwrap().is_none());
    }
}
