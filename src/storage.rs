//! Raw file storage for uploaded documents.
//!
//! Uploads are written under one directory, keyed by document id with the
//! original extension preserved so the extractor can dispatch on it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create upload dir: {}", root.display()))?;
        Ok(Self { root })
    }

    /// Persist an uploaded file; returns the storage location handle.
    pub fn save(&self, document_id: &str, original_filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let ext = file_extension(original_filename);
        let name = if ext.is_empty() {
            document_id.to_string()
        } else {
            format!("{}.{}", document_id, ext)
        };
        let path = self.root.join(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;
        Ok(path)
    }

    pub fn read(&self, location: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(location)
    }

    /// Remove a stored file. Missing files are not an error.
    pub fn delete(&self, location: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(location) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Lowercased extension of a filename, without the dot.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_read_delete_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("uploads")).unwrap();

        let path = store.save("d1", "Essay Guide.PDF", b"%PDF-").unwrap();
        assert!(path.to_string_lossy().ends_with("d1.pdf"));
        assert_eq!(store.read(&path).unwrap(), b"%PDF-");

        store.delete(&path).unwrap();
        // Deleting again is a no-op.
        store.delete(&path).unwrap();
        assert!(store.read(&path).is_err());
    }

    #[test]
    fn extension_handling() {
        assert_eq!(file_extension("notes.txt"), "txt");
        assert_eq!(file_extension("lecture.SRT"), "srt");
        assert_eq!(file_extension("README"), "");
    }
}
