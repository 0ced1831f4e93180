//! Backend that persists nothing

use super::{LinkBackend, ReloadSignal, StorageError, StorageKind};
use crate::links::{parse_table, LinkTable};

/// In-memory only backend. Reads are always empty and writes are dropped.
#[derive(Debug, Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl LinkBackend for NullBackend {
    fn read(&self) -> Result<LinkTable, StorageError> {
        Ok(LinkTable::new())
    }

    fn put(&self, _path: &str, _target: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn update(&self, _path: &str, _target: &str) -> Result<bool, StorageError> {
        Ok(false)
    }

    fn delete(&self, _path: &str) -> Result<bool, StorageError> {
        Ok(false)
    }

    fn replace(&self, contents: &str) -> Result<LinkTable, StorageError> {
        Ok(parse_table(contents)?)
    }

    fn reload_signal(&self) -> Option<ReloadSignal> {
        None
    }

    fn kind(&self) -> StorageKind {
        StorageKind::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_is_inert() {
        let backend = NullBackend::new();
        backend.put("a", "https://a.example").unwrap();
        assert!(!backend.update("a", "https://b.example").unwrap());
        assert!(!backend.delete("a").unwrap());
        assert!(backend.read().unwrap().is_empty());
        assert!(backend.reload_signal().is_none());
    }

    #[test]
    fn test_null_backend_replace_validates() {
        let backend = NullBackend::new();
        let table = backend.replace("a https://a.example\n").unwrap();
        assert_eq!(table["a"], "https://a.example");
        assert!(matches!(
            backend.replace("a\n"),
            Err(StorageError::MalformedEntry(_))
        ));
    }
}
