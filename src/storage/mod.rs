//! Persistence backends for the link registry
//!
//! [`NullBackend`] keeps nothing and never signals a reload. [`FileBackend`]
//! persists to a single plaintext links file, rewrites it atomically, and
//! watches it for edits made outside the process.

pub mod discovery;
pub mod file;
pub mod null;
pub mod watcher;

pub use discovery::{default_candidates, find_links_file};
pub use file::FileBackend;
pub use null::NullBackend;
pub use watcher::{LinksWatcher, ReloadSignal};

use crate::links::{EntryError, LinkTable};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Trait for link persistence backends
///
/// All operations are blocking; callers on an async runtime should run them
/// on the blocking pool.
pub trait LinkBackend: Send + Sync {
    /// Read the full mapping. Later duplicates of a path win.
    fn read(&self) -> Result<LinkTable, StorageError>;

    /// Record a new entry without deduplicating earlier ones
    fn put(&self, path: &str, target: &str) -> Result<(), StorageError>;

    /// Point an existing path at a new target.
    ///
    /// Returns `false` when the path was not present, in which case nothing
    /// is written.
    fn update(&self, path: &str, target: &str) -> Result<bool, StorageError>;

    /// Remove every entry for a path. Returns `true` if anything was removed.
    fn delete(&self, path: &str) -> Result<bool, StorageError>;

    /// Replace the whole mapping with the given links document.
    ///
    /// The document is parsed in full before anything is written.
    fn replace(&self, contents: &str) -> Result<LinkTable, StorageError>;

    /// Take the reload signal, if this backend produces one.
    ///
    /// The receiver can only be taken once; later calls return `None`.
    fn reload_signal(&self) -> Option<ReloadSignal>;

    /// Which kind of backend this is
    fn kind(&self) -> StorageKind;
}

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// In-memory only
    None,
    /// Single local links file
    #[default]
    File,
}

impl FromStr for StorageKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(StorageKind::None),
            "file" => Ok(StorageKind::File),
            _ => Err(StorageError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::None => write!(f, "none"),
            StorageKind::File => write!(f, "file"),
        }
    }
}

/// Build a backend of the requested kind.
///
/// `requested` is the preferred links file and is ignored for
/// [`StorageKind::None`].
pub fn open_backend(
    kind: StorageKind,
    requested: Option<&Path>,
) -> Result<Arc<dyn LinkBackend>, StorageError> {
    match kind {
        StorageKind::None => Ok(Arc::new(NullBackend::new())),
        StorageKind::File => Ok(Arc::new(FileBackend::open(requested)?)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("No links file found (tried: {})", describe_tried(.tried))]
    ConfigNotFound {
        tried: Vec<(PathBuf, std::io::Error)>,
    },

    #[error(transparent)]
    MalformedEntry(#[from] EntryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Unknown storage kind '{0}' (expected 'file' or 'none')")]
    UnknownKind(String),
}

fn describe_tried(tried: &[(PathBuf, std::io::Error)]) -> String {
    if tried.is_empty() {
        return "no candidates".to_string();
    }

    tried
        .iter()
        .map(|(path, err)| format!("{}: {}", path.display(), err))
        .collect::<Vec<_>>()
        .join("; ")
}
