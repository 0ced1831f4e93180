//! Links file discovery
//!
//! Candidates are tried in order and the first one that opens for reading is
//! adopted. Nothing is ever created here: a missing links file is an error.

use super::file::backup_path;
use super::StorageError;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "linkhop";
const LINKS_FILE: &str = "links";

/// Discovery order: the requested path (if any), `./links`, the per-user
/// config directory, then `/etc`.
pub fn default_candidates(requested: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(4);

    if let Some(path) = requested.filter(|p| !p.as_os_str().is_empty()) {
        candidates.push(path.to_path_buf());
    }
    candidates.push(PathBuf::from(".").join(LINKS_FILE));
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(APP_DIR).join(LINKS_FILE));
    }
    candidates.push(Path::new("/etc").join(APP_DIR).join(LINKS_FILE));

    candidates
}

/// Adopt the first candidate that opens for reading.
///
/// Returns the absolute path of the adopted file. Every failed candidate is
/// logged and reported in [`StorageError::ConfigNotFound`].
pub fn find_links_file(candidates: &[PathBuf]) -> Result<PathBuf, StorageError> {
    let mut tried = Vec::new();

    for candidate in candidates {
        match adopt(candidate) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "using links file");
                return Ok(path);
            }
            Err(e) => {
                tracing::debug!(path = %candidate.display(), error = %e, "links file candidate rejected");
                tried.push((candidate.clone(), e));
            }
        }
    }

    for (path, err) in &tried {
        tracing::warn!(path = %path.display(), error = %err, "links file not usable");
    }
    Err(StorageError::ConfigNotFound { tried })
}

fn adopt(candidate: &Path) -> io::Result<PathBuf> {
    let path = std::path::absolute(candidate)?;

    match File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            restore_backup(&path)?;
            File::open(&path)?;
            Ok(path)
        }
        Err(e) => Err(e),
    }
}

/// Put `<path>.bak` back in place when a rewrite was interrupted after the
/// old file was moved aside but before the new one was published.
fn restore_backup(path: &Path) -> io::Result<()> {
    let backup = backup_path(path);
    if !backup.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        ));
    }

    tracing::warn!(
        path = %path.display(),
        backup = %backup.display(),
        "links file missing but backup present, restoring backup"
    );
    std::fs::rename(&backup, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_candidates_order() {
        let candidates = default_candidates(Some(Path::new("/srv/my-links")));
        assert_eq!(candidates[0], PathBuf::from("/srv/my-links"));
        assert_eq!(candidates[1], PathBuf::from("./links"));
        assert_eq!(
            candidates.last().unwrap(),
            &PathBuf::from("/etc/linkhop/links")
        );
    }

    #[test]
    fn test_default_candidates_skip_empty_request() {
        let candidates = default_candidates(Some(Path::new("")));
        assert_eq!(candidates[0], PathBuf::from("./links"));
        assert_eq!(default_candidates(None), candidates);
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let second = dir.path().join("second");
        let third = dir.path().join("third");
        std::fs::write(&second, "").unwrap();
        std::fs::write(&third, "").unwrap();

        let found = find_links_file(&[missing, second.clone(), third]).unwrap();
        assert_eq!(found, second);
    }

    #[test]
    fn test_no_candidate_collects_errors() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");

        match find_links_file(&[a.clone(), b.clone()]) {
            Err(StorageError::ConfigNotFound { tried }) => {
                let paths: Vec<_> = tried.into_iter().map(|(p, _)| p).collect();
                assert_eq!(paths, vec![a, b]);
            }
            other => panic!("expected ConfigNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_restores_interrupted_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("links");
        std::fs::write(backup_path(&path), "a https://a.example\n").unwrap();

        let found = find_links_file(&[path.clone()]).unwrap();
        assert_eq!(found, path);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a https://a.example\n"
        );
        assert!(!backup_path(&path).exists());
    }
}
