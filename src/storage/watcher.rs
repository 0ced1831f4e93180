//! Live reload for the links file
//!
//! The watch is placed on the file's parent directory so that atomic
//! rename-replacement of the file keeps being observed. Events are filtered
//! down to the links file's own name before a signal is sent.

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Receives one message per observed change (bursts coalesce)
pub type ReloadSignal = mpsc::Receiver<()>;

/// Create a reload channel. Capacity 1: a pending signal already covers any
/// later change, since a reload re-reads the whole file.
pub fn reload_channel() -> (mpsc::Sender<()>, ReloadSignal) {
    mpsc::channel(1)
}

/// Directory watch for a single links file. Dropping it stops the watch and
/// closes the reload channel.
pub struct LinksWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl LinksWatcher {
    pub fn start(path: &Path, tx: mpsc::Sender<()>) -> Result<Self, notify::Error> {
        let name: OsString = path
            .file_name()
            .ok_or_else(|| notify::Error::generic("links path has no file name"))?
            .to_os_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if is_links_change(&event, &name) {
                        tracing::debug!(kind = ?event.kind, "links file changed");
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => tracing::warn!(error = %e, "links file watch error"),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::debug!(dir = %dir.display(), "watching links directory");

        Ok(Self {
            _watcher: watcher,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether an event means the links file was written or (re)created
fn is_links_change(event: &Event, name: &OsStr) -> bool {
    let relevant_kind = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => false,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };

    // A two-path rename lists [from, to]; only the destination matters
    let paths = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().map(std::slice::from_ref).unwrap_or_default()
        }
        _ => event.paths.as_slice(),
    };

    relevant_kind && paths.iter().any(|p| p.file_name() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::time::Duration;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_filters_by_name() {
        let name = OsStr::new("links");
        let write = EventKind::Modify(ModifyKind::Data(DataChange::Content));

        assert!(is_links_change(&event(write, &["/srv/links"]), name));
        assert!(!is_links_change(&event(write, &["/srv/links~"]), name));
        assert!(!is_links_change(&event(write, &["/srv/other"]), name));
    }

    #[test]
    fn test_filters_by_kind() {
        let name = OsStr::new("links");

        assert!(is_links_change(
            &event(EventKind::Create(CreateKind::File), &["/srv/links"]),
            name
        ));
        assert!(is_links_change(
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/srv/links~", "/srv/links"]
            ),
            name
        ));
        // Moving the links file aside to its backup
        assert!(!is_links_change(
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/srv/links", "/srv/links.bak"]
            ),
            name
        ));
        assert!(!is_links_change(
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/srv/links"]
            ),
            name
        ));
        assert!(!is_links_change(
            &event(
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
                &["/srv/links"]
            ),
            name
        ));
        assert!(!is_links_change(
            &event(EventKind::Remove(RemoveKind::File), &["/srv/links"]),
            name
        ));
        assert!(!is_links_change(
            &event(EventKind::Access(AccessKind::Any), &["/srv/links"]),
            name
        ));
    }

    #[tokio::test]
    async fn test_signals_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("links");
        std::fs::write(&path, "a https://a.example\n").unwrap();

        let (tx, mut rx) = reload_channel();
        let watcher = LinksWatcher::start(&path, tx).unwrap();
        assert_eq!(watcher.path(), path.as_path());

        std::fs::write(dir.path().join("unrelated"), "noise").unwrap();
        std::fs::write(&path, "b https://b.example\n").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(signal.unwrap(), Some(()));
    }
}
