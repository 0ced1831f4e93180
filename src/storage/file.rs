//! Links file backend
//!
//! `put` appends a single line. `update`, `delete` and `replace` rewrite the
//! whole file through a scratch file and publish it with renames, so the
//! canonical path never holds a partially written file:
//!
//! 1. copy the current file into `<path>~`, applying the change
//! 2. rename `<path>` to `<path>.bak`
//! 3. rename `<path>~` to `<path>`
//! 4. remove `<path>.bak`
//!
//! All mutations hold the backend's write lock. Reads do not, so a read that
//! races a publish can fail with `NotFound` and should be retried.

use super::discovery::{default_candidates, find_links_file};
use super::watcher::{reload_channel, LinksWatcher, ReloadSignal};
use super::{LinkBackend, StorageError, StorageKind};
use crate::links::{format_line, line_path, parse_table, LinkTable};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Scratch file a rewrite is staged in
pub(crate) fn scratch_path(path: &Path) -> PathBuf {
    with_suffix(path, "~")
}

/// Where the previous file is parked while a rewrite is published
pub(crate) fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Durable backend over a single links file
pub struct FileBackend {
    path: PathBuf,
    /// Serializes appends and rewrites
    write_lock: Mutex<()>,
    reload: Mutex<Option<ReloadSignal>>,
    watcher: Mutex<Option<LinksWatcher>>,
}

impl FileBackend {
    /// Discover the links file and start watching it.
    ///
    /// `requested` is tried before the default locations.
    pub fn open(requested: Option<&Path>) -> Result<Self, StorageError> {
        let path = find_links_file(&default_candidates(requested))?;
        Ok(Self::with_path(path))
    }

    /// Use an already discovered links file.
    ///
    /// A failure to set up the watcher is logged and the backend simply never
    /// signals a reload.
    pub fn with_path(path: PathBuf) -> Self {
        let (tx, rx) = reload_channel();

        let (watcher, reload) = match LinksWatcher::start(&path, tx) {
            Ok(watcher) => (Some(watcher), Some(rx)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to watch links file, live reload disabled"
                );
                (None, None)
            }
        };

        Self {
            path,
            write_lock: Mutex::new(()),
            reload: Mutex::new(reload),
            watcher: Mutex::new(watcher),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether outside edits are being watched
    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }

    /// Stop watching for outside edits. The reload channel closes, which
    /// ends any task waiting on it.
    pub fn stop_watching(&self) {
        if self.watcher.lock().take().is_some() {
            tracing::debug!(path = %self.path.display(), "stopped watching links file");
        }
    }

    /// Copy the file into the scratch file, replacing the first line for
    /// `key` with `target` (or dropping it when `target` is `None`) and
    /// dropping any later lines for `key`. Publishes only if a line matched.
    fn rewrite(&self, key: &str, target: Option<&str>) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock();
        let scratch = scratch_path(&self.path);

        let changed = {
            let mut reader = BufReader::new(File::open(&self.path)?);
            let mut writer = BufWriter::new(File::create(&scratch)?);
            let mut changed = false;
            let mut line = Vec::new();

            // Raw bytes, so untouched lines keep their exact endings
            loop {
                line.clear();
                if reader.read_until(b'\n', &mut line)? == 0 {
                    break;
                }

                let matches = std::str::from_utf8(&line)
                    .ok()
                    .and_then(line_path)
                    .is_some_and(|path| path == key);
                if matches {
                    if let (Some(target), false) = (target, changed) {
                        writer.write_all(format_line(key, target).as_bytes())?;
                    }
                    changed = true;
                    continue;
                }

                writer.write_all(&line)?;
            }

            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            changed
        };

        if changed {
            self.publish(&scratch)?;
        } else {
            fs::remove_file(&scratch)?;
        }

        Ok(changed)
    }

    /// Swap the scratch file in for the canonical one. Caller holds the
    /// write lock.
    fn publish(&self, scratch: &Path) -> Result<(), StorageError> {
        let backup = backup_path(&self.path);
        fs::set_permissions(scratch, fs::metadata(&self.path)?.permissions())?;

        fs::rename(&self.path, &backup)?;
        fs::rename(scratch, &self.path)?;
        fs::remove_file(&backup)?;

        Ok(())
    }
}

/// Whether the file is non-empty and lacks a trailing newline, so an append
/// would run into the last line
fn missing_trailing_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }

    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl LinkBackend for FileBackend {
    fn read(&self) -> Result<LinkTable, StorageError> {
        let text = fs::read_to_string(&self.path)?;
        Ok(parse_table(&text)?)
    }

    fn put(&self, path: &str, target: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut line = String::new();
        if missing_trailing_newline(&mut file)? {
            line.push('\n');
        }
        line.push_str(&format_line(path, target));

        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        Ok(())
    }

    fn update(&self, path: &str, target: &str) -> Result<bool, StorageError> {
        self.rewrite(path, Some(target))
    }

    fn delete(&self, path: &str) -> Result<bool, StorageError> {
        self.rewrite(path, None)
    }

    fn replace(&self, contents: &str) -> Result<LinkTable, StorageError> {
        let table = parse_table(contents)?;

        let _guard = self.write_lock.lock();
        let scratch = scratch_path(&self.path);
        {
            let mut file = File::create(&scratch)?;
            file.write_all(contents.as_bytes())?;
            if !contents.is_empty() && !contents.ends_with('\n') {
                file.write_all(b"\n")?;
            }
            file.sync_all()?;
        }
        self.publish(&scratch)?;

        Ok(table)
    }

    fn reload_signal(&self) -> Option<ReloadSignal> {
        self.reload.lock().take()
    }

    fn kind(&self) -> StorageKind {
        StorageKind::File
    }
}
