//! The link registry: an in-memory cache in front of a persistence backend
//!
//! Reads are served from the cache under a shared lock and never touch the
//! backend. Mutations reach the cache and the backend according to the
//! [`WritePolicy`]. A background task re-reads the backend
//! whenever it signals a reload and swaps the cache wholesale.
//!
//! Under [`WritePolicy::WriteBehind`] backend writes go through a single
//! ordered queue, so they land in issue order. A reload that arrives while
//! writes are still queued re-seeds the cache from a file that does not yet
//! hold them; the cache catches up on the reload that follows the write.

use crate::links::{parse_table, LinkTable};
use crate::storage::{open_backend, LinkBackend, ReloadSignal, StorageError, StorageKind};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// How mutations reach the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Return once the cache is updated; persist in the background
    #[default]
    WriteBehind,
    /// Persist first; the cache changes only once the backend has succeeded
    WriteThrough,
}

impl FromStr for WritePolicy {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "write-behind" | "async" => Ok(WritePolicy::WriteBehind),
            "write-through" | "sync" => Ok(WritePolicy::WriteThrough),
            _ => Err(RegistryError::UnknownWritePolicy(s.to_string())),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePolicy::WriteBehind => write!(f, "write-behind"),
            WritePolicy::WriteThrough => write!(f, "write-through"),
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub storage: StorageKind,
    /// Preferred links file, tried before the default locations
    pub links_file: Option<PathBuf>,
    pub write_policy: WritePolicy,
}

/// A backend mutation
#[derive(Debug, Clone)]
enum WriteOp {
    Put { path: String, target: String },
    Update { path: String, target: String },
    Delete { path: String },
}

impl WriteOp {
    fn apply(&self, backend: &dyn LinkBackend) -> Result<(), StorageError> {
        match self {
            WriteOp::Put { path, target } => backend.put(path, target),
            WriteOp::Update { path, target } => {
                if !backend.update(path, target)? {
                    tracing::debug!(path = %path, "updated link not in backend, appending instead");
                    backend.put(path, target)?;
                }
                Ok(())
            }
            WriteOp::Delete { path } => backend.delete(path).map(|_| ()),
        }
    }

    fn apply_to_cache(&self, cache: &mut LinkTable) {
        match self {
            WriteOp::Put { path, target } | WriteOp::Update { path, target } => {
                cache.insert(path.clone(), target.clone());
            }
            WriteOp::Delete { path } => {
                cache.remove(path);
            }
        }
    }
}

enum Command {
    Write(WriteOp),
    /// Answered once every earlier write has been applied
    Barrier(oneshot::Sender<()>),
}

/// In-memory link cache backed by a [`LinkBackend`]
pub struct Registry {
    cache: RwLock<Arc<LinkTable>>,
    backend: Arc<dyn LinkBackend>,
    policy: WritePolicy,
    /// Write-behind queue; `None` under write-through
    writer: Option<mpsc::UnboundedSender<Command>>,
    /// Serializes write-through mutations so the cache applies them in
    /// backend order
    write_through: tokio::sync::Mutex<()>,
    reload_task: Mutex<Option<JoinHandle<()>>>,
}

impl Registry {
    /// Open the configured backend and build a registry over it
    pub async fn open(config: &RegistryConfig) -> Result<Arc<Self>, RegistryError> {
        let storage = config.storage;
        let links_file = config.links_file.clone();
        let backend =
            tokio::task::spawn_blocking(move || open_backend(storage, links_file.as_deref()))
                .await??;

        Self::new(backend, config.write_policy).await
    }

    /// Build a registry over a backend.
    ///
    /// Seeds the cache with a full read; a failed read fails construction.
    /// Spawns the reload task (if the backend signals reloads) and, under
    /// write-behind, the writer task. Must be called within a tokio runtime.
    pub async fn new(
        backend: Arc<dyn LinkBackend>,
        policy: WritePolicy,
    ) -> Result<Arc<Self>, RegistryError> {
        let initial = blocking(&backend, |b| b.read()).await?;
        tracing::info!(
            storage = %backend.kind(),
            policy = %policy,
            links = initial.len(),
            "link registry loaded"
        );

        let writer = match policy {
            WritePolicy::WriteBehind => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(write_behind_loop(Arc::clone(&backend), rx));
                Some(tx)
            }
            WritePolicy::WriteThrough => None,
        };

        let registry = Arc::new(Self {
            cache: RwLock::new(Arc::new(initial)),
            backend,
            policy,
            writer,
            write_through: tokio::sync::Mutex::new(()),
            reload_task: Mutex::new(None),
        });

        if let Some(signal) = registry.backend.reload_signal() {
            let handle = tokio::spawn(reload_loop(Arc::downgrade(&registry), signal));
            *registry.reload_task.lock() = Some(handle);
        }

        Ok(registry)
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.backend.kind()
    }

    /// Look up the target for a path
    pub fn get(&self, path: &str) -> Option<String> {
        self.cache.read().get(path).cloned()
    }

    /// Point-in-time snapshot of every entry. Later mutations never show up
    /// in a snapshot that has already been returned.
    pub fn get_all(&self) -> Arc<LinkTable> {
        Arc::clone(&self.cache.read())
    }

    /// Every path, in no particular order
    pub fn get_all_keys(&self) -> Vec<String> {
        self.cache.read().keys().cloned().collect()
    }

    /// Entries for the given paths; paths not in the registry are skipped
    pub fn get_filtered<I, S>(&self, paths: I) -> LinkTable
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cache = self.cache.read();
        paths
            .into_iter()
            .filter_map(|path| {
                let path = path.as_ref();
                cache
                    .get_key_value(path)
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Add an entry. The backend appends without deduplicating.
    pub async fn put(
        &self,
        path: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.mutate(WriteOp::Put {
            path: path.into(),
            target: target.into(),
        })
        .await
    }

    /// Overwrite an existing entry. The backend rewrites its file, or appends
    /// if the path is not in it.
    pub async fn update(
        &self,
        path: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.mutate(WriteOp::Update {
            path: path.into(),
            target: target.into(),
        })
        .await
    }

    /// Remove an entry.
    ///
    /// Returns `false` without touching the backend when the path is absent.
    pub async fn delete(&self, path: &str) -> Result<bool, RegistryError> {
        if !self.cache.read().contains_key(path) {
            return Ok(false);
        }
        self.mutate(WriteOp::Delete {
            path: path.to_string(),
        })
        .await?;
        Ok(true)
    }

    /// Replace every entry with the contents of a links document.
    ///
    /// The document is validated before anything changes. Queued writes are
    /// flushed first so they cannot land on top of the replacement.
    pub async fn replace_all(&self, contents: &str) -> Result<Arc<LinkTable>, RegistryError> {
        parse_table(contents).map_err(StorageError::from)?;
        self.sync().await?;

        let contents = contents.to_string();
        let table = Arc::new(blocking(&self.backend, move |b| b.replace(&contents)).await?);
        *self.cache.write() = Arc::clone(&table);

        tracing::info!(links = table.len(), "links replaced");
        Ok(table)
    }

    /// Re-read the backend and swap the cache.
    ///
    /// On failure the current cache is kept.
    pub async fn reload(&self) -> Result<usize, RegistryError> {
        let table = blocking(&self.backend, |b| b.read()).await?;
        let count = table.len();
        *self.cache.write() = Arc::new(table);
        Ok(count)
    }

    /// Wait until every write issued so far has reached the backend.
    ///
    /// Returns immediately under write-through.
    pub async fn sync(&self) -> Result<(), RegistryError> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };

        let (tx, rx) = oneshot::channel();
        writer
            .send(Command::Barrier(tx))
            .map_err(|_| RegistryError::WriterClosed)?;
        rx.await.map_err(|_| RegistryError::WriterClosed)
    }

    /// Apply a mutation to the cache and the backend.
    ///
    /// Write-behind updates the cache and queues the backend write.
    /// Write-through persists first and leaves the cache untouched if the
    /// backend fails.
    async fn mutate(&self, op: WriteOp) -> Result<(), RegistryError> {
        match &self.writer {
            Some(writer) => {
                op.apply_to_cache(Arc::make_mut(&mut self.cache.write()));
                writer
                    .send(Command::Write(op))
                    .map_err(|_| RegistryError::WriterClosed)
            }
            None => {
                let _serial = self.write_through.lock().await;
                let persisted = op.clone();
                blocking(&self.backend, move |b| persisted.apply(b)).await?;
                op.apply_to_cache(Arc::make_mut(&mut self.cache.write()));
                Ok(())
            }
        }
    }
}

impl Drop for Registry {
    /// Stops reacting to reloads. Queued write-behind operations still drain:
    /// the writer task exits once its queue is empty.
    fn drop(&mut self) {
        if let Some(handle) = self.reload_task.lock().take() {
            handle.abort();
        }
    }
}

/// Run a backend call on the blocking pool
async fn blocking<T, F>(backend: &Arc<dyn LinkBackend>, f: F) -> Result<T, RegistryError>
where
    T: Send + 'static,
    F: FnOnce(&dyn LinkBackend) -> Result<T, StorageError> + Send + 'static,
{
    let backend = Arc::clone(backend);
    Ok(tokio::task::spawn_blocking(move || f(backend.as_ref())).await??)
}

async fn write_behind_loop(
    backend: Arc<dyn LinkBackend>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Write(op) => {
                let backend = Arc::clone(&backend);
                let result = tokio::task::spawn_blocking(move || {
                    let result = op.apply(backend.as_ref());
                    (op, result)
                })
                .await;

                match result {
                    Ok((_, Ok(()))) => {}
                    Ok((op, Err(e))) => {
                        tracing::error!(op = ?op, error = %e, "failed to persist link change");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "link writer task failed");
                    }
                }
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!("link writer stopped");
}

async fn reload_loop(registry: Weak<Registry>, mut signal: ReloadSignal) {
    while signal.recv().await.is_some() {
        let Some(registry) = registry.upgrade() else {
            break;
        };

        match registry.reload().await {
            Ok(count) => tracing::info!(links = count, "links file changed, reloaded"),
            Err(e) => {
                tracing::error!(error = %e, "failed to reload links, keeping previous links")
            }
        }
    }

    tracing::debug!("link reload task stopped");
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Link writer is no longer running")]
    WriterClosed,

    #[error("Unknown write policy '{0}' (expected 'write-behind' or 'write-through')")]
    UnknownWritePolicy(String),
}
