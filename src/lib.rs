//! Linkhop: Self-Hosted Short Link Redirector
//!
//! Short paths map to target URLs. The mapping lives in memory for reads and
//! is persisted to a plaintext links file that is watched for outside edits.
//!
//! # Features
//!
//! - **Concurrent Registry**: Lock-guarded cache with point-in-time snapshots
//! - **Atomic Rewrites**: Scratch file plus rename, never a half-written file
//! - **Live Reload**: Edits to the links file show up without a restart
//! - **Write Policies**: Write-behind (ordered queue) or write-through
//! - **Fuzzy Search**: Edit-distance lookup over link paths
//!
//! # Example
//!
//! ```no_run
//! use linkhop::registry::{Registry, RegistryConfig};
//! use linkhop::storage::StorageKind;
//!
//! # async fn example() -> Result<(), linkhop::RegistryError> {
//! let registry = Registry::open(&RegistryConfig {
//!     storage: StorageKind::File,
//!     links_file: Some("./links".into()),
//!     ..Default::default()
//! })
//! .await?;
//!
//! registry.put("docs", "https://docs.example.com").await?;
//! assert_eq!(registry.get("docs").as_deref(), Some("https://docs.example.com"));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod links;
pub mod registry;
pub mod search;
pub mod storage;

// Re-export commonly used types
pub use links::{Entry, EntryError, LinkTable};
pub use registry::{Registry, RegistryConfig, RegistryError, WritePolicy};
pub use storage::{LinkBackend, StorageError, StorageKind};
