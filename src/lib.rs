//! File Access Abstractions (FSX)
//!
//! This crate lets callers perform path-like operations (`exists`, `create_new_file`, `mkdirs`,
//! `list`, `copy_to`, `rename_to`, stream I/O) without knowing which storage model backs them:
//! a traditional path-based filesystem, or a permission-scoped document tree that can only be
//! addressed through opaque document identifiers. Both are exposed through [`PathHandle`].
//!
//! The document-tree side has no path lookup, so every path is resolved by walking the tree one
//! segment at a time ([`walker::TreeWalker`]). Resolved identifiers are broadcast through a
//! [`cache::ResolutionCache`] so that every live handle for the same `(root, path)` converges on
//! the same node.

pub mod cache;
pub mod codec;
pub mod config;
pub mod copy;
pub mod error;
pub mod grant;
pub mod handle;
pub mod oracle;
pub mod path;
pub mod physical;
pub mod provider;
pub mod session;
pub mod testing;
pub mod tree;
pub mod walk;
pub mod walker;
#[cfg(feature = "zip")]
pub mod archive;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use cache::{CacheEntry, ResolutionCache};
pub use codec::{DocumentId, ListingHandle, NodeHandle, TreeRoot};
pub use config::Config;
pub use copy::OnErrorAction;
pub use error::FsError;
pub use grant::{GrantOutcome, GrantProvider, PendingGrant, RootGrant};
pub use handle::PathHandle;
pub use physical::LocalFile;
pub use provider::{DocumentRow, TreeProvider, VolumeEnumerator, WriteMode};
pub use session::Session;
pub use tree::{CreateOptions, TreeFile};
pub use walk::{TreeWalk, WalkControl, WalkDirection};

#[cfg(feature = "zip")]
pub use crate::archive::ZipTree;

/// Result type used throughout the crate, wrapping `FsError`.
pub type FsResult<T = ()> = std::result::Result<T, FsError>;

/// One child as reported by a listing. `size` is meaningless for containers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_container: bool,
    pub size: u64,
    pub last_modified: i64,
}

// Handle state is plain data, so a panic elsewhere never leaves it half-written.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
