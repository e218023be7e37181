//! The context object threaded through every handle.
//!
//! A [`Session`] owns the tree provider, the resolution cache, the configuration and the current
//! root grant. Handles keep a clone of it, so the session lives as long as its last handle.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info, warn};

use crate::cache::ResolutionCache;
use crate::codec::TreeRoot;
use crate::config::Config;
use crate::grant::{GrantOutcome, GrantProvider, GrantStore, PendingGrant, RootGrant};
use crate::handle::PathHandle;
use crate::physical::LocalFile;
use crate::provider::{TreeProvider, VolumeEnumerator};
use crate::tree::TreeFile;
use crate::walker::TreeWalker;
use crate::{lock, oracle, read_lock, write_lock, FsError, FsResult};

#[derive(Clone, Debug, PartialEq, Eq)]
enum ExitTarget {
    Tree(TreeRoot, String),
    Local(PathBuf),
}

struct SessionInner {
    provider: Arc<dyn TreeProvider>,
    cache: ResolutionCache,
    config: Config,
    grants: Option<Arc<dyn GrantProvider>>,
    volumes: Option<Arc<dyn VolumeEnumerator>>,
    store: Option<GrantStore>,
    root: RwLock<Option<RootGrant>>,
    exit_hooks: Mutex<Vec<ExitTarget>>,
}

impl SessionInner {
    fn run_exit_hooks(&self) -> usize {
        let targets: Vec<ExitTarget> = lock(&self.exit_hooks).drain(..).collect();
        let count = targets.len();

        for target in targets.into_iter().rev() {
            match target {
                ExitTarget::Tree(root, path) => {
                    let node = TreeWalker::new(self.provider.as_ref(), Some(&root))
                        .ok()
                        .and_then(|walker| walker.resolve(&path))
                        .filter(|node| !node.is_root());
                    let Some(node) = node else {
                        debug!("exit hook: {path} already gone");
                        continue;
                    };
                    let occupied = oracle::is_container(self.provider.as_ref(), &node)
                        && self.provider.query_children(&node.children()).map_or(true, |rows| !rows.is_empty());
                    if occupied {
                        debug!("exit hook: {path} is not empty, leaving it");
                        continue;
                    }
                    if let Err(e) = self.provider.delete_node(&node) {
                        warn!("exit hook: could not delete {path}: {e}");
                    }
                }
                ExitTarget::Local(path) => {
                    let removed = if path.is_dir() { fs::remove_dir(&path) } else { fs::remove_file(&path) };
                    if let Err(e) = removed {
                        debug!("exit hook: could not delete {}: {e}", path.display());
                    }
                }
            }
        }

        count
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.run_exit_hooks();
    }
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("root", &*read_lock(&self.inner.root))
            .finish_non_exhaustive()
    }
}

pub struct SessionBuilder {
    provider: Arc<dyn TreeProvider>,
    config: Config,
    grants: Option<Arc<dyn GrantProvider>>,
    volumes: Option<Arc<dyn VolumeEnumerator>>,
    root: Option<TreeRoot>,
}

impl SessionBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn grant_provider(mut self, grants: Arc<dyn GrantProvider>) -> Self {
        self.grants = Some(grants);
        self
    }

    pub fn volumes(mut self, volumes: Arc<dyn VolumeEnumerator>) -> Self {
        self.volumes = Some(volumes);
        self
    }

    /// Starts the session with `root` as the current grant, ignoring any stored one.
    pub fn root(mut self, root: TreeRoot) -> Self {
        self.root = Some(root);
        self
    }

    pub fn build(self) -> FsResult<Session> {
        let store = self.config.grant_store.clone().map(GrantStore::new);

        let grant = match (self.root, &store) {
            (Some(root), Some(store)) => {
                let grant = RootGrant::new(root);
                store.save(&grant)?;
                Some(grant)
            }
            (Some(root), None) => Some(RootGrant::new(root)),
            (None, Some(store)) => store.load()?,
            (None, None) => None,
        };

        Ok(Session {
            inner: Arc::new(SessionInner {
                provider: self.provider,
                cache: ResolutionCache::new(),
                config: self.config,
                grants: self.grants,
                volumes: self.volumes,
                store,
                root: RwLock::new(grant),
                exit_hooks: Mutex::new(Vec::new()),
            }),
        })
    }
}

impl Session {
    /// Starts building a session. The calling thread becomes the home thread of its cache.
    pub fn builder(provider: Arc<dyn TreeProvider>) -> SessionBuilder {
        SessionBuilder { provider, config: Config::default(), grants: None, volumes: None, root: None }
    }

    pub fn provider(&self) -> &dyn TreeProvider {
        self.inner.provider.as_ref()
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The current grant, if the host still honours it.
    pub fn current_root(&self) -> Option<TreeRoot> {
        let root = read_lock(&self.inner.root).as_ref().map(|grant| grant.root().clone())?;
        if let Some(grants) = &self.inner.grants {
            if !grants.root_still_valid(&root) {
                debug!("root grant {root} is no longer valid");
                return None;
            }
        }
        Some(root)
    }

    pub fn current_grant(&self) -> Option<RootGrant> {
        self.current_root().map(RootGrant::new)
    }

    pub fn set_root(&self, root: TreeRoot) -> FsResult {
        let grant = RootGrant::new(root);
        if let Some(store) = &self.inner.store {
            store.save(&grant)?;
        }
        info!("root grant set to {}", grant.root());
        *write_lock(&self.inner.root) = Some(grant);
        Ok(())
    }

    pub fn clear_root(&self) -> FsResult {
        if let Some(store) = &self.inner.store {
            store.clear()?;
        }
        *write_lock(&self.inner.root) = None;
        Ok(())
    }

    /// Asks for a root grant. A still-valid grant is reused unless `re_request` is set.
    pub fn request_root(&self, re_request: bool) -> FsResult<GrantRequest> {
        if !re_request {
            if let Some(root) = self.current_root() {
                return Ok(GrantRequest {
                    session: self.clone(),
                    pending: PendingGrant::ready(GrantOutcome::Granted(root)),
                });
            }
        }

        let grants = self
            .inner
            .grants
            .as_ref()
            .ok_or_else(|| FsError::RootNotInitialized("no grant provider configured".to_string()))?;
        Ok(GrantRequest { session: self.clone(), pending: grants.acquire_root() })
    }

    pub fn is_permission_granted(&self) -> bool {
        self.current_root().is_some_and(|root| oracle::is_container(self.provider(), &root.node()))
    }

    /// Volume id to mount path, empty without an enumerator.
    pub fn volumes(&self) -> HashMap<String, String> {
        self.inner.volumes.as_ref().map(|volumes| volumes.list_volumes()).unwrap_or_default()
    }

    /// A handle of the configured default kind.
    pub fn file(&self, path: &str) -> FsResult<PathHandle> {
        if self.config().traditional {
            Ok(PathHandle::Local(self.local_file(path)))
        } else {
            self.tree_file(path).map(PathHandle::Tree)
        }
    }

    pub fn tree_file(&self, path: &str) -> FsResult<TreeFile> {
        let root = self
            .current_root()
            .ok_or_else(|| FsError::RootNotInitialized(format!("no root grant for '{path}'")))?;
        Ok(TreeFile::new(self.clone(), root, path))
    }

    /// A tree handle under a root other than the current one.
    pub fn tree_file_in(&self, root: TreeRoot, path: &str) -> TreeFile {
        TreeFile::new(self.clone(), root, path)
    }

    pub fn local_file(&self, path: &str) -> LocalFile {
        LocalFile::with_buffer_size(path, self.config().buffer_size)
    }

    /// Delivers cache updates published from other threads. Call from the session's home thread.
    pub fn dispatch_pending(&self) -> usize {
        self.inner.cache.dispatch_pending()
    }

    /// Deletes `handle` when [`Session::run_exit_hooks`] runs or the last session clone drops.
    /// Later registrations are deleted first.
    pub fn delete_on_exit(&self, handle: &PathHandle) {
        let target = match handle {
            PathHandle::Tree(file) => ExitTarget::Tree(file.root(), file.path()),
            PathHandle::Local(file) => ExitTarget::Local(file.as_path().to_path_buf()),
        };

        let mut hooks = lock(&self.inner.exit_hooks);
        if !hooks.contains(&target) {
            hooks.push(target);
        }
    }

    pub fn run_exit_hooks(&self) -> usize {
        self.inner.run_exit_hooks()
    }
}

/// An in-flight root grant request.
pub struct GrantRequest {
    session: Session,
    pending: PendingGrant,
}

impl GrantRequest {
    /// Blocks for the outcome and installs a granted root as the session's current one.
    pub fn wait(self) -> FsResult<Option<TreeRoot>> {
        match self.pending.wait()? {
            GrantOutcome::Granted(root) => {
                self.session.set_root(root.clone())?;
                Ok(Some(root))
            }
            GrantOutcome::Denied => {
                info!("root grant denied");
                Ok(None)
            }
        }
    }
}
