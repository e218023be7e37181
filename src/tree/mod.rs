//! Handles into a granted document tree.
//!
//! A [`TreeFile`] is a `(root, path)` pair plus the node it last resolved to. The node is only a
//! hint: it denotes something that existed at the last resolution and may be stale. Every handle
//! subscribes to the session's [`ResolutionCache`](crate::ResolutionCache), so a resolution by any
//! handle for the same key updates all of them.

mod create;
mod filter;
mod info;
mod modify;

use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, RwLock, Weak};

use log::{debug, trace, warn};

pub use create::CreateOptions;

use crate::cache::{CacheEntry, Subscriber};
use crate::codec::{DocumentId, ListingHandle, NodeHandle, TreeRoot};
use crate::provider::{TreeProvider, WriteMode};
use crate::session::Session;
use crate::walker::TreeWalker;
use crate::{oracle, path, read_lock, write_lock, FsError, FsResult};

#[derive(Clone, Debug)]
struct TreeState {
    root: TreeRoot,
    path: String,
    node: Option<NodeHandle>,
}

struct TreeInner {
    session: Session,
    state: RwLock<TreeState>,
}

impl Subscriber for TreeInner {
    fn on_publish(&self, entry: &CacheEntry) {
        let mut state = write_lock(&self.state);
        if !entry.matches(&state.root, &state.path) {
            return;
        }

        trace!("{} converges on {}", state.path, entry.node);
        state.node = Some(entry.node.clone());
        if let Some(renamed) = &entry.renamed_path {
            state.path = path::normalize(renamed);
        }
    }
}

#[derive(Clone)]
pub struct TreeFile {
    inner: Arc<TreeInner>,
}

impl TreeFile {
    pub(crate) fn new(session: Session, root: TreeRoot, raw_path: &str) -> Self {
        let refresh = session.config().refresh_on_creation;
        let file = Self::attach(session, root, path::normalize(raw_path), None);
        if refresh {
            file.refresh();
        }
        file
    }

    /// A handle whose node is already known, e.g. a child from a listing.
    pub(crate) fn with_node(session: Session, root: TreeRoot, path: String, node: NodeHandle) -> Self {
        Self::attach(session, root, path, Some(node))
    }

    fn attach(session: Session, root: TreeRoot, path: String, node: Option<NodeHandle>) -> Self {
        let inner = Arc::new(TreeInner { session, state: RwLock::new(TreeState { root, path, node }) });
        let weak = Arc::downgrade(&inner);
        let subscriber: Weak<dyn Subscriber> = weak;
        inner.session.cache().subscribe(subscriber);
        Self { inner }
    }

    pub fn root(&self) -> TreeRoot {
        read_lock(&self.inner.state).root.clone()
    }

    pub fn path(&self) -> String {
        read_lock(&self.inner.state).path.clone()
    }

    /// The node from the last resolution, if any. Not proof of current existence.
    pub fn node(&self) -> Option<NodeHandle> {
        read_lock(&self.inner.state).node.clone()
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        self.node().map(|node| node.document_id().clone())
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub(crate) fn provider(&self) -> &dyn TreeProvider {
        self.inner.session.provider()
    }

    pub(crate) fn key(&self) -> (TreeRoot, String) {
        let state = read_lock(&self.inner.state);
        (state.root.clone(), state.path.clone())
    }

    /// Another handle under the same root.
    pub fn with_path(&self, raw_path: &str) -> TreeFile {
        TreeFile::new(self.session().clone(), self.root(), raw_path)
    }

    /// Re-walks the path. A hit is published to every handle with the same key; a miss clears
    /// this handle's node.
    pub fn refresh(&self) -> Option<NodeHandle> {
        let (root, path) = self.key();
        if path::is_root(&path) {
            let node = root.node();
            write_lock(&self.inner.state).node = Some(node.clone());
            return Some(node);
        }

        let walker = TreeWalker::new(self.provider(), Some(&root)).ok()?;
        match walker.resolve(&path) {
            Some(node) => {
                self.settle(&path, node.clone(), None);
                Some(node)
            }
            None => {
                self.forget_if(&path);
                None
            }
        }
    }

    /// The cached node if it still exists, otherwise a fresh resolution.
    pub(crate) fn current(&self) -> Option<NodeHandle> {
        match self.node() {
            Some(node) if oracle::exists(self.provider(), &node) => Some(node),
            _ => self.refresh(),
        }
    }

    /// Records `node` for `key` on this handle and publishes it. With `renamed`, every handle at
    /// `key` (this one included) moves to the new path.
    pub(crate) fn settle(&self, key: &str, node: NodeHandle, renamed: Option<String>) {
        // The state lock is released before publishing: delivery calls back into this handle.
        let root = {
            let mut state = write_lock(&self.inner.state);
            if state.path == key {
                state.node = Some(node.clone());
                if let Some(renamed) = &renamed {
                    state.path = renamed.clone();
                }
            }
            state.root.clone()
        };

        self.publish(root, key, node, renamed);
    }

    /// Publishes a resolution for some other key under this handle's root.
    pub(crate) fn announce(&self, key: &str, node: NodeHandle) {
        self.publish(self.root(), key, node, None);
    }

    fn publish(&self, root: TreeRoot, key: &str, node: NodeHandle, renamed_path: Option<String>) {
        self.session().cache().publish(CacheEntry { root, path: key.to_string(), node, renamed_path });
    }

    pub(crate) fn forget_if(&self, key: &str) {
        let mut state = write_lock(&self.inner.state);
        if state.path == key {
            state.node = None;
        }
    }

    pub fn exists(&self) -> bool {
        self.refresh().is_some()
    }

    /// Listing handle of the parent container, walking to it when needed.
    pub(crate) fn parent_listing(&self) -> FsResult<ListingHandle> {
        self.parent_node()
            .filter(|node| oracle::is_container(self.provider(), node))
            .map(|node| node.children())
            .ok_or_else(|| FsError::HierarchyBroken(format!("parent of {} is not present", self.path())))
    }

    /// Deletes a file or an empty container. The root is never deleted.
    pub fn delete(&self) -> bool {
        let Some(node) = self.refresh() else {
            return false;
        };
        if oracle::is_container(self.provider(), &node) && !self.is_empty() {
            debug!("refusing to delete non-empty {}", self.path());
            return false;
        }
        self.remove(node)
    }

    /// Deletes this node and everything below it.
    pub fn delete_recursively(&self) -> bool {
        match self.refresh() {
            Some(node) => self.remove(node),
            None => false,
        }
    }

    fn remove(&self, node: NodeHandle) -> bool {
        let path = self.path();
        if node.is_root() {
            warn!("refusing to delete the granted root {}", node.root());
            return false;
        }

        match self.provider().delete_node(&node) {
            Ok(deleted) => {
                if deleted {
                    self.forget_if(&path);
                }
                deleted
            }
            Err(e) => {
                warn!("could not delete {path}: {e}");
                false
            }
        }
    }

    pub fn open_read(&self) -> FsResult<Box<dyn Read + Send>> {
        let node = self
            .current()
            .ok_or_else(|| FsError::NotFound(self.path(), "cannot read a missing document".to_string()))?;
        self.provider().open_read(&node)?.ok_or_else(|| FsError::NoStream(self.path()))
    }

    pub fn open_write(&self, mode: WriteMode) -> FsResult<Box<dyn Write + Send>> {
        let node = self
            .current()
            .ok_or_else(|| FsError::NotFound(self.path(), "cannot write a missing document".to_string()))?;
        self.provider().open_write(&node, mode)?.ok_or_else(|| FsError::NoStream(self.path()))
    }
}

impl fmt::Debug for TreeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = read_lock(&self.inner.state);
        f.debug_struct("TreeFile")
            .field("root", &state.root)
            .field("path", &state.path)
            .field("node", &state.node.as_ref().map(|node| node.document_id()))
            .finish()
    }
}

impl fmt::Display for TreeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = read_lock(&self.inner.state);
        write!(f, "{}{}", state.root, state.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::config::Config;
    use crate::testing::MemoryTree;

    fn session(tree: &MemoryTree) -> Session {
        Session::builder(Arc::new(tree.clone())).root(tree.root()).build().unwrap()
    }

    #[test]
    fn paths_are_normalized() {
        let tree = MemoryTree::new();
        let file = session(&tree).tree_file("docs//a.txt/").unwrap();
        assert_eq!(file.path(), "/docs/a.txt");
        assert!(file.node().is_none());
    }

    #[test]
    fn refresh_resolves_and_forgets() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let docs = tree.insert_dir(root.tree_id(), "docs");
        let session = session(&tree);

        let file = session.tree_file("/docs").unwrap();
        assert_eq!(file.document_id(), Some(docs.clone()));

        tree.delete_node(&root.node_handle(docs)).unwrap();
        assert!(!file.exists());
        assert!(file.node().is_none());
    }

    #[test]
    fn root_handle_resolves_without_walking() {
        let tree = MemoryTree::new();
        let file = session(&tree).tree_file("/").unwrap();
        assert_eq!(file.node(), Some(tree.root().node()));
        assert!(!file.delete_recursively());
    }

    #[test]
    fn lazy_handles_resolve_on_demand() {
        let tree = MemoryTree::new();
        let root = tree.root();
        tree.insert_file(root.tree_id(), "a.txt", b"abc");
        let config = Config { refresh_on_creation: false, ..Config::default() };
        let session = Session::builder(Arc::new(tree.clone())).config(config).root(root).build().unwrap();

        let file = session.tree_file("/a.txt").unwrap();
        assert!(file.node().is_none());

        let mut text = String::new();
        file.open_read().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "abc");
        assert!(file.node().is_some());
    }

    #[test]
    fn delete_refuses_non_empty_containers() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let docs = tree.insert_dir(root.tree_id(), "docs");
        tree.insert_file(&docs, "a.txt", b"a");
        let session = session(&tree);

        let dir = session.tree_file("/docs").unwrap();
        assert!(!dir.delete());
        assert!(session.tree_file("/docs/a.txt").unwrap().delete());
        assert!(dir.delete());
        assert!(!dir.exists());
    }

    #[test]
    fn off_thread_resolution_lands_on_next_dispatch() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let session = session(&tree);

        let waiting = session.tree_file("/x").unwrap();
        let x = tree.insert_dir(root.tree_id(), "x");

        let remote = session.clone();
        thread::spawn(move || {
            remote.tree_file("/x").unwrap();
        })
        .join()
        .unwrap();

        assert!(waiting.node().is_none());
        assert_eq!(session.dispatch_pending(), 1);
        assert_eq!(waiting.document_id(), Some(x));
    }

    #[test]
    fn streams_fail_for_missing_nodes() {
        let tree = MemoryTree::new();
        let root = tree.root();
        tree.insert_dir(root.tree_id(), "dir");
        let session = session(&tree);

        let missing = session.tree_file("/nope").unwrap();
        assert!(matches!(missing.open_read(), Err(FsError::NotFound(..))));

        let dir = session.tree_file("/dir").unwrap();
        assert!(matches!(dir.open_write(WriteMode::WriteTruncate), Err(FsError::NoStream(_))));
    }
}
