use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use log::trace;

use crate::codec::{DocumentId, ListingHandle, NodeHandle, TreeRoot};
use crate::provider::{DocumentRow, SpaceInfo, TreeProvider, WriteMode, DIRECTORY_MIME};
use crate::{lock, FsError, FsResult};

pub const AUTHORITY: &str = "memory";

const TOTAL_SPACE: u64 = 16 << 30;
const FREE_SPACE: u64 = 4 << 30;

#[derive(Clone, Debug)]
struct Node {
    id: DocumentId,
    parent: Option<DocumentId>,
    name: String,
    mime_type: String,
    content: Vec<u8>,
    last_modified: i64,
}

impl Node {
    fn is_container(&self) -> bool {
        self.mime_type == DIRECTORY_MIME
    }

    fn row(&self) -> DocumentRow {
        DocumentRow {
            document_id: self.id.clone(),
            display_name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size: if self.is_container() { 0 } else { self.content.len() as i64 },
            last_modified: self.last_modified,
        }
    }
}

#[derive(Default)]
struct State {
    nodes: Vec<Node>,
    created: Vec<String>,
    failing: bool,
    move_unsupported: bool,
    short_writes: bool,
    clock: i64,
}

impl State {
    fn check(&self) -> FsResult {
        if self.failing {
            return Err(FsError::Generic("memory tree: injected query failure".to_string()));
        }
        Ok(())
    }

    fn find(&self, id: &DocumentId) -> Option<&Node> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    fn find_mut(&mut self, id: &DocumentId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| &node.id == id)
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn fresh_id(&self, parent: &DocumentId, name: &str) -> DocumentId {
        let base = match parent.relative() {
            "" => format!("{}:{name}", parent.volume()),
            relative => format!("{}:{relative}/{name}", parent.volume()),
        };

        let mut id = DocumentId::new(base.clone());
        let mut n = 1;
        while self.find(&id).is_some() {
            id = DocumentId::new(format!("{base}~{n}"));
            n += 1;
        }
        id
    }

    fn add(&mut self, parent: &DocumentId, id: DocumentId, name: &str, mime_type: &str, content: Vec<u8>) -> DocumentId {
        let last_modified = self.tick();
        self.nodes.push(Node {
            id: id.clone(),
            parent: Some(parent.clone()),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            content,
            last_modified,
        });
        id
    }

    fn is_ancestor(&self, ancestor: &DocumentId, of: &DocumentId) -> bool {
        let mut cursor = Some(of.clone());
        while let Some(id) = cursor {
            if &id == ancestor {
                return true;
            }
            cursor = self.find(&id).and_then(|node| node.parent.clone());
        }
        false
    }

    fn remove_subtree(&mut self, id: &DocumentId) {
        let doomed: Vec<DocumentId> = self
            .nodes
            .iter()
            .filter(|node| self.is_ancestor(id, &node.id))
            .map(|node| node.id.clone())
            .collect();
        self.nodes.retain(|node| !doomed.contains(&node.id));
    }
}

/// In-memory [`TreeProvider`] with the quirks of a real document tree: duplicate display names
/// are accepted, identifiers are opaque, and moves can be switched off.
///
/// Clones share the same tree, so a test can hand one clone to a [`crate::Session`] and keep
/// another for assertions.
#[derive(Clone)]
pub struct MemoryTree {
    root: TreeRoot,
    state: Arc<Mutex<State>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// A tree granted at the top of the `primary` volume.
    pub fn new() -> Self {
        Self::with_root("primary", "")
    }

    pub fn with_root(volume: &str, relative: &str) -> Self {
        let tree = DocumentId::new(format!("{volume}:{relative}"));
        let name = relative.rsplit('/').next().filter(|name| !name.is_empty()).unwrap_or(volume);

        let mut state = State::default();
        state.nodes.push(Node {
            id: tree.clone(),
            parent: None,
            name: name.to_string(),
            mime_type: DIRECTORY_MIME.to_string(),
            content: Vec::new(),
            last_modified: 0,
        });

        Self { root: TreeRoot::new(AUTHORITY, tree), state: Arc::new(Mutex::new(state)) }
    }

    pub fn root(&self) -> TreeRoot {
        self.root.clone()
    }

    pub fn insert_dir(&self, parent: &DocumentId, name: &str) -> DocumentId {
        let mut state = lock(&self.state);
        let id = state.fresh_id(parent, name);
        state.add(parent, id, name, DIRECTORY_MIME, Vec::new())
    }

    pub fn insert_file(&self, parent: &DocumentId, name: &str, content: &[u8]) -> DocumentId {
        let mut state = lock(&self.state);
        let id = state.fresh_id(parent, name);
        state.add(parent, id, name, "application/octet-stream", content.to_vec())
    }

    /// Inserts a node under a caller-chosen identifier. `None` content makes a container.
    pub fn insert_with_id(&self, parent: &DocumentId, id: &str, name: &str, content: Option<&[u8]>) -> DocumentId {
        let mut state = lock(&self.state);
        match content {
            Some(content) => state.add(parent, id.into(), name, "application/octet-stream", content.to_vec()),
            None => state.add(parent, id.into(), name, DIRECTORY_MIME, Vec::new()),
        }
    }

    /// Content of a file node, `None` for containers and unknown ids.
    pub fn content(&self, id: &DocumentId) -> Option<Vec<u8>> {
        lock(&self.state).find(id).filter(|node| !node.is_container()).map(|node| node.content.clone())
    }

    /// Display names passed to [`TreeProvider::create_child`], in call order.
    pub fn created(&self) -> Vec<String> {
        lock(&self.state).created.clone()
    }

    pub fn clear_created(&self) {
        lock(&self.state).created.clear();
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        lock(&self.state).nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Makes every provider call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    pub fn set_move_supported(&self, supported: bool) {
        lock(&self.state).move_unsupported = !supported;
    }

    /// Drops the last byte of every write, to exercise length verification.
    pub fn set_short_writes(&self, short: bool) {
        lock(&self.state).short_writes = short;
    }
}

impl TreeProvider for MemoryTree {
    fn query_children(&self, listing: &ListingHandle) -> FsResult<Vec<DocumentRow>> {
        let state = lock(&self.state);
        state.check()?;

        let parent = listing.parent_id();
        match state.find(parent) {
            None => return Err(FsError::NotFound(parent.to_string(), "no such document".to_string())),
            Some(node) if !node.is_container() => {
                return Err(FsError::Generic(format!("{parent} is not a container")));
            }
            Some(_) => {}
        }

        Ok(state.nodes.iter().filter(|node| node.parent.as_ref() == Some(parent)).map(Node::row).collect())
    }

    fn query_node(&self, node: &NodeHandle) -> FsResult<Option<DocumentRow>> {
        let state = lock(&self.state);
        state.check()?;
        Ok(state.find(node.document_id()).map(Node::row))
    }

    fn create_child(&self, parent: &ListingHandle, mime_type: &str, name: &str) -> FsResult<Option<DocumentId>> {
        let mut state = lock(&self.state);
        state.check()?;

        let parent = parent.parent_id();
        if !state.find(parent).is_some_and(Node::is_container) {
            return Ok(None);
        }

        state.created.push(name.to_string());
        let id = state.fresh_id(parent, name);
        trace!("memory tree: create {id} ({mime_type})");
        Ok(Some(state.add(parent, id, name, mime_type, Vec::new())))
    }

    fn delete_node(&self, node: &NodeHandle) -> FsResult<bool> {
        let mut state = lock(&self.state);
        state.check()?;

        let id = node.document_id();
        match state.find(id) {
            Some(found) if found.parent.is_some() => {
                state.remove_subtree(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn move_node(
        &self,
        node: &NodeHandle,
        from_parent: &NodeHandle,
        to_parent: &NodeHandle,
    ) -> FsResult<Option<NodeHandle>> {
        let mut state = lock(&self.state);
        state.check()?;
        if state.move_unsupported {
            return Err(FsError::Generic("memory tree: move not supported".to_string()));
        }

        let id = node.document_id();
        let target = to_parent.document_id();
        let attached = state.find(id).is_some_and(|n| n.parent.as_ref() == Some(from_parent.document_id()));
        if !attached || !state.find(target).is_some_and(Node::is_container) || state.is_ancestor(id, target) {
            return Ok(None);
        }

        let stamp = state.tick();
        if let Some(moving) = state.find_mut(id) {
            moving.parent = Some(target.clone());
            moving.last_modified = stamp;
        }
        Ok(Some(to_parent.root().node_handle(id.clone())))
    }

    fn rename_node(&self, node: &NodeHandle, new_name: &str) -> FsResult<bool> {
        let mut state = lock(&self.state);
        state.check()?;

        let stamp = state.tick();
        match state.find_mut(node.document_id()) {
            Some(found) if found.parent.is_some() => {
                found.name = new_name.to_string();
                found.last_modified = stamp;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn supports_move(&self) -> bool {
        !lock(&self.state).move_unsupported
    }

    fn open_read(&self, node: &NodeHandle) -> FsResult<Option<Box<dyn Read + Send>>> {
        let state = lock(&self.state);
        state.check()?;

        Ok(state
            .find(node.document_id())
            .filter(|found| !found.is_container())
            .map(|found| Box::new(Cursor::new(found.content.clone())) as Box<dyn Read + Send>))
    }

    fn open_write(&self, node: &NodeHandle, mode: WriteMode) -> FsResult<Option<Box<dyn Write + Send>>> {
        let state = lock(&self.state);
        state.check()?;
        if !mode.writes() {
            return Ok(None);
        }

        let Some(found) = state.find(node.document_id()).filter(|found| !found.is_container()) else {
            return Ok(None);
        };

        let buf = if mode.truncates() { Vec::new() } else { found.content.clone() };
        let pos = if mode.appends() { buf.len() } else { 0 };
        Ok(Some(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            id: found.id.clone(),
            buf,
            pos,
        })))
    }

    fn space(&self, _root: &TreeRoot) -> Option<SpaceInfo> {
        Some(SpaceInfo { free: FREE_SPACE, usable: FREE_SPACE, total: TOTAL_SPACE })
    }
}

/// Buffers writes and commits them to the node on flush and on drop.
struct MemoryWriter {
    state: Arc<Mutex<State>>,
    id: DocumentId,
    buf: Vec<u8>,
    pos: usize,
}

impl MemoryWriter {
    fn commit(&self) {
        let mut state = lock(&self.state);
        let mut data = self.buf.clone();
        if state.short_writes {
            data.pop();
        }

        let stamp = state.tick();
        if let Some(node) = state.find_mut(&self.id) {
            node.content = data;
            node.last_modified = stamp;
        }
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_get_distinct_ids() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let first = tree.insert_dir(root.tree_id(), "dup");
        let second = tree.insert_dir(root.tree_id(), "dup");

        assert_eq!(first.as_str(), "primary:dup");
        assert_eq!(second.as_str(), "primary:dup~1");
        assert_eq!(tree.query_children(&root.children()).unwrap().len(), 2);
    }

    #[test]
    fn writes_commit_on_drop() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let id = tree.insert_file(root.tree_id(), "log.txt", b"one");
        let node = root.node_handle(id.clone());

        let mut out = tree.open_write(&node, WriteMode::WriteAppend).unwrap().unwrap();
        out.write_all(b"+two").unwrap();
        drop(out);
        assert_eq!(tree.content(&id).unwrap(), b"one+two");

        let mut out = tree.open_write(&node, WriteMode::WriteTruncate).unwrap().unwrap();
        out.write_all(b"x").unwrap();
        drop(out);
        assert_eq!(tree.content(&id).unwrap(), b"x");

        assert!(tree.open_write(&node, WriteMode::ReadOnly).unwrap().is_none());
    }

    #[test]
    fn deleting_a_container_removes_its_subtree() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let a = tree.insert_dir(root.tree_id(), "a");
        let b = tree.insert_dir(&a, "b");
        tree.insert_file(&b, "f", b"1");

        assert!(tree.delete_node(&root.node_handle(a)).unwrap());
        assert!(tree.is_empty());
        assert!(!tree.delete_node(&root.node()).unwrap());
    }

    #[test]
    fn move_refuses_own_subtree() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let a = tree.insert_dir(root.tree_id(), "a");
        let b = tree.insert_dir(&a, "b");

        let moved = tree.move_node(&root.node_handle(a.clone()), &root.node(), &root.node_handle(b)).unwrap();
        assert!(moved.is_none());

        tree.set_move_supported(false);
        assert!(!tree.supports_move());
        assert!(tree.move_node(&root.node_handle(a), &root.node(), &root.node()).is_err());
    }
}
