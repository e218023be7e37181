use log::{debug, warn};

use super::TreeFile;
use crate::codec::NodeHandle;
use crate::handle::PathHandle;
use crate::provider::Field;
use crate::walker::TreeWalker;
use crate::{copy, oracle, path, FsResult};

impl TreeFile {
    /// Moves this node to `dest`, which may live under another root.
    ///
    /// Fails without touching anything when `dest` is a file or a non-empty container. An empty
    /// container at `dest` is replaced. Missing parents of `dest` are created. Hosts without a
    /// native move get a copy followed by a delete, which is not atomic.
    pub fn rename_to(&self, dest: &TreeFile) -> bool {
        self.try_rename_to(dest).unwrap_or_else(|e| {
            warn!("moving {} to {} failed: {e}", self.path(), dest.path());
            false
        })
    }

    fn try_rename_to(&self, dest: &TreeFile) -> FsResult<bool> {
        let Some(node) = self.refresh() else {
            debug!("nothing to move at {}", self.path());
            return Ok(false);
        };
        if node.is_root() {
            return Ok(false);
        }

        let (root, old_path) = self.key();
        let (dest_root, dest_path) = dest.key();
        if root == dest_root && path::relative_to(&old_path, &dest_path).is_some() {
            debug!("cannot move {old_path} into itself at {dest_path}");
            return Ok(false);
        }

        // An empty container at `dest` is replaced, but only once the move is about to happen.
        let vacate = match dest.refresh() {
            Some(existing) if oracle::is_container(dest.provider(), &existing) && dest.is_empty() => true,
            Some(_) => {
                debug!("{dest_path} is occupied");
                return Ok(false);
            }
            None => false,
        };

        let Some(dest_parent) = dest.parent_file() else {
            return Ok(false);
        };
        if !dest_parent.mkdirs() {
            return Ok(false);
        }
        let Some(to_parent) = dest_parent.current() else {
            return Ok(false);
        };

        let provider = self.provider();
        if !provider.supports_move() || root != dest_root {
            if vacate && !dest.delete() {
                return Ok(false);
            }
            let moved = copy::move_by_copy(&PathHandle::Tree(self.clone()), &PathHandle::Tree(dest.clone()));
            if !matches!(moved, Ok(true)) {
                Self::restore(dest, vacate);
                return moved;
            }
            if let Some(resolved) = dest.refresh() {
                self.settle(&old_path, resolved, Some(dest_path));
            }
            return Ok(true);
        }

        let Some(from_parent) = self.parent_node() else {
            return Ok(false);
        };
        if vacate && !dest.delete() {
            return Ok(false);
        }
        let moved = match provider.move_node(&node, &from_parent, &to_parent) {
            Ok(Some(moved)) => moved,
            other => {
                Self::restore(dest, vacate);
                return other.map(|_| false);
            }
        };

        let new_name = path::name(&dest_path);
        if path::name(&old_path) != new_name {
            match provider.rename_node(&moved, new_name) {
                Ok(true) => {}
                Ok(false) => debug!("rename of moved {old_path} to {new_name} was refused"),
                Err(e) => debug!("rename of moved {old_path} to {new_name} failed: {e}"),
            }
        }

        // The rename is best effort; if it did not stick the node keeps its old name.
        let landed = if self.is_named(&moved, new_name) {
            dest_path
        } else {
            path::join(&dest_parent.path(), path::name(&old_path))
        };
        self.settle(&old_path, moved, Some(landed));
        Ok(true)
    }

    /// Puts back the empty container a failed move had cleared out of the way.
    fn restore(dest: &TreeFile, vacated: bool) {
        if !vacated {
            return;
        }
        if dest.exists() {
            dest.delete_recursively();
        }
        if !dest.mkdirs() {
            warn!("could not restore the directory at {}", dest.path());
        }
    }

    fn is_named(&self, node: &NodeHandle, name: &str) -> bool {
        oracle::metadata(self.provider(), node, Field::DisplayName).is_some_and(|current| current == name)
    }

    /// Renames in place, keeping the parent. Fails when a sibling already uses `new_name` or when
    /// the node does not carry `new_name` afterwards.
    pub fn rename_to_name(&self, new_name: &str) -> bool {
        if new_name.is_empty() || new_name.contains(path::SEPARATOR) {
            warn!("'{new_name}' is not a plain name");
            return false;
        }
        let Some(node) = self.refresh() else {
            return false;
        };
        if node.is_root() {
            return false;
        }

        let (root, old_path) = self.key();
        let taken = self.parent_listing().and_then(|listing| {
            TreeWalker::new(self.provider(), Some(&root))?.find_child(&listing, new_name)
        });
        match taken {
            Ok(Some(id)) if &id != node.document_id() => {
                debug!("{new_name} is already taken next to {old_path}");
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("could not check siblings of {old_path}: {e}");
                return false;
            }
        }

        match self.provider().rename_node(&node, new_name) {
            Ok(true) => {}
            Ok(false) => debug!("rename of {old_path} was refused"),
            Err(e) => debug!("rename of {old_path} failed: {e}"),
        }
        if !self.is_named(&node, new_name) {
            return false;
        }

        let parent = path::parent(&old_path).unwrap_or_else(|| path::ROOT.to_string());
        self.settle(&old_path, node, Some(path::join(&parent, new_name)));
        true
    }
}
