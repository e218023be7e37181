//! Segment-by-segment resolution of paths inside a document tree.
//!
//! The provider only offers "list children of X" and "create child of X", so reaching
//! `/a/b/c` means listing the root for `a`, listing `a` for `b`, and so on. Each intermediate
//! segment is handed to a directory policy that may descend, create the missing container, or
//! stop; the last segment is handed to a terminal policy that decides the outcome of the walk.
//!
//! Walks are not transactional: containers created before a failing step stay in the tree.

use log::{trace, warn};

use crate::codec::{DocumentId, ListingHandle, NodeHandle, TreeRoot};
use crate::provider::TreeProvider;
use crate::{path, FsError, FsResult};

/// Verdict of a directory policy for an intermediate segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirStep {
    Descend(ListingHandle),
    Stop,
}

/// One segment of a walk as seen by a policy.
#[derive(Clone, Copy, Debug)]
pub struct Step<'a> {
    pub name: &'a str,
    /// Normalized path up to and including this segment.
    pub path: &'a str,
    /// Identifier of the existing child with this name, if any.
    pub existing: Option<&'a DocumentId>,
    /// Listing handle of the parent container.
    pub parent: &'a ListingHandle,
}

pub struct TreeWalker<'a> {
    provider: &'a dyn TreeProvider,
    root: &'a TreeRoot,
}

impl<'a> TreeWalker<'a> {
    pub fn new(provider: &'a dyn TreeProvider, root: Option<&'a TreeRoot>) -> FsResult<Self> {
        let root = root.ok_or_else(|| FsError::RootNotInitialized("no root grant for tree walk".to_string()))?;
        Ok(Self { provider, root })
    }

    pub fn root(&self) -> &TreeRoot {
        self.root
    }

    /// Finds the child of `listing` named `name`.
    ///
    /// Names are not unique keys in a document tree. When several children share `name` the one
    /// with the lexicographically smallest identifier wins, independent of listing order.
    pub fn find_child(&self, listing: &ListingHandle, name: &str) -> FsResult<Option<DocumentId>> {
        let rows = self.provider.query_children(listing)?;
        let mut matches = rows.into_iter().filter(|row| row.display_name == name).map(|row| row.document_id);

        let Some(mut best) = matches.next() else {
            return Ok(None);
        };
        let mut duplicates = 0;
        for candidate in matches {
            duplicates += 1;
            if candidate < best {
                best = candidate;
            }
        }
        if duplicates > 0 {
            warn!("{} children named '{name}' under {listing}, using {best}", duplicates + 1);
        }

        Ok(Some(best))
    }

    /// Walks `path`, driving `directory_step` for every intermediate segment and returning the
    /// verdict of `terminal_step` for the last one. The root path is never walked and yields
    /// `Ok(false)`.
    pub fn walk<D, T>(&self, path: &str, mut directory_step: D, terminal_step: T) -> FsResult<bool>
    where
        D: FnMut(Step<'_>) -> FsResult<DirStep>,
        T: FnOnce(Step<'_>) -> FsResult<bool>,
    {
        let segments: Vec<&str> = path::segments(path).collect();
        let Some((&last, dirs)) = segments.split_last() else {
            return Ok(false);
        };

        let mut listing = self.root.children();
        let mut prefix = String::with_capacity(path.len());

        for &dir in dirs {
            prefix.push(path::SEPARATOR);
            prefix.push_str(dir);

            let existing = self.find_child(&listing, dir)?;
            trace!("walk {prefix}: existing = {existing:?}");

            let step = Step { name: dir, path: &prefix, existing: existing.as_ref(), parent: &listing };
            match directory_step(step)? {
                DirStep::Descend(next) => listing = next,
                DirStep::Stop => return Ok(false),
            }
        }

        prefix.push(path::SEPARATOR);
        prefix.push_str(last);

        let existing = self.find_child(&listing, last)?;
        trace!("walk {prefix} (terminal): existing = {existing:?}");

        terminal_step(Step { name: last, path: &prefix, existing: existing.as_ref(), parent: &listing })
    }

    /// Read-only resolution of `path`. Any missing segment or failed query yields `None`.
    pub fn resolve(&self, path: &str) -> Option<NodeHandle> {
        let mut listing = self.root.children();
        let mut found = self.root.tree_id().clone();

        for segment in path::segments(path) {
            match self.find_child(&listing, segment) {
                Ok(Some(id)) => {
                    listing = self.root.child_listing(&id);
                    found = id;
                }
                Ok(None) => return None,
                Err(e) => {
                    trace!("resolve {path} stopped at '{segment}': {e}");
                    return None;
                }
            }
        }

        Some(self.root.node_handle(found))
    }
}
