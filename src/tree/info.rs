use super::TreeFile;
use crate::codec::NodeHandle;
use crate::physical::LocalFile;
use crate::provider::{Field, DIRECTORY_MIME};
use crate::walker::TreeWalker;
use crate::{oracle, path};

impl TreeFile {
    /// Last path segment. The root has no segment and reports the provider's display name.
    pub fn name(&self) -> String {
        let path = self.path();
        if !path::is_root(&path) {
            return path::name(&path).to_string();
        }
        oracle::metadata(self.provider(), &self.root().node(), Field::DisplayName).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<String> {
        path::parent(&self.path())
    }

    pub fn parent_file(&self) -> Option<TreeFile> {
        self.parent().map(|parent| self.with_path(&parent))
    }

    /// Node of the parent container; `None` for the root or when the parent cannot be resolved.
    pub fn parent_node(&self) -> Option<NodeHandle> {
        let root = self.root();
        let parent = self.parent()?;
        if path::is_root(&parent) {
            return Some(root.node());
        }
        TreeWalker::new(self.provider(), Some(&root)).ok()?.resolve(&parent)
    }

    pub fn extension(&self) -> String {
        path::extension(&self.name()).to_string()
    }

    pub fn name_without_extension(&self) -> String {
        path::stem(&self.name()).to_string()
    }

    pub fn is_hidden(&self) -> bool {
        self.name().starts_with('.')
    }

    pub fn is_directory(&self) -> bool {
        self.current().is_some_and(|node| oracle::is_container(self.provider(), &node))
    }

    pub fn is_file(&self) -> bool {
        self.current().is_some_and(|node| {
            oracle::metadata(self.provider(), &node, Field::MimeType).is_some_and(|mime| mime != DIRECTORY_MIME)
        })
    }

    /// Size in bytes, `0` when unknown.
    pub fn length(&self) -> u64 {
        self.current().map_or(0, |node| oracle::numeric(self.provider(), &node, Field::Size).max(0) as u64)
    }

    /// Milliseconds since the epoch, `0` when unknown.
    pub fn last_modified(&self) -> i64 {
        self.current().map_or(0, |node| oracle::numeric(self.provider(), &node, Field::LastModified))
    }

    /// Path relative to the volume: the granted tree's location followed by this handle's path.
    pub fn storage_path(&self) -> String {
        let (root, path) = self.key();
        let relative = root.tree_id().relative().trim_matches(path::SEPARATOR);
        match (relative.is_empty(), path::is_root(&path)) {
            (true, _) => path,
            (false, true) => format!("/{relative}"),
            (false, false) => format!("/{relative}{path}"),
        }
    }

    /// Mount path of the volume holding the granted tree, empty when unknown.
    pub fn volume_path(&self) -> String {
        let root = self.root();
        self.session().volumes().remove(root.tree_id().volume()).unwrap_or_default()
    }

    /// Filesystem-style path for display: volume mount path followed by the storage path.
    pub fn canonical_path(&self) -> String {
        format!("{}{}", self.volume_path(), self.storage_path())
    }

    /// Canonical path of the granted root itself.
    pub fn root_path(&self) -> String {
        let root = self.root();
        let relative = root.tree_id().relative().trim_matches(path::SEPARATOR);
        if relative.is_empty() {
            self.volume_path()
        } else {
            format!("{}/{relative}", self.volume_path())
        }
    }

    /// The tree handle addressing `local` when that local path lies under [`Self::root_path`].
    pub fn inside_tree(&self, local: &LocalFile) -> Option<TreeFile> {
        if self.volume_path().is_empty() {
            return None;
        }
        path::relative_to(&self.root_path(), local.path()).map(|relative| self.with_path(relative))
    }

    pub fn parent_canonical(&self) -> String {
        let canonical = self.canonical_path();
        match canonical.rfind(path::SEPARATOR) {
            Some(0) | None => path::ROOT.to_string(),
            Some(idx) => canonical[..idx].to_string(),
        }
    }

    pub fn free_space(&self) -> u64 {
        self.provider().space(&self.root()).map_or(0, |space| space.free)
    }

    pub fn usable_space(&self) -> u64 {
        self.provider().space(&self.root()).map_or(0, |space| space.usable)
    }

    pub fn total_space(&self) -> u64 {
        self.provider().space(&self.root()).map_or(0, |space| space.total)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::session::Session;
    use crate::testing::MemoryTree;

    fn session(tree: &MemoryTree) -> Session {
        let volumes: HashMap<String, String> =
            [("1234-ABCD".to_string(), "/storage/1234-ABCD".to_string())].into_iter().collect();
        Session::builder(Arc::new(tree.clone())).volumes(Arc::new(volumes)).root(tree.root()).build().unwrap()
    }

    #[test]
    fn names_and_extensions() {
        let tree = MemoryTree::with_root("1234-ABCD", "Music");
        let file = session(&tree).tree_file("/live/.cover.tar.gz").unwrap();

        assert_eq!(file.name(), ".cover.tar.gz");
        assert_eq!(file.extension(), "gz");
        assert_eq!(file.name_without_extension(), ".cover.tar");
        assert!(file.is_hidden());
        assert_eq!(file.parent().as_deref(), Some("/live"));
        assert_eq!(file.parent_file().unwrap().path(), "/live");

        let root = session(&tree).tree_file("/").unwrap();
        assert_eq!(root.name(), "Music");
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn filesystem_style_paths() {
        let tree = MemoryTree::with_root("1234-ABCD", "Music");
        let session = session(&tree);
        let file = session.tree_file("/live/a.flac").unwrap();

        assert_eq!(file.storage_path(), "/Music/live/a.flac");
        assert_eq!(file.volume_path(), "/storage/1234-ABCD");
        assert_eq!(file.canonical_path(), "/storage/1234-ABCD/Music/live/a.flac");
        assert_eq!(file.root_path(), "/storage/1234-ABCD/Music");
        assert_eq!(file.parent_canonical(), "/storage/1234-ABCD/Music/live");

        let inside = file.inside_tree(&session.local_file("/storage/1234-ABCD/Music/old/b.flac")).unwrap();
        assert_eq!(inside.path(), "/old/b.flac");
        assert!(file.inside_tree(&session.local_file("/storage/1234-ABCD/Musical/b.flac")).is_none());

        let root = session.tree_file("/").unwrap();
        assert_eq!(root.storage_path(), "/Music");
        assert_eq!(root.canonical_path(), root.root_path());
    }

    #[test]
    fn unknown_volume_renders_without_mount() {
        let tree = MemoryTree::new();
        let file = session(&tree).tree_file("/a").unwrap();
        assert_eq!(file.volume_path(), "");
        assert_eq!(file.canonical_path(), "/a");
    }

    #[test]
    fn metadata_of_existing_file() {
        let tree = MemoryTree::new();
        let root = tree.root();
        tree.insert_file(root.tree_id(), "data.bin", &[0u8; 42]);
        let file = session(&tree).tree_file("/data.bin").unwrap();

        assert_eq!(file.length(), 42);
        assert!(file.last_modified() > 0);
        assert!(file.is_file());
        assert!(!file.is_directory());
        assert!(file.total_space() > 0);

        let missing = session(&tree).tree_file("/none").unwrap();
        assert_eq!(missing.length(), 0);
        assert!(!missing.is_file());
    }
}
