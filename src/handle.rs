//! One handle type over both backends.

use std::fmt;
use std::io::{Read, Write};

use log::debug;

use crate::copy::{self, OnErrorAction};
use crate::physical::LocalFile;
use crate::provider::WriteMode;
use crate::tree::{CreateOptions, TreeFile};
use crate::walk::{TreeWalk, WalkDirection};
use crate::{DirectoryEntry, FsError, FsResult};

#[derive(Clone, Debug)]
pub enum PathHandle {
    Tree(TreeFile),
    Local(LocalFile),
}

impl From<TreeFile> for PathHandle {
    fn from(file: TreeFile) -> Self {
        PathHandle::Tree(file)
    }
}

impl From<LocalFile> for PathHandle {
    fn from(file: LocalFile) -> Self {
        PathHandle::Local(file)
    }
}

impl PathHandle {
    pub fn is_traditional(&self) -> bool {
        matches!(self, PathHandle::Local(_))
    }

    pub fn as_tree(&self) -> Option<&TreeFile> {
        match self {
            PathHandle::Tree(file) => Some(file),
            PathHandle::Local(_) => None,
        }
    }

    pub fn as_local(&self) -> Option<&LocalFile> {
        match self {
            PathHandle::Tree(_) => None,
            PathHandle::Local(file) => Some(file),
        }
    }

    pub fn path(&self) -> String {
        match self {
            PathHandle::Tree(file) => file.path(),
            PathHandle::Local(file) => file.path().to_string(),
        }
    }

    /// Another handle of the same kind (and root) at `raw_path`.
    pub fn with_path(&self, raw_path: &str) -> PathHandle {
        match self {
            PathHandle::Tree(file) => PathHandle::Tree(file.with_path(raw_path)),
            PathHandle::Local(file) => PathHandle::Local(file.with_path(raw_path)),
        }
    }

    /// Re-resolves a tree handle; local handles have nothing to resolve.
    pub fn refresh(&self) {
        if let PathHandle::Tree(file) = self {
            file.refresh();
        }
    }

    pub fn buffer_size(&self) -> usize {
        match self {
            PathHandle::Tree(file) => file.session().config().buffer_size,
            PathHandle::Local(file) => file.buffer_size(),
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.exists(),
            PathHandle::Local(file) => file.exists(),
        }
    }

    pub fn is_directory(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.is_directory(),
            PathHandle::Local(file) => file.is_directory(),
        }
    }

    pub fn is_file(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.is_file(),
            PathHandle::Local(file) => file.is_file(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            PathHandle::Tree(file) => file.name(),
            PathHandle::Local(file) => file.name(),
        }
    }

    pub fn parent(&self) -> Option<String> {
        match self {
            PathHandle::Tree(file) => file.parent(),
            PathHandle::Local(file) => file.parent(),
        }
    }

    pub fn parent_file(&self) -> Option<PathHandle> {
        match self {
            PathHandle::Tree(file) => file.parent_file().map(PathHandle::Tree),
            PathHandle::Local(file) => file.parent_file().map(PathHandle::Local),
        }
    }

    pub fn extension(&self) -> String {
        match self {
            PathHandle::Tree(file) => file.extension(),
            PathHandle::Local(file) => file.extension(),
        }
    }

    pub fn name_without_extension(&self) -> String {
        match self {
            PathHandle::Tree(file) => file.name_without_extension(),
            PathHandle::Local(file) => file.name_without_extension(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.is_hidden(),
            PathHandle::Local(file) => file.is_hidden(),
        }
    }

    pub fn length(&self) -> u64 {
        match self {
            PathHandle::Tree(file) => file.length(),
            PathHandle::Local(file) => file.length(),
        }
    }

    pub fn last_modified(&self) -> i64 {
        match self {
            PathHandle::Tree(file) => file.last_modified(),
            PathHandle::Local(file) => file.last_modified(),
        }
    }

    pub fn canonical_path(&self) -> String {
        match self {
            PathHandle::Tree(file) => file.canonical_path(),
            PathHandle::Local(file) => file.canonical_path(),
        }
    }

    pub fn storage_path(&self) -> String {
        match self {
            PathHandle::Tree(file) => file.storage_path(),
            PathHandle::Local(file) => file.storage_path(),
        }
    }

    pub fn parent_canonical(&self) -> String {
        match self {
            PathHandle::Tree(file) => file.parent_canonical(),
            PathHandle::Local(file) => file.parent_canonical(),
        }
    }

    pub fn create_new_file(&self) -> FsResult<bool> {
        self.create_new_file_with(&CreateOptions::default())
    }

    pub fn create_new_file_with(&self, options: &CreateOptions) -> FsResult<bool> {
        match self {
            PathHandle::Tree(file) => file.create_new_file_with(options),
            PathHandle::Local(file) => file.create_new_file_with(options),
        }
    }

    pub fn mkdir(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.mkdir(),
            PathHandle::Local(file) => file.mkdir(),
        }
    }

    pub fn mkdirs(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.mkdirs(),
            PathHandle::Local(file) => file.mkdirs(),
        }
    }

    pub fn delete(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.delete(),
            PathHandle::Local(file) => file.delete(),
        }
    }

    pub fn delete_recursively(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.delete_recursively(),
            PathHandle::Local(file) => file.delete_recursively(),
        }
    }

    /// Moves this node to `dest`. Moves between the two backends go through a copy and a delete,
    /// except a tree node whose local target lies inside the granted tree's own mount, which is
    /// moved within the tree.
    pub fn rename_to(&mut self, dest: &PathHandle) -> bool {
        match self {
            PathHandle::Tree(file) => match dest {
                PathHandle::Tree(target) => return file.rename_to(target),
                PathHandle::Local(target) => {
                    if let Some(inside) = file.inside_tree(target) {
                        debug!("{} lies inside the granted tree, moving within it", target.path());
                        return file.rename_to(&inside);
                    }
                }
            },
            PathHandle::Local(file) => {
                if let PathHandle::Local(target) = dest {
                    return file.rename_to(target);
                }
            }
        }
        self.move_across(dest)
    }

    fn move_across(&mut self, dest: &PathHandle) -> bool {
        dest.refresh();
        if dest.exists() && !(dest.is_directory() && dest.is_empty() && dest.delete()) {
            debug!("{} is occupied", dest.path());
            return false;
        }

        match copy::move_by_copy(self, dest) {
            Ok(true) => {
                *self = dest.clone();
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!("moving {} to {} failed: {e}", self.path(), dest.path());
                false
            }
        }
    }

    pub fn rename_to_name(&mut self, new_name: &str) -> bool {
        match self {
            PathHandle::Tree(file) => file.rename_to_name(new_name),
            PathHandle::Local(file) => file.rename_to_name(new_name),
        }
    }

    pub fn list(&self) -> Option<Vec<String>> {
        match self {
            PathHandle::Tree(file) => file.list(),
            PathHandle::Local(file) => file.list(),
        }
    }

    pub fn list_entries(&self) -> Option<Vec<DirectoryEntry>> {
        match self {
            PathHandle::Tree(file) => file.list_entries(),
            PathHandle::Local(file) => file.list_entries(),
        }
    }

    pub fn list_files(&self) -> Option<Vec<PathHandle>> {
        match self {
            PathHandle::Tree(file) => file.list_files().map(|files| files.into_iter().map(PathHandle::Tree).collect()),
            PathHandle::Local(file) => file.list_files().map(|files| files.into_iter().map(PathHandle::Local).collect()),
        }
    }

    pub fn list_files_filtered<F>(&self, mut filter: F) -> Option<Vec<PathHandle>>
    where
        F: FnMut(&PathHandle) -> bool,
    {
        Some(self.list_files()?.into_iter().filter(|child| filter(child)).collect())
    }

    pub fn list_by_name<F>(&self, mut filter: F) -> Option<Vec<String>>
    where
        F: FnMut(&PathHandle, &str) -> bool,
    {
        Some(self.list()?.into_iter().filter(|name| filter(self, name.as_str())).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PathHandle::Tree(file) => file.is_empty(),
            PathHandle::Local(file) => file.is_empty(),
        }
    }

    pub fn open_read(&self) -> FsResult<Box<dyn Read + Send>> {
        match self {
            PathHandle::Tree(file) => file.open_read(),
            PathHandle::Local(file) => file.open_read(),
        }
    }

    pub fn open_write(&self, mode: WriteMode) -> FsResult<Box<dyn Write + Send>> {
        match self {
            PathHandle::Tree(file) => file.open_write(mode),
            PathHandle::Local(file) => file.open_write(mode),
        }
    }

    pub fn read_to_vec(&self) -> FsResult<Vec<u8>> {
        let mut content = Vec::new();
        self.open_read()?.read_to_end(&mut content)?;
        Ok(content)
    }

    pub fn write_all(&self, content: &[u8]) -> FsResult {
        let mut out = self.open_write(WriteMode::WriteTruncate)?;
        out.write_all(content)?;
        out.flush()?;
        Ok(())
    }

    /// Single-node copy; see [`copy::copy_to`].
    pub fn copy_to(&self, target: &PathHandle, overwrite: bool) -> FsResult<PathHandle> {
        copy::copy_to(self, target, overwrite, self.buffer_size())
    }

    /// Whole-tree copy; see [`copy::copy_recursively`].
    pub fn copy_recursively(
        &self,
        target: &PathHandle,
        overwrite: bool,
        on_error: Option<&mut dyn FnMut(&PathHandle, &FsError) -> OnErrorAction>,
    ) -> FsResult<bool> {
        copy::copy_recursively(self, target, overwrite, on_error)
    }

    pub fn walk<'a>(&self, direction: WalkDirection) -> TreeWalk<'a> {
        TreeWalk::new(self.clone(), direction)
    }

    pub fn walk_top_down<'a>(&self) -> TreeWalk<'a> {
        self.walk(WalkDirection::TopDown)
    }

    pub fn walk_bottom_up<'a>(&self) -> TreeWalk<'a> {
        self.walk(WalkDirection::BottomUp)
    }
}

impl fmt::Display for PathHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathHandle::Tree(file) => fmt::Display::fmt(file, f),
            PathHandle::Local(file) => fmt::Display::fmt(file, f),
        }
    }
}
