//! Traditional path-based backend over `std::fs`.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use log::{debug, warn};

use crate::config::DEFAULT_BUFFER_SIZE;
use crate::provider::WriteMode;
use crate::tree::CreateOptions;
use crate::{path, DirectoryEntry, FsError, FsResult};

/// A normalized local path. Equality and hashing look at the path only.
#[derive(Clone, Debug)]
pub struct LocalFile {
    path: String,
    buffer_size: usize,
}

impl PartialEq for LocalFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for LocalFile {}

impl Hash for LocalFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl LocalFile {
    pub fn new(raw_path: &str) -> Self {
        Self::with_buffer_size(raw_path, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(raw_path: &str, buffer_size: usize) -> Self {
        Self { path: path::normalize(raw_path), buffer_size }
    }

    /// Copy buffer size for streams opened from this handle and the handles derived from it.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }

    pub fn with_path(&self, raw_path: &str) -> LocalFile {
        LocalFile::with_buffer_size(raw_path, self.buffer_size)
    }

    pub fn exists(&self) -> bool {
        self.as_path().exists()
    }

    pub fn is_directory(&self) -> bool {
        self.as_path().is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.as_path().is_file()
    }

    pub fn name(&self) -> String {
        path::name(&self.path).to_string()
    }

    pub fn parent(&self) -> Option<String> {
        path::parent(&self.path)
    }

    pub fn parent_file(&self) -> Option<LocalFile> {
        self.parent().map(|parent| self.with_path(&parent))
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

    pub fn length(&self) -> u64 {
        fs::metadata(&self.path).map(|meta| meta.len()).unwrap_or(0)
    }

    /// Milliseconds since the epoch, `0` when unknown.
    pub fn last_modified(&self) -> i64 {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |elapsed| elapsed.as_millis() as i64)
    }

    /// Symlink-free absolute path, or the stored path when it cannot be resolved.
    pub fn canonical_path(&self) -> String {
        fs::canonicalize(&self.path)
            .ok()
            .and_then(|resolved| resolved.to_str().map(str::to_string))
            .unwrap_or_else(|| self.path.clone())
    }

    pub fn storage_path(&self) -> String {
        self.path.clone()
    }

    pub fn parent_canonical(&self) -> String {
        let canonical = self.canonical_path();
        match canonical.rfind(path::SEPARATOR) {
            Some(0) | None => path::ROOT.to_string(),
            Some(idx) => canonical[..idx].to_string(),
        }
    }

    pub fn create_new_file(&self) -> FsResult<bool> {
        self.create_new_file_with(&CreateOptions::default())
    }

    /// Creates an empty file. `mime_type` has no meaning here and is ignored.
    pub fn create_new_file_with(&self, options: &CreateOptions) -> FsResult<bool> {
        if let Some(parent) = self.as_path().parent() {
            if options.make_directories {
                fs::create_dir_all(parent)?;
            } else if !parent.is_dir() {
                return Err(FsError::HierarchyBroken(format!("{} does not exist", parent.display())));
            }
        }

        if options.overwrite && self.exists() && !self.delete() {
            return Err(FsError::AlreadyExists(self.path.clone(), "could not delete the existing file".into()));
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn mkdir(&self) -> bool {
        fs::create_dir(&self.path).is_ok()
    }

    /// `true` when the path ends up a directory, including when it already was one.
    pub fn mkdirs(&self) -> bool {
        self.is_directory() || fs::create_dir_all(&self.path).is_ok()
    }

    /// Deletes a file or an empty directory.
    pub fn delete(&self) -> bool {
        let removed = if self.is_directory() { fs::remove_dir(&self.path) } else { fs::remove_file(&self.path) };
        removed.map_err(|e| debug!("could not delete {}: {e}", self.path)).is_ok()
    }

    pub fn delete_recursively(&self) -> bool {
        let removed = if self.is_directory() { fs::remove_dir_all(&self.path) } else { fs::remove_file(&self.path) };
        removed.map_err(|e| debug!("could not delete {}: {e}", self.path)).is_ok()
    }

    /// Moves to `dest` under the same rules as the tree backend: a file or a non-empty directory
    /// at `dest` blocks the move, an empty directory is replaced, and missing parents are
    /// created. On success this handle follows the file.
    pub fn rename_to(&mut self, dest: &LocalFile) -> bool {
        if !self.exists() {
            return false;
        }
        if dest.exists() && (!dest.is_directory() || !dest.is_empty() || !dest.delete()) {
            debug!("{} is occupied", dest.path);
            return false;
        }
        if let Some(parent) = dest.parent_file() {
            if !parent.mkdirs() {
                return false;
            }
        }

        match fs::rename(&self.path, &dest.path) {
            Ok(()) => {
                self.path = dest.path.clone();
                true
            }
            Err(e) => {
                warn!("moving {} to {} failed: {e}", self.path, dest.path);
                false
            }
        }
    }

    pub fn rename_to_name(&mut self, new_name: &str) -> bool {
        if new_name.is_empty() || new_name.contains(path::SEPARATOR) {
            return false;
        }
        let Some(parent) = self.parent() else {
            return false;
        };

        let renamed = path::join(&parent, new_name);
        match fs::rename(&self.path, &renamed) {
            Ok(()) => {
                self.path = renamed;
                true
            }
            Err(e) => {
                debug!("renaming {} failed: {e}", self.path);
                false
            }
        }
    }

    /// Children sorted by name; `None` when this is not a readable directory.
    fn children(&self) -> Option<Vec<(String, fs::Metadata)>> {
        let read = match fs::read_dir(&self.path) {
            Ok(read) => read,
            Err(e) => {
                debug!("could not list {}: {e}", self.path);
                return None;
            }
        };

        let mut children: Vec<_> = read.filter_map(|item| self.listed(item)).collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Some(children)
    }

    /// One entry of a listing. Entries that vanish or cannot be read are skipped, not fatal.
    fn listed(&self, item: io::Result<fs::DirEntry>) -> Option<(String, fs::Metadata)> {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                debug!("skipping unreadable entry in {}: {e}", self.path);
                return None;
            }
        };
        let Ok(name) = item.file_name().into_string() else {
            warn!("skipping non-utf8 entry in {}", self.path);
            return None;
        };
        match item.metadata() {
            Ok(meta) => Some((name, meta)),
            Err(e) => {
                debug!("skipping {name} in {}: {e}", self.path);
                None
            }
        }
    }

    fn child(&self, name: &str) -> LocalFile {
        self.with_path(&path::join(&self.path, name))
    }

    pub fn list_entries(&self) -> Option<Vec<DirectoryEntry>> {
        let children = self.children()?;
        Some(
            children
                .into_iter()
                .map(|(name, meta)| DirectoryEntry {
                    name,
                    is_container: meta.is_dir(),
                    size: meta.len(),
                    last_modified: meta
                        .modified()
                        .ok()
                        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                        .map_or(0, |elapsed| elapsed.as_millis() as i64),
                })
                .collect(),
        )
    }

    pub fn list(&self) -> Option<Vec<String>> {
        Some(self.children()?.into_iter().map(|(name, _)| name).collect())
    }

    pub fn list_filtered<F>(&self, mut filter: F) -> Option<Vec<String>>
    where
        F: FnMut(&LocalFile) -> bool,
    {
        Some(self.children()?.into_iter().map(|(name, _)| name).filter(|name| filter(&self.child(name))).collect())
    }

    pub fn list_by_name<F>(&self, mut filter: F) -> Option<Vec<String>>
    where
        F: FnMut(&LocalFile, &str) -> bool,
    {
        Some(self.children()?.into_iter().map(|(name, _)| name).filter(|name| filter(self, name.as_str())).collect())
    }

    pub fn list_files(&self) -> Option<Vec<LocalFile>> {
        self.list_files_filtered(|_| true)
    }

    pub fn list_files_filtered<F>(&self, mut filter: F) -> Option<Vec<LocalFile>>
    where
        F: FnMut(&LocalFile) -> bool,
    {
        Some(self.children()?.into_iter().map(|(name, _)| self.child(&name)).filter(|child| filter(child)).collect())
    }

    pub fn list_files_by_name<F>(&self, mut filter: F) -> Option<Vec<LocalFile>>
    where
        F: FnMut(&LocalFile, &str) -> bool,
    {
        Some(
            self.children()?
                .into_iter()
                .filter(|(name, _)| filter(self, name.as_str()))
                .map(|(name, _)| self.child(&name))
                .collect(),
        )
    }

    /// `true` only for a directory without children.
    pub fn is_empty(&self) -> bool {
        fs::read_dir(&self.path).is_ok_and(|mut read| read.next().is_none())
    }

    pub fn open_read(&self) -> FsResult<Box<dyn Read + Send>> {
        if self.is_directory() {
            return Err(FsError::NoStream(self.path.clone()));
        }
        match fs::File::open(&self.path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FsError::NotFound(self.path.clone(), "cannot read a missing file".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn open_write(&self, mode: WriteMode) -> FsResult<Box<dyn Write + Send>> {
        if !self.exists() {
            return Err(FsError::NotFound(self.path.clone(), "cannot write a missing file".into()));
        }
        if !mode.writes() || self.is_directory() {
            return Err(FsError::NoStream(self.path.clone()));
        }

        let file = OpenOptions::new()
            .read(matches!(mode, WriteMode::ReadWrite | WriteMode::ReadWriteTruncate))
            .write(true)
            .append(mode.appends())
            .truncate(mode.truncates())
            .open(&self.path)?;
        Ok(Box::new(file))
    }
}

impl fmt::Display for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(dir: &tempfile::TempDir, rel: &str) -> LocalFile {
        LocalFile::new(&format!("{}/{rel}", dir.path().display()))
    }

    #[test]
    fn create_and_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = local(&dir, "a/b/c.txt");

        assert!(matches!(file.create_new_file(), Err(FsError::HierarchyBroken(_))));
        assert!(file.create_new_file_with(&CreateOptions::default().make_directories(true)).unwrap());
        assert!(!file.create_new_file().unwrap());

        file.open_write(WriteMode::WriteTruncate).unwrap().write_all(b"hello").unwrap();
        file.open_write(WriteMode::WriteAppend).unwrap().write_all(b" world").unwrap();
        assert_eq!(file.length(), 11);

        let mut text = String::new();
        file.open_read().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello world");
        assert!(file.last_modified() > 0);
    }

    #[test]
    fn directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = local(&dir, "x/y");

        assert!(!nested.mkdir());
        assert!(nested.mkdirs());
        assert!(nested.mkdirs());
        assert!(nested.is_empty());
        assert!(!local(&dir, "x").delete());
        assert!(local(&dir, "x").delete_recursively());
        assert!(!nested.exists());
    }

    #[test]
    fn listing_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "c.md"] {
            local(&dir, name).create_new_file().unwrap();
        }
        local(&dir, "sub").mkdir();

        let root = local(&dir, "");
        assert_eq!(root.list().unwrap(), vec!["a.txt", "b.txt", "c.md", "sub"]);
        assert_eq!(root.list_by_name(|_, name| name.ends_with(".txt")).unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(root.list_files_filtered(LocalFile::is_directory).unwrap(), vec![local(&dir, "sub")]);
        assert!(root.list_entries().unwrap()[3].is_container);
        assert!(local(&dir, "a.txt").list().is_none());
    }

    #[test]
    fn rename_follows_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = local(&dir, "old.txt");
        file.create_new_file().unwrap();

        assert!(file.rename_to_name("new.txt"));
        assert_eq!(file.name(), "new.txt");

        let dest = local(&dir, "moved/deeper/final.txt");
        assert!(file.rename_to(&dest));
        assert_eq!(file, dest);
        assert!(dest.exists());

        let mut other = local(&dir, "other.txt");
        other.create_new_file().unwrap();
        assert!(!other.rename_to(&dest));
    }

    #[test]
    fn unreadable_entries_do_not_hide_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        local(&dir, "kept.txt").create_new_file().unwrap();
        let root = local(&dir, "");

        assert!(root.listed(Err(io::Error::new(ErrorKind::NotFound, "vanished"))).is_none());
        let good = fs::read_dir(dir.path()).unwrap().next().unwrap();
        assert_eq!(root.listed(good).unwrap().0, "kept.txt");
        assert_eq!(root.list().unwrap(), vec!["kept.txt"]);
    }

    #[test]
    fn derived_handles_keep_the_buffer_size() {
        let file = LocalFile::with_buffer_size("/tmp/a/b", 4096);
        assert_eq!(file.buffer_size(), 4096);
        assert_eq!(file.parent_file().unwrap().buffer_size(), 4096);
        assert_eq!(file.with_path("/tmp/c").buffer_size(), 4096);
        assert_eq!(file, LocalFile::new("/tmp/a/b"));
    }
}
