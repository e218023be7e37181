//! A read-only [`TreeProvider`] over a [`ZipArchive`] from the [`zip`] crate.
//!
//! Entry names become paths below the archive root. Directories that the archive only implies
//! through its entry names are synthesized. Every mutating call is refused.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::UNIX_EPOCH;

use log::{debug, trace};
use zip::ZipArchive;

use crate::codec::{DocumentId, ListingHandle, NodeHandle, TreeRoot};
use crate::provider::{DocumentRow, TreeProvider, WriteMode, DIRECTORY_MIME};
use crate::{path, write_lock, FsError, FsResult};

pub const AUTHORITY: &str = "zip";
const VOLUME: &str = "archive";
const FILE_MIME: &str = "application/octet-stream";

#[derive(Clone, Debug)]
struct Entry {
    index: Option<usize>,
    size: u64,
}

impl Entry {
    fn is_dir(&self) -> bool {
        self.index.is_none()
    }
}

pub struct ZipTree {
    archive: Arc<RwLock<ZipArchive<fs::File>>>,
    /// Keyed by the path relative to the archive root, without leading or trailing separators.
    entries: BTreeMap<String, Entry>,
    modified: i64,
}

impl ZipTree {
    pub fn open(file: impl AsRef<Path>) -> FsResult<Self> {
        let file = file.as_ref();
        let modified = fs::metadata(file)?
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |elapsed| elapsed.as_millis() as i64);

        let mut archive = ZipArchive::new(fs::File::open(file)?)?;
        let mut entries = BTreeMap::new();
        entries.insert(String::new(), Entry { index: None, size: 0 });

        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            let relative = path::normalize(entry.name()).trim_start_matches(path::SEPARATOR).to_string();
            if relative.is_empty() {
                continue;
            }

            let mut parent = path::parent(&format!("/{relative}"));
            while let Some(dir) = parent.filter(|dir| !path::is_root(dir)) {
                let key = dir.trim_start_matches(path::SEPARATOR).to_string();
                entries.entry(key).or_insert(Entry { index: None, size: 0 });
                parent = path::parent(&dir);
            }

            let index = (!entry.is_dir()).then_some(i);
            entries.insert(relative, Entry { index, size: entry.size() });
        }
        debug!("opened {} with {} entries", file.display(), entries.len() - 1);

        Ok(Self { archive: Arc::new(RwLock::new(archive)), entries, modified })
    }

    pub fn root(&self) -> TreeRoot {
        TreeRoot::new(AUTHORITY, format!("{VOLUME}:"))
    }

    fn key<'a>(&self, id: &'a DocumentId) -> Option<&'a str> {
        (id.volume() == VOLUME).then(|| id.relative())
    }

    fn lookup(&self, id: &DocumentId) -> Option<(&str, &Entry)> {
        let key = self.key(id)?;
        self.entries.get_key_value(key).map(|(key, entry)| (key.as_str(), entry))
    }

    fn row(&self, key: &str, entry: &Entry) -> DocumentRow {
        let name = match key.rsplit_once(path::SEPARATOR) {
            Some((_, name)) => name,
            None if key.is_empty() => VOLUME,
            None => key,
        };
        DocumentRow {
            document_id: DocumentId::new(format!("{VOLUME}:{key}")),
            display_name: name.to_string(),
            mime_type: if entry.is_dir() { DIRECTORY_MIME } else { FILE_MIME }.to_string(),
            size: entry.size as i64,
            last_modified: self.modified,
        }
    }
}

impl TreeProvider for ZipTree {
    fn query_children(&self, listing: &ListingHandle) -> FsResult<Vec<DocumentRow>> {
        let parent = listing.parent_id();
        let Some((key, entry)) = self.lookup(parent) else {
            return Err(FsError::NotFound(parent.to_string(), "no such archive entry".to_string()));
        };
        if !entry.is_dir() {
            return Err(FsError::ImproperType(format!("{parent} is not a directory")));
        }

        let rows = self
            .entries
            .iter()
            .filter(|(child, _)| !child.is_empty())
            .filter(|(child, _)| match child.rsplit_once(path::SEPARATOR) {
                Some((dir, _)) => dir == key,
                None => key.is_empty(),
            })
            .map(|(child, entry)| self.row(child, entry))
            .collect();
        Ok(rows)
    }

    fn query_node(&self, node: &NodeHandle) -> FsResult<Option<DocumentRow>> {
        Ok(self.lookup(node.document_id()).map(|(key, entry)| self.row(key, entry)))
    }

    fn create_child(&self, parent: &ListingHandle, _mime_type: &str, name: &str) -> FsResult<Option<DocumentId>> {
        trace!("refusing to create {name} under {parent}");
        Ok(None)
    }

    fn delete_node(&self, _node: &NodeHandle) -> FsResult<bool> {
        Ok(false)
    }

    fn move_node(&self, _node: &NodeHandle, _from: &NodeHandle, _to: &NodeHandle) -> FsResult<Option<NodeHandle>> {
        Ok(None)
    }

    fn rename_node(&self, _node: &NodeHandle, _new_name: &str) -> FsResult<bool> {
        Ok(false)
    }

    fn supports_move(&self) -> bool {
        false
    }

    fn open_read(&self, node: &NodeHandle) -> FsResult<Option<Box<dyn Read + Send>>> {
        let Some(index) = self.lookup(node.document_id()).and_then(|(_, entry)| entry.index) else {
            return Ok(None);
        };

        // One decompression pass per open; readers never touch the archive again.
        let mut archive = write_lock(&self.archive);
        let mut entry = archive.by_index(index)?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        trace!("decompressed {} bytes of {}", content.len(), node.document_id());
        Ok(Some(Box::new(Cursor::new(content))))
    }

    fn open_write(&self, _node: &NodeHandle, _mode: WriteMode) -> FsResult<Option<Box<dyn Write + Send>>> {
        Ok(None)
    }
}
