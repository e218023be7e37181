//! Collaborator contracts consumed by the tree backend.
//!
//! A [`TreeProvider`] is the content-provider-like service behind a granted document tree. It has
//! no path lookup: it can only list the children of a container, query a single node, and
//! create, delete, move, rename or stream nodes. Everything path-shaped is built on top of it by
//! [`crate::walker::TreeWalker`].

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::codec::{DocumentId, ListingHandle, NodeHandle, TreeRoot};
use crate::FsResult;

/// Mime type marking a node as a container.
pub const DIRECTORY_MIME: &str = "vnd.android.document/directory";
pub const ANY_MIME: &str = "*/*";

/// One row returned by a listing or node query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRow {
    pub document_id: DocumentId,
    pub display_name: String,
    pub mime_type: String,
    pub size: i64,
    pub last_modified: i64,
}

impl DocumentRow {
    pub fn is_container(&self) -> bool {
        self.mime_type == DIRECTORY_MIME
    }
}

/// Single metadata column of a [`DocumentRow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    DocumentId,
    DisplayName,
    MimeType,
    Size,
    LastModified,
}

impl Field {
    pub fn read(self, row: &DocumentRow) -> String {
        match self {
            Field::DocumentId => row.document_id.to_string(),
            Field::DisplayName => row.display_name.clone(),
            Field::MimeType => row.mime_type.clone(),
            Field::Size => row.size.to_string(),
            Field::LastModified => row.last_modified.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WriteMode {
    ReadOnly,
    #[default]
    WriteTruncate,
    WriteAppend,
    ReadWrite,
    ReadWriteTruncate,
}

impl WriteMode {
    /// Mode string understood by content providers.
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::ReadOnly => "r",
            WriteMode::WriteTruncate => "w",
            WriteMode::WriteAppend => "wa",
            WriteMode::ReadWrite => "rw",
            WriteMode::ReadWriteTruncate => "rwt",
        }
    }

    pub fn truncates(self) -> bool {
        matches!(self, WriteMode::WriteTruncate | WriteMode::ReadWriteTruncate)
    }

    pub fn appends(self) -> bool {
        matches!(self, WriteMode::WriteAppend)
    }

    pub fn writes(self) -> bool {
        !matches!(self, WriteMode::ReadOnly)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpaceInfo {
    pub free: u64,
    pub usable: u64,
    pub total: u64,
}

pub trait TreeProvider: Send + Sync {
    /// Lists the direct children of the container behind `listing`, in provider order.
    fn query_children(&self, listing: &ListingHandle) -> FsResult<Vec<DocumentRow>>;
    /// Queries one node; `Ok(None)` when it does not exist.
    fn query_node(&self, node: &NodeHandle) -> FsResult<Option<DocumentRow>>;
    /// Creates a child named `name`. Duplicate names are not rejected.
    fn create_child(&self, parent: &ListingHandle, mime_type: &str, name: &str) -> FsResult<Option<DocumentId>>;
    /// Deletes a node and, for containers, everything below it.
    fn delete_node(&self, node: &NodeHandle) -> FsResult<bool>;
    fn move_node(
        &self,
        node: &NodeHandle,
        from_parent: &NodeHandle,
        to_parent: &NodeHandle,
    ) -> FsResult<Option<NodeHandle>>;
    fn rename_node(&self, node: &NodeHandle, new_name: &str) -> FsResult<bool>;

    /// Whether [`TreeProvider::move_node`] is available on this host.
    fn supports_move(&self) -> bool {
        true
    }

    fn open_read(&self, node: &NodeHandle) -> FsResult<Option<Box<dyn Read + Send>>>;
    fn open_write(&self, node: &NodeHandle, mode: WriteMode) -> FsResult<Option<Box<dyn Write + Send>>>;

    fn space(&self, _root: &TreeRoot) -> Option<SpaceInfo> {
        None
    }
}

/// Maps volume ids (the prefix of a [`DocumentId`]) to mount paths. Only used to render
/// filesystem-style paths.
pub trait VolumeEnumerator: Send + Sync {
    fn list_volumes(&self) -> HashMap<String, String>;
}

impl VolumeEnumerator for HashMap<String, String> {
    fn list_volumes(&self) -> HashMap<String, String> {
        self.clone()
    }
}
