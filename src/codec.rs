//! Document identifiers and the handles used to address nodes of a document tree.
//!
//! A [`DocumentId`] is an opaque string of the form `<volume>:<relative/sub/path>`. Only the
//! volume prefix is ever interpreted; identifiers handed out by a provider round-trip untouched.
//! A [`TreeRoot`] is the granted root of a tree, a [`NodeHandle`] addresses one node under it and
//! a [`ListingHandle`] enumerates the direct children of a container.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{FsError, FsResult};

pub const SCHEME: &str = "content";
const VOLUME_DELIMITER: char = ':';

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Volume prefix, i.e. everything before the first `:`.
    pub fn volume(&self) -> &str {
        self.0.split_once(VOLUME_DELIMITER).map(|(volume, _)| volume).unwrap_or(&self.0)
    }

    /// Volume-relative suffix, empty when the identifier has none.
    pub fn relative(&self) -> &str {
        self.0.split_once(VOLUME_DELIMITER).map(|(_, rest)| rest).unwrap_or("")
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeRoot {
    authority: String,
    tree: DocumentId,
}

impl TreeRoot {
    pub fn new(authority: impl Into<String>, tree: impl Into<DocumentId>) -> Self {
        Self { authority: authority.into(), tree: tree.into() }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn tree_id(&self) -> &DocumentId {
        &self.tree
    }

    /// Handle of the root node itself.
    pub fn node(&self) -> NodeHandle {
        self.node_handle(self.tree.clone())
    }

    /// Listing handle enumerating the root's direct children.
    pub fn children(&self) -> ListingHandle {
        self.child_listing(&self.tree)
    }

    pub fn node_handle(&self, document: DocumentId) -> NodeHandle {
        NodeHandle { root: self.clone(), document }
    }

    pub fn child_listing(&self, parent: &DocumentId) -> ListingHandle {
        ListingHandle { root: self.clone(), parent: parent.clone() }
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    root: TreeRoot,
    document: DocumentId,
}

impl NodeHandle {
    pub fn root(&self) -> &TreeRoot {
        &self.root
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document
    }

    pub fn is_root(&self) -> bool {
        self.document == self.root.tree
    }

    pub fn children(&self) -> ListingHandle {
        self.root.child_listing(&self.document)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListingHandle {
    root: TreeRoot,
    parent: DocumentId,
}

impl ListingHandle {
    pub fn root(&self) -> &TreeRoot {
        &self.root
    }

    pub fn parent_id(&self) -> &DocumentId {
        &self.parent
    }

    pub fn parent_node(&self) -> NodeHandle {
        self.root.node_handle(self.parent.clone())
    }
}

pub fn child_listing_handle(root: &TreeRoot, node: &DocumentId) -> ListingHandle {
    root.child_listing(node)
}

pub fn node_handle(root: &TreeRoot, id: DocumentId) -> NodeHandle {
    root.node_handle(id)
}

pub fn identifier_of(handle: &NodeHandle) -> &DocumentId {
    handle.document_id()
}

impl fmt::Display for TreeRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}/tree/{}", self.authority, encode(self.tree.as_str()))
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/document/{}", self.root, encode(self.document.as_str()))
    }
}

impl fmt::Display for ListingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/document/{}/children", self.root, encode(self.parent.as_str()))
    }
}

impl FromStr for TreeRoot {
    type Err = FsError;

    fn from_str(s: &str) -> FsResult<Self> {
        let parts = split_handle(s)?;
        match parts.as_slice() {
            [authority, "tree", tree] => Ok(TreeRoot::new(*authority, decode(tree)?)),
            _ => Err(FsError::Generic(format!("'{s}' is not a tree root"))),
        }
    }
}

impl FromStr for NodeHandle {
    type Err = FsError;

    fn from_str(s: &str) -> FsResult<Self> {
        let parts = split_handle(s)?;
        match parts.as_slice() {
            [authority, "tree", tree, "document", document] => {
                let root = TreeRoot::new(*authority, decode(tree)?);
                Ok(root.node_handle(DocumentId::new(decode(document)?)))
            }
            _ => Err(FsError::Generic(format!("'{s}' is not a document handle"))),
        }
    }
}

fn split_handle(s: &str) -> FsResult<Vec<&str>> {
    let rest = s
        .strip_prefix(SCHEME)
        .and_then(|rest| rest.strip_prefix("://"))
        .ok_or_else(|| FsError::Generic(format!("'{s}' does not use the {SCHEME} scheme")))?;
    Ok(rest.split('/').collect())
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

fn encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if is_unreserved(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn decode(encoded: &str) -> FsResult<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| FsError::Generic(format!("bad escape in '{encoded}'")))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| FsError::Generic(format!("'{encoded}' is not utf-8")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> TreeRoot {
        TreeRoot::new("com.example.documents", "primary:Documents")
    }

    #[test]
    fn identifier_round_trips_through_handle() {
        let ids = ["primary:Documents/a b/c.txt", "1234-ABCD:", "opaque#42", "x:%41/ü"];
        for id in ids {
            let id = DocumentId::new(id);
            let handle = node_handle(&root(), id.clone());
            assert_eq!(identifier_of(&handle), &id);

            let parsed: NodeHandle = handle.to_string().parse().unwrap();
            assert_eq!(parsed, handle);
        }
    }

    #[test]
    fn volume_prefix_split() {
        let id = DocumentId::new("1234-ABCD:Music/live");
        assert_eq!(id.volume(), "1234-ABCD");
        assert_eq!(id.relative(), "Music/live");

        let bare = DocumentId::new("opaque");
        assert_eq!(bare.volume(), "opaque");
        assert_eq!(bare.relative(), "");
    }

    #[test]
    fn listing_handle_addresses_parent() {
        let listing = child_listing_handle(&root(), &DocumentId::new("primary:Documents/a"));
        assert_eq!(listing.parent_node().document_id().as_str(), "primary:Documents/a");
        assert!(listing.to_string().ends_with("/children"));
        assert!(root().node().is_root());
    }

    #[test]
    fn tree_root_parses() {
        let parsed: TreeRoot = root().to_string().parse().unwrap();
        assert_eq!(parsed, root());
        assert!("file:///tmp".parse::<TreeRoot>().is_err());
    }
}
