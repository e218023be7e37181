//! Existence and metadata queries against a single node.
//!
//! Every query failure is swallowed here: a transient provider error reads as "absent". Callers
//! that must tell the two apart query the provider directly.

use log::debug;

use crate::codec::NodeHandle;
use crate::provider::{DocumentRow, Field, TreeProvider, DIRECTORY_MIME};

fn row(provider: &dyn TreeProvider, node: &NodeHandle) -> Option<DocumentRow> {
    match provider.query_node(node) {
        Ok(row) => row,
        Err(e) => {
            debug!("query for {node} failed, treating as absent: {e}");
            None
        }
    }
}

pub fn exists(provider: &dyn TreeProvider, node: &NodeHandle) -> bool {
    row(provider, node).is_some()
}

pub fn is_container(provider: &dyn TreeProvider, node: &NodeHandle) -> bool {
    exists(provider, node) && metadata(provider, node, Field::MimeType).is_some_and(|mime| mime == DIRECTORY_MIME)
}

pub fn metadata(provider: &dyn TreeProvider, node: &NodeHandle, field: Field) -> Option<String> {
    row(provider, node).map(|row| field.read(&row))
}

/// Numeric metadata, `0` when absent or unparsable.
pub fn numeric(provider: &dyn TreeProvider, node: &NodeHandle, field: Field) -> i64 {
    metadata(provider, node, field).and_then(|value| value.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTree;

    #[test]
    fn query_failure_reads_as_absent() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let docs = tree.insert_dir(root.tree_id(), "docs");
        let node = root.node_handle(docs);

        assert!(exists(&tree, &node));
        assert!(is_container(&tree, &node));

        tree.set_failing(true);
        assert!(!exists(&tree, &node));
        assert!(!is_container(&tree, &node));
        assert_eq!(metadata(&tree, &node, Field::DisplayName), None);
    }

    #[test]
    fn file_metadata() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let id = tree.insert_file(root.tree_id(), "a.txt", b"hello");
        let node = root.node_handle(id);

        assert!(!is_container(&tree, &node));
        assert_eq!(numeric(&tree, &node, Field::Size), 5);
        assert_eq!(metadata(&tree, &node, Field::DisplayName).as_deref(), Some("a.txt"));
    }
}
