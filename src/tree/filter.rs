use log::warn;

use super::TreeFile;
use crate::provider::DocumentRow;
use crate::{oracle, path, DirectoryEntry};

impl TreeFile {
    fn child_rows(&self) -> Option<Vec<DocumentRow>> {
        let node = self.current()?;
        if !oracle::is_container(self.provider(), &node) {
            return None;
        }

        match self.provider().query_children(&node.children()) {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("could not list {}: {e}", self.path());
                None
            }
        }
    }

    fn child(&self, row: DocumentRow) -> TreeFile {
        let root = self.root();
        let child_path = path::join(&self.path(), &row.display_name);
        let node = root.node_handle(row.document_id);
        TreeFile::with_node(self.session().clone(), root, child_path, node)
    }

    /// Snapshot of every child. `None` when this is not a listable container.
    pub fn list_entries(&self) -> Option<Vec<DirectoryEntry>> {
        let rows = self.child_rows()?;
        Some(
            rows.into_iter()
                .map(|row| DirectoryEntry {
                    is_container: row.is_container(),
                    size: row.size.max(0) as u64,
                    last_modified: row.last_modified,
                    name: row.display_name,
                })
                .collect(),
        )
    }

    pub fn list(&self) -> Option<Vec<String>> {
        Some(self.child_rows()?.into_iter().map(|row| row.display_name).collect())
    }

    /// Names of the children accepted by `filter`, which sees a handle to each child.
    pub fn list_filtered<F>(&self, mut filter: F) -> Option<Vec<String>>
    where
        F: FnMut(&TreeFile) -> bool,
    {
        let rows = self.child_rows()?;
        Some(
            rows.into_iter()
                .filter_map(|row| {
                    let name = row.display_name.clone();
                    filter(&self.child(row)).then_some(name)
                })
                .collect(),
        )
    }

    /// Names of the children accepted by `filter`, which sees this directory and the child name.
    pub fn list_by_name<F>(&self, mut filter: F) -> Option<Vec<String>>
    where
        F: FnMut(&TreeFile, &str) -> bool,
    {
        let rows = self.child_rows()?;
        Some(rows.into_iter().map(|row| row.display_name).filter(|name| filter(self, name.as_str())).collect())
    }

    pub fn list_files(&self) -> Option<Vec<TreeFile>> {
        self.list_files_filtered(|_| true)
    }

    pub fn list_files_filtered<F>(&self, mut filter: F) -> Option<Vec<TreeFile>>
    where
        F: FnMut(&TreeFile) -> bool,
    {
        let rows = self.child_rows()?;
        Some(rows.into_iter().map(|row| self.child(row)).filter(|child| filter(child)).collect())
    }

    pub fn list_files_by_name<F>(&self, mut filter: F) -> Option<Vec<TreeFile>>
    where
        F: FnMut(&TreeFile, &str) -> bool,
    {
        let rows = self.child_rows()?;
        Some(rows.into_iter().filter(|row| filter(self, row.display_name.as_str())).map(|row| self.child(row)).collect())
    }

    /// `true` only for a container without children.
    pub fn is_empty(&self) -> bool {
        self.child_rows().is_some_and(|rows| rows.is_empty())
    }
}
