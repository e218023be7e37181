use log::{debug, warn};

use super::TreeFile;
use crate::codec::{ListingHandle, TreeRoot};
use crate::provider::{ANY_MIME, DIRECTORY_MIME};
use crate::walker::{DirStep, Step, TreeWalker};
use crate::{oracle, path, FsError, FsResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOptions {
    /// Create missing intermediate containers instead of failing with `HierarchyBroken`.
    pub make_directories: bool,
    /// Replace an existing node instead of leaving it alone.
    pub overwrite: bool,
    pub mime_type: String,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self { make_directories: false, overwrite: false, mime_type: ANY_MIME.to_string() }
    }
}

impl CreateOptions {
    pub fn make_directories(mut self, make_directories: bool) -> Self {
        self.make_directories = make_directories;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

impl TreeFile {
    pub fn create_new_file(&self) -> FsResult<bool> {
        self.create_new_file_with(&CreateOptions::default())
    }

    /// Creates an empty document at this path.
    ///
    /// Returns `Ok(false)` when a node already exists and `overwrite` is off; the existing node is
    /// still published so other handles converge on it. A missing parent without
    /// `make_directories` is `HierarchyBroken`; any other failure is `Ok(false)`.
    pub fn create_new_file_with(&self, options: &CreateOptions) -> FsResult<bool> {
        let (root, path) = self.key();
        if path::is_root(&path) {
            return Ok(false);
        }

        let result = match self.node() {
            Some(_) if !options.make_directories => self.create_at_known_parent(&path, options),
            _ => self.create_by_walk(&root, &path, options),
        };

        match result {
            Err(e @ FsError::HierarchyBroken(_)) => Err(e),
            Err(e) => {
                warn!("creating {path} failed: {e}");
                Ok(false)
            }
            ok => ok,
        }
    }

    fn create_at_known_parent(&self, path: &str, options: &CreateOptions) -> FsResult<bool> {
        if let Some(existing) = self.current() {
            if !options.overwrite {
                return Ok(false);
            }
            if !self.provider().delete_node(&existing)? {
                return Err(FsError::AlreadyExists(path.to_string(), "could not delete the existing document".into()));
            }
        }

        let parent = self.parent_listing()?;
        self.create_blank(&parent, path, &options.mime_type)
    }

    fn create_by_walk(&self, root: &TreeRoot, path: &str, options: &CreateOptions) -> FsResult<bool> {
        let provider = self.provider();
        let walker = TreeWalker::new(provider, Some(root))?;

        walker.walk(
            path,
            |step| match step.existing {
                Some(id) => Ok(DirStep::Descend(root.child_listing(id))),
                None if options.make_directories => self.create_container(root, step),
                None => Err(FsError::HierarchyBroken(format!("{} does not exist", step.path))),
            },
            |step| match step.existing {
                Some(id) if options.overwrite => {
                    if !provider.delete_node(&root.node_handle(id.clone()))? {
                        return Err(FsError::AlreadyExists(path.to_string(), "could not delete the existing document".into()));
                    }
                    self.create_blank(step.parent, path, &options.mime_type)
                }
                Some(id) => {
                    self.settle(path, root.node_handle(id.clone()), None);
                    Ok(false)
                }
                None => self.create_blank(step.parent, path, &options.mime_type),
            },
        )
    }

    /// Creates a single container; its parent must already exist.
    pub fn mkdir(&self) -> bool {
        let (root, path) = self.key();
        if path::is_root(&path) {
            return false;
        }

        let walked = TreeWalker::new(self.provider(), Some(&root)).and_then(|walker| {
            walker.walk(
                &path,
                |step| match step.existing {
                    Some(id) => Ok(DirStep::Descend(root.child_listing(id))),
                    None => {
                        debug!("mkdir {path}: {} is missing", step.path);
                        Ok(DirStep::Stop)
                    }
                },
                |step| match step.existing {
                    Some(_) => Ok(false),
                    None => self.create_blank(step.parent, &path, DIRECTORY_MIME),
                },
            )
        });

        walked.unwrap_or_else(|e| {
            warn!("mkdir {path} failed: {e}");
            false
        })
    }

    /// Creates this container and every missing ancestor. `true` when the path ends up being a
    /// container, including when it already was one.
    pub fn mkdirs(&self) -> bool {
        let (root, path) = self.key();
        if path::is_root(&path) {
            return true;
        }

        let provider = self.provider();
        let walked = TreeWalker::new(provider, Some(&root)).and_then(|walker| {
            walker.walk(
                &path,
                |step| match step.existing {
                    Some(id) => Ok(DirStep::Descend(root.child_listing(id))),
                    None => self.create_container(&root, step),
                },
                |step| match step.existing {
                    Some(id) => {
                        let node = root.node_handle(id.clone());
                        let is_container = oracle::is_container(provider, &node);
                        if is_container {
                            self.settle(&path, node, None);
                        }
                        Ok(is_container)
                    }
                    None => self.create_blank(step.parent, &path, DIRECTORY_MIME),
                },
            )
        });

        walked.unwrap_or_else(|e| {
            warn!("mkdirs {path} failed: {e}");
            false
        })
    }

    fn create_container(&self, root: &TreeRoot, step: Step<'_>) -> FsResult<DirStep> {
        match self.provider().create_child(step.parent, DIRECTORY_MIME, step.name)? {
            Some(id) => {
                debug!("created intermediate container {}", step.path);
                self.announce(step.path, root.node_handle(id.clone()));
                Ok(DirStep::Descend(root.child_listing(&id)))
            }
            None => Ok(DirStep::Stop),
        }
    }

    fn create_blank(&self, parent: &ListingHandle, path: &str, mime_type: &str) -> FsResult<bool> {
        match self.provider().create_child(parent, mime_type, path::name(path))? {
            Some(id) => {
                self.settle(path, parent.root().node_handle(id), None);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
