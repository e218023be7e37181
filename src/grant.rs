//! Root grants: user-consented access to one document subtree.
//!
//! Acquiring a grant goes through an external consent UI. [`GrantProvider::acquire_root`]
//! returns a [`PendingGrant`] immediately; the UI completes it through the paired
//! [`GrantResponder`] once the user has picked (or refused) a root.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::codec::TreeRoot;
use crate::{FsError, FsResult};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootGrant {
    root: TreeRoot,
}

impl RootGrant {
    pub fn new(root: TreeRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &TreeRoot {
        &self.root
    }

    /// Volume prefix of the granted tree, used to find its mount point.
    pub fn prefix(&self) -> &str {
        self.root.tree_id().volume()
    }

    /// Volume-relative location of the granted tree.
    pub fn relative(&self) -> &str {
        self.root.tree_id().relative()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted(TreeRoot),
    Denied,
}

pub trait GrantProvider: Send + Sync {
    /// Launches the consent flow.
    fn acquire_root(&self) -> PendingGrant;
    /// Whether the host still lists `root` with read and write scope.
    fn root_still_valid(&self, root: &TreeRoot) -> bool;
}

pub struct GrantResponder {
    tx: Sender<GrantOutcome>,
}

impl GrantResponder {
    /// Completes the request. Returns `false` when nobody is waiting anymore.
    pub fn complete(self, outcome: GrantOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

pub struct PendingGrant {
    rx: Receiver<GrantOutcome>,
}

impl PendingGrant {
    pub fn channel() -> (GrantResponder, PendingGrant) {
        let (tx, rx) = mpsc::channel();
        (GrantResponder { tx }, PendingGrant { rx })
    }

    pub fn ready(outcome: GrantOutcome) -> Self {
        let (responder, pending) = Self::channel();
        responder.complete(outcome);
        pending
    }

    /// Blocks until the consent flow finishes.
    pub fn wait(self) -> FsResult<GrantOutcome> {
        self.rx
            .recv()
            .map_err(|_| FsError::Generic("grant request abandoned before completion".to_string()))
    }

    /// Non-blocking poll; `Ok(None)` while the flow is still running.
    pub fn poll(&self) -> FsResult<Option<GrantOutcome>> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(FsError::Generic("grant request abandoned before completion".to_string()))
            }
        }
    }
}

/// JSON file holding the current grant.
#[derive(Clone, Debug)]
pub struct GrantStore {
    path: PathBuf,
}

impl GrantStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> FsResult<Option<RootGrant>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no stored grant at {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, grant: &RootGrant) -> FsResult {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(grant)?)?;
        info!("stored root grant {} at {}", grant.root(), self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> FsResult {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
