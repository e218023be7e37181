#[cfg(feature = "zip")]
use zip::result::ZipError;

use serde_json::Error as JsonError;
use std::io::Error as IoError;

#[derive(derive_more::From, Debug)]
pub enum FsError {
    #[from]
    IoError(IoError),
    #[from]
    #[cfg(feature = "zip")]
    ZipError(ZipError),
    #[from]
    JsonError(JsonError),

    /// `(path, reason)`: a node an operation requires is absent.
    NotFound(String, String),
    /// `(path, reason)`: a target collides and may not (or could not) be replaced.
    AlreadyExists(String, String),
    /// An intermediate segment is absent and auto-creation is disabled.
    HierarchyBroken(String),
    /// No root grant is available for a tree walk.
    RootNotInitialized(String),
    /// `(path, reason)`: a container could not be enumerated.
    AccessDenied(String, String),
    /// `(path, expected, actual)`
    LengthMismatch(String, u64, u64),
    NoStream(String),
    ImproperType(String),

    #[from]
    Generic(String),
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(..))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, FsError::AlreadyExists(..))
    }
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsError::IoError(error) => write!(f, "{error}"),
            #[cfg(feature = "zip")]
            FsError::ZipError(zerr) => write!(f, "{zerr}"),
            FsError::JsonError(jerr) => write!(f, "{jerr}"),
            FsError::NotFound(path, reason) => write!(f, "[{path}] not found: {reason}"),
            FsError::AlreadyExists(path, reason) => write!(f, "[{path}] already exists: {reason}"),
            FsError::HierarchyBroken(msg) => write!(f, "directory hierarchy broken: {msg}"),
            FsError::RootNotInitialized(msg) => write!(f, "root not initialized: {msg}"),
            FsError::AccessDenied(path, reason) => write!(f, "[{path}] access denied: {reason}"),
            FsError::LengthMismatch(path, expected, actual) => write!(
                f,
                "[{path}] copied incompletely, expected {expected} bytes but found {actual}"
            ),
            FsError::NoStream(path) => write!(f, "no stream available for '{path}'"),
            FsError::ImproperType(msg) => write!(f, "{msg}"),
            FsError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for FsError {}
