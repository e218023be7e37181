//! Copying between handles of either backend.

use std::cell::RefCell;
use std::io::{self, BufReader, Write};

use log::{debug, warn};

use crate::handle::PathHandle;
use crate::provider::WriteMode;
use crate::tree::CreateOptions;
use crate::walk::WalkControl;
use crate::{path, FsError, FsResult};

/// What a recursive copy does after reporting a failed node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnErrorAction {
    /// Leave the node behind and carry on with the rest.
    Skip,
    Terminate,
}

/// Copies one node. A directory source only produces an empty directory at `target`.
///
/// An existing `target` is an error unless `overwrite` is set, in which case it is deleted first;
/// a non-empty directory cannot be deleted that way and stays an error. Missing parents of
/// `target` are created.
pub fn copy_to(source: &PathHandle, target: &PathHandle, overwrite: bool, buffer_size: usize) -> FsResult<PathHandle> {
    source.refresh();
    target.refresh();

    if !source.exists() {
        return Err(FsError::NotFound(source.path(), "the source file doesn't exist".to_string()));
    }

    if target.exists() {
        if !overwrite {
            return Err(FsError::AlreadyExists(target.path(), "the destination file already exists".to_string()));
        }
        if !target.delete() {
            return Err(FsError::AlreadyExists(
                target.path(),
                "tried to overwrite the destination, but failed to delete it".to_string(),
            ));
        }
    }

    if source.is_directory() {
        if !target.mkdirs() {
            return Err(FsError::Generic(format!("failed to create target directory {}", target.path())));
        }
        return Ok(target.clone());
    }

    let created = target.create_new_file_with(&CreateOptions::default().make_directories(true))?;
    if !created && !target.exists() {
        return Err(FsError::Generic(format!("failed to create target file {}", target.path())));
    }

    let input = source.open_read()?;
    let mut output = target.open_write(WriteMode::WriteTruncate)?;
    let copied = io::copy(&mut BufReader::with_capacity(buffer_size.max(1), input), &mut output)?;
    output.flush()?;
    drop(output);
    debug!("copied {copied} bytes from {} to {}", source.path(), target.path());

    Ok(target.clone())
}

/// Copies `source` and everything below it to `target`.
///
/// Each failed node is handed to `on_error`; without one the first failure is returned as the
/// error. Returns `false` when `on_error` asked to terminate.
pub fn copy_recursively(
    source: &PathHandle,
    target: &PathHandle,
    overwrite: bool,
    on_error: Option<&mut dyn FnMut(&PathHandle, &FsError) -> OnErrorAction>,
) -> FsResult<bool> {
    copy_tree(source, target, overwrite, on_error, false)
}

/// Moves by copying and then deleting the source. Not atomic: a failure part way leaves both
/// sides partially populated.
pub(crate) fn move_by_copy(source: &PathHandle, target: &PathHandle) -> FsResult<bool> {
    if !copy_tree(source, target, false, None, true)? {
        return Ok(false);
    }
    if source.exists() && !source.delete_recursively() {
        warn!("copied {} to {} but could not delete the source", source.path(), target.path());
    }
    Ok(true)
}

struct Policy<'f> {
    on_error: Option<&'f mut dyn FnMut(&PathHandle, &FsError) -> OnErrorAction>,
}

impl Policy<'_> {
    /// `Ok(true)` to go on, `Ok(false)` to stop, `Err` when nobody handles failures.
    fn report(&mut self, handle: &PathHandle, error: FsError) -> FsResult<bool> {
        let Some(hook) = self.on_error.as_mut() else {
            return Err(error);
        };
        let action = hook(handle, &error);
        debug!("{error} at {}: {action:?}", handle.path());
        Ok(action == OnErrorAction::Skip)
    }
}

pub(crate) fn copy_tree(
    source: &PathHandle,
    target: &PathHandle,
    overwrite: bool,
    on_error: Option<&mut dyn FnMut(&PathHandle, &FsError) -> OnErrorAction>,
    delete_after_copy: bool,
) -> FsResult<bool> {
    let policy = RefCell::new(Policy { on_error });

    source.refresh();
    if !source.exists() {
        let error = FsError::NotFound(source.path(), "the source file doesn't exist".to_string());
        policy.borrow_mut().report(source, error)?;
        return Ok(false);
    }

    let base = source.path();
    let buffer_size = source.buffer_size();
    let raised = RefCell::new(None);

    let mut walk = source.walk_top_down().on_fail(|dir, error| match policy.borrow_mut().report(dir, error) {
        Ok(true) => WalkControl::Continue,
        Ok(false) => WalkControl::Abort,
        Err(e) => {
            *raised.borrow_mut() = Some(e);
            WalkControl::Abort
        }
    });

    for src in walk.by_ref() {
        if !src.exists() {
            let error = FsError::NotFound(src.path(), "vanished while copying".to_string());
            if !policy.borrow_mut().report(&src, error)? {
                return Ok(false);
            }
            continue;
        }

        let src_path = src.path();
        let Some(relative) = path::relative_to(&base, &src_path) else {
            debug!("{src_path} is not below {base}");
            continue;
        };
        let dst = if relative.is_empty() { target.clone() } else { target.with_path(&path::join(&target.path(), relative)) };

        if dst.exists() && !(src.is_directory() && dst.is_directory()) {
            let still_exists = if !overwrite {
                true
            } else if dst.is_directory() {
                !dst.delete_recursively()
            } else {
                !dst.delete()
            };
            if still_exists {
                let error = FsError::AlreadyExists(dst.path(), "the destination file already exists".to_string());
                if !policy.borrow_mut().report(&dst, error)? {
                    return Ok(false);
                }
                continue;
            }
        }

        if src.is_directory() {
            if !dst.mkdirs() {
                let error = FsError::Generic(format!("failed to create target directory {}", dst.path()));
                if !policy.borrow_mut().report(&dst, error)? {
                    return Ok(false);
                }
            }
            continue;
        }

        match copy_to(&src, &dst, overwrite, buffer_size) {
            Ok(copied) => {
                let (expected, actual) = (src.length(), copied.length());
                if expected != actual {
                    let error = FsError::LengthMismatch(src.path(), expected, actual);
                    if !policy.borrow_mut().report(&src, error)? {
                        return Ok(false);
                    }
                } else if delete_after_copy && !src.delete() {
                    warn!("could not delete {} after copying it", src.path());
                }
            }
            Err(e) => {
                if !policy.borrow_mut().report(&src, e)? {
                    return Ok(false);
                }
            }
        }
    }

    let aborted = walk.aborted();
    drop(walk);
    if let Some(e) = raised.into_inner() {
        return Err(e);
    }
    Ok(!aborted)
}
