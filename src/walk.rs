//! Depth-first iteration over already-resolved nodes.
//!
//! Unlike [`crate::walker::TreeWalker`], which resolves one path segment by segment, a
//! [`TreeWalk`] starts from a handle and enumerates everything below it through listings. It
//! works the same over both backends.

use std::collections::VecDeque;

use log::trace;

use crate::handle::PathHandle;
use crate::FsError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WalkDirection {
    /// Directories before their contents.
    #[default]
    TopDown,
    /// Contents before their directory.
    BottomUp,
}

/// Verdict of a failure hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Ends the whole walk, not just the current directory.
    Abort,
}

type EnterHook<'a> = Box<dyn FnMut(&PathHandle) -> bool + 'a>;
type LeaveHook<'a> = Box<dyn FnMut(&PathHandle) + 'a>;
type FailHook<'a> = Box<dyn FnMut(&PathHandle, FsError) -> WalkControl + 'a>;

#[derive(Default)]
struct Hooks<'a> {
    enter: Option<EnterHook<'a>>,
    leave: Option<LeaveHook<'a>>,
    fail: Option<FailHook<'a>>,
    aborted: bool,
}

impl Hooks<'_> {
    fn enter(&mut self, dir: &PathHandle) -> bool {
        self.enter.as_mut().is_none_or(|enter| enter(dir))
    }

    fn leave(&mut self, dir: &PathHandle) {
        if let Some(leave) = self.leave.as_mut() {
            leave(dir);
        }
    }

    fn list(&mut self, dir: &PathHandle) -> Option<VecDeque<PathHandle>> {
        let listed = dir.list_files().map(VecDeque::from);
        if listed.is_none() {
            let error = FsError::AccessDenied(dir.path(), "cannot list files in a directory".to_string());
            if let Some(fail) = self.fail.as_mut() {
                if fail(dir, error) == WalkControl::Abort {
                    trace!("walk aborted at {}", dir.path());
                    self.aborted = true;
                }
            }
        }
        listed
    }
}

enum State {
    Single {
        file: PathHandle,
        visited: bool,
    },
    Directory {
        dir: PathHandle,
        children: Option<VecDeque<PathHandle>>,
        dir_visited: bool,
        failed: bool,
    },
}

impl State {
    fn directory(dir: PathHandle) -> Self {
        State::Directory { dir, children: None, dir_visited: false, failed: false }
    }

    /// Next handle of this level, flagged `true` when it is the level's own directory.
    fn step(&mut self, direction: WalkDirection, hooks: &mut Hooks<'_>) -> Option<(PathHandle, bool)> {
        match self {
            State::Single { file, visited } => {
                if *visited {
                    return None;
                }
                *visited = true;
                Some((file.clone(), true))
            }
            State::Directory { dir, children, dir_visited, failed } => match direction {
                WalkDirection::TopDown => {
                    if !*dir_visited {
                        if !hooks.enter(dir) {
                            return None;
                        }
                        *dir_visited = true;
                        return Some((dir.clone(), true));
                    }

                    let pending = children.get_or_insert_with(|| hooks.list(dir).unwrap_or_default());
                    match pending.pop_front() {
                        Some(child) => Some((child, false)),
                        None => {
                            hooks.leave(dir);
                            None
                        }
                    }
                }
                WalkDirection::BottomUp => {
                    if !*failed && children.is_none() {
                        if !hooks.enter(dir) {
                            return None;
                        }
                        *children = hooks.list(dir);
                        *failed = children.is_none();
                    }

                    if let Some(child) = children.as_mut().and_then(VecDeque::pop_front) {
                        Some((child, false))
                    } else if !*dir_visited {
                        *dir_visited = true;
                        Some((dir.clone(), true))
                    } else {
                        hooks.leave(dir);
                        None
                    }
                }
            },
        }
    }
}

pub struct TreeWalk<'a> {
    start: PathHandle,
    direction: WalkDirection,
    max_depth: usize,
    hooks: Hooks<'a>,
    stack: Vec<State>,
    started: bool,
}

impl<'a> TreeWalk<'a> {
    pub fn new(start: PathHandle, direction: WalkDirection) -> Self {
        Self { start, direction, max_depth: usize::MAX, hooks: Hooks::default(), stack: Vec::new(), started: false }
    }

    /// Called before a directory is entered; returning `false` skips it and everything below.
    pub fn on_enter(mut self, hook: impl FnMut(&PathHandle) -> bool + 'a) -> Self {
        self.hooks.enter = Some(Box::new(hook));
        self
    }

    /// Called after every entry of a directory has been visited.
    pub fn on_leave(mut self, hook: impl FnMut(&PathHandle) + 'a) -> Self {
        self.hooks.leave = Some(Box::new(hook));
        self
    }

    /// Called with `AccessDenied` when a directory cannot be listed.
    pub fn on_fail(mut self, hook: impl FnMut(&PathHandle, FsError) -> WalkControl + 'a) -> Self {
        self.hooks.fail = Some(Box::new(hook));
        self
    }

    /// Limits descent; the start is depth 1. Values below 1 are raised to 1.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Whether a failure hook ended the walk.
    pub fn aborted(&self) -> bool {
        self.hooks.aborted
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = PathHandle;

    fn next(&mut self) -> Option<PathHandle> {
        if !self.started {
            self.started = true;
            if self.start.is_directory() {
                self.stack.push(State::directory(self.start.clone()));
            } else if self.start.is_file() {
                self.stack.push(State::Single { file: self.start.clone(), visited: false });
            }
        }

        loop {
            if self.hooks.aborted {
                return None;
            }

            let depth = self.stack.len();
            let top = self.stack.last_mut()?;
            let Some((handle, is_level_root)) = top.step(self.direction, &mut self.hooks) else {
                self.stack.pop();
                continue;
            };
            if self.hooks.aborted {
                return None;
            }

            if is_level_root || depth >= self.max_depth || !handle.is_directory() {
                return Some(handle);
            }
            self.stack.push(State::directory(handle));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::Arc;

    use super::*;
    use crate::session::Session;
    use crate::testing::MemoryTree;

    fn fixture() -> (MemoryTree, Session) {
        let tree = MemoryTree::new();
        let root = tree.root();
        let a = tree.insert_dir(root.tree_id(), "a");
        tree.insert_file(&a, "f1", b"1");
        let sub = tree.insert_dir(&a, "sub");
        tree.insert_file(&sub, "f2", b"2");
        let session = Session::builder(Arc::new(tree.clone())).root(root).build().unwrap();
        (tree, session)
    }

    fn paths(walk: TreeWalk<'_>) -> Vec<String> {
        walk.map(|handle| handle.path()).collect()
    }

    #[test]
    fn top_down_order() {
        let (_tree, session) = fixture();
        let start = session.file("/a").unwrap();
        assert_eq!(paths(start.walk_top_down()), vec!["/a", "/a/f1", "/a/sub", "/a/sub/f2"]);
    }

    #[test]
    fn bottom_up_order() {
        let (_tree, session) = fixture();
        let start = session.file("/a").unwrap();
        assert_eq!(paths(start.walk_bottom_up()), vec!["/a/f1", "/a/sub/f2", "/a/sub", "/a"]);
    }

    #[test]
    fn hooks_and_depth() {
        let (_tree, session) = fixture();
        let start = session.file("/a").unwrap();

        let left = RefCell::new(Vec::new());
        let walk = start
            .walk_top_down()
            .on_enter(|dir| dir.name() != "sub")
            .on_leave(|dir| left.borrow_mut().push(dir.path()));
        assert_eq!(paths(walk), vec!["/a", "/a/f1"]);
        assert_eq!(*left.borrow(), vec!["/a"]);

        assert_eq!(paths(start.walk_top_down().max_depth(1)), vec!["/a", "/a/f1", "/a/sub"]);
        assert_eq!(paths(session.file("/a/f1").unwrap().walk_top_down()), vec!["/a/f1"]);
        assert!(paths(session.file("/missing").unwrap().walk_top_down()).is_empty());
    }

    #[test]
    fn failure_hook_can_abort() {
        let (tree, session) = fixture();
        let start = session.file("/a").unwrap();

        let mut walk = start.walk_top_down().on_fail(|_, error| {
            assert!(matches!(error, FsError::AccessDenied(..)));
            WalkControl::Abort
        });
        assert_eq!(walk.next().map(|h| h.path()), Some("/a".to_string()));

        tree.set_failing(true);
        assert!(walk.next().is_none());
        assert!(walk.aborted());
    }
}
