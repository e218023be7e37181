use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use fsx::testing::MemoryTree;
use fsx::{Config, FsError, OnErrorAction, PathHandle, Session};
use tempfile::TempDir;

fn tree_session(tree: &MemoryTree) -> Session {
    Session::builder(Arc::new(tree.clone())).root(tree.root()).build().unwrap()
}

fn local_session() -> Session {
    let config = Config { traditional: true, ..Config::default() };
    Session::builder(Arc::new(MemoryTree::new())).config(config).build().unwrap()
}

fn local(session: &Session, dir: &TempDir, relative: &str) -> PathHandle {
    PathHandle::Local(session.local_file(dir.path().join(relative).to_str().unwrap()))
}

#[test]
fn traditional_sessions_hand_out_local_handles() {
    let dir = TempDir::new().unwrap();
    let session = local_session();
    let path = dir.path().join("a/b.txt");

    let file = session.file(path.to_str().unwrap()).unwrap();
    assert!(file.is_traditional());
    assert!(file.create_new_file_with(&fsx::CreateOptions::default().make_directories(true)).unwrap());
    file.write_all(b"local").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"local");
    assert_eq!(file.length(), 5);
    assert!(file.parent_file().unwrap().is_directory());
}

#[test]
fn local_handles_use_the_configured_buffer_size() {
    let dir = TempDir::new().unwrap();
    let config = Config { traditional: true, buffer_size: 4096, ..Config::default() };
    let session = Session::builder(Arc::new(MemoryTree::new())).config(config).build().unwrap();

    let file = session.file(dir.path().join("a.txt").to_str().unwrap()).unwrap();
    assert_eq!(file.buffer_size(), 4096);
    assert_eq!(file.parent_file().unwrap().buffer_size(), 4096);
}

#[test]
fn local_walk_matches_tree_walk() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("a/sub")).unwrap();
    fs::write(dir.path().join("a/f1"), b"1").unwrap();
    fs::write(dir.path().join("a/sub/f2"), b"2").unwrap();
    let session = local_session();

    let start = local(&session, &dir, "a");
    let names: Vec<String> = start.walk_top_down().map(|handle| handle.name()).collect();
    assert_eq!(names, vec!["a", "f1", "sub", "f2"]);

    let names: Vec<String> = start.walk_bottom_up().map(|handle| handle.name()).collect();
    assert_eq!(names, vec!["f1", "f2", "sub", "a"]);
}

#[test]
fn tree_to_local_recursive_copy() {
    let tree = MemoryTree::new();
    let root = tree.root();
    let a = tree.insert_dir(root.tree_id(), "a");
    tree.insert_file(&a, "f1", b"first");
    let sub = tree.insert_dir(&a, "sub");
    tree.insert_file(&sub, "f2", b"second");
    let session = tree_session(&tree);

    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("out")).unwrap();
    fs::write(dir.path().join("out/f1"), b"taken").unwrap();

    let mut conflicts = Vec::new();
    let mut on_error = |handle: &PathHandle, error: &FsError| {
        assert!(error.is_already_exists());
        conflicts.push(handle.name());
        OnErrorAction::Skip
    };
    let source = session.file("/a").unwrap();
    let target = local(&session, &dir, "out");
    assert!(source.copy_recursively(&target, false, Some(&mut on_error)).unwrap());

    assert_eq!(conflicts, vec!["f1"]);
    assert_eq!(fs::read(dir.path().join("out/f1")).unwrap(), b"taken");
    assert_eq!(fs::read(dir.path().join("out/sub/f2")).unwrap(), b"second");
}

#[test]
fn local_to_tree_move() {
    let tree = MemoryTree::new();
    let session = tree_session(&tree);
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("note.txt"), b"moving day").unwrap();

    let mut handle = local(&session, &dir, "note.txt");
    assert!(handle.rename_to(&session.file("/inbox/note.txt").unwrap()));

    assert!(!handle.is_traditional());
    assert_eq!(handle.path(), "/inbox/note.txt");
    assert!(!dir.path().join("note.txt").exists());
    assert_eq!(session.file("/inbox/note.txt").unwrap().read_to_vec().unwrap(), b"moving day");
}

#[test]
fn local_to_tree_move_refuses_occupied_target() {
    let tree = MemoryTree::new();
    let root = tree.root();
    tree.insert_file(root.tree_id(), "busy.txt", b"");
    let session = tree_session(&tree);
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("note.txt"), b"x").unwrap();

    let mut handle = local(&session, &dir, "note.txt");
    assert!(!handle.rename_to(&session.file("/busy.txt").unwrap()));
    assert!(handle.is_traditional());
    assert!(dir.path().join("note.txt").exists());
}

#[test]
fn tree_to_local_inside_the_grant_stays_in_the_tree() {
    let tree = MemoryTree::new();
    let root = tree.root();
    let id = tree.insert_file(root.tree_id(), "report.txt", b"r");
    let volumes: HashMap<String, String> = [("primary".to_string(), "/mnt/primary".to_string())].into_iter().collect();
    let session = Session::builder(Arc::new(tree.clone())).volumes(Arc::new(volumes)).root(root).build().unwrap();

    let mut handle = session.file("/report.txt").unwrap();
    let target = PathHandle::Local(session.local_file("/mnt/primary/archive/report.txt"));
    assert!(handle.rename_to(&target));

    assert!(!handle.is_traditional());
    assert_eq!(handle.path(), "/archive/report.txt");
    assert_eq!(handle.as_tree().unwrap().document_id(), Some(id));
    assert!(!std::path::Path::new("/mnt/primary/archive/report.txt").exists());
}

#[test]
fn local_exit_hooks() {
    let dir = TempDir::new().unwrap();
    let scratch = dir.path().join("scratch");
    fs::create_dir(&scratch).unwrap();
    fs::write(scratch.join("tmp.bin"), b"0").unwrap();

    let session = local_session();
    session.delete_on_exit(&local(&session, &dir, "scratch"));
    session.delete_on_exit(&local(&session, &dir, "scratch/tmp.bin"));
    drop(session);

    assert!(!scratch.exists());
}
