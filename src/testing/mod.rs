//! Test doubles for the collaborator traits.

mod memory_tree;

pub use memory_tree::MemoryTree;
