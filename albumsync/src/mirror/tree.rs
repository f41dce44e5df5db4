use std::collections::HashMap;
use std::path::PathBuf;

use crate::classify::ContentKind;

/// Index of a directory inside a [`DirectoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirId(usize);

impl DirId {
    pub const ROOT: DirId = DirId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDirectory {
    /// Slash-separated path below the sub-tree root, empty for the root.
    pub relative_path: String,
    pub title: String,
    pub parent: Option<DirId>,
    pub depth: usize,
}

impl UploadDirectory {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub path: PathBuf,
    pub directory: DirId,
    pub title: String,
    pub kind: ContentKind,
}

/// Directories of one sub-tree, stored top-down.
///
/// A directory's parent always sits at a lower index than the directory
/// itself, so iterating in index order visits parents first.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    nodes: Vec<UploadDirectory>,
    by_path: HashMap<String, DirId>,
}

impl DirectoryTree {
    pub fn new(root_title: impl Into<String>) -> Self {
        let root = UploadDirectory {
            relative_path: String::new(),
            title: root_title.into(),
            parent: None,
            depth: 0,
        };
        let mut by_path = HashMap::new();
        by_path.insert(String::new(), DirId::ROOT);
        Self {
            nodes: vec![root],
            by_path,
        }
    }

    pub fn root(&self) -> &UploadDirectory {
        &self.nodes[DirId::ROOT.0]
    }

    pub fn get(&self, id: DirId) -> Option<&UploadDirectory> {
        self.nodes.get(id.0)
    }

    pub fn lookup(&self, relative_path: &str) -> Option<DirId> {
        self.by_path.get(relative_path).copied()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DirId, &UploadDirectory)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (DirId(index), node))
    }

    /// Returns the entry for `relative_path`, inserting it and any missing
    /// ancestors first. `relative_path` must already be normalised
    /// (no leading, trailing or doubled slashes).
    pub fn ensure(&mut self, relative_path: &str) -> DirId {
        if let Some(id) = self.lookup(relative_path) {
            return id;
        }
        let (parent_path, title) = split_relative(relative_path);
        let parent = self.ensure(parent_path);
        let depth = self.nodes[parent.0].depth + 1;
        let id = DirId(self.nodes.len());
        self.nodes.push(UploadDirectory {
            relative_path: relative_path.to_string(),
            title: title.to_string(),
            parent: Some(parent),
            depth,
        });
        self.by_path.insert(relative_path.to_string(), id);
        id
    }
}

/// Splits `a/b/c` into (`a/b`, `c`); a single segment has the root as parent.
pub fn split_relative(relative_path: &str) -> (&str, &str) {
    match relative_path.rsplit_once('/') {
        Some((parent, title)) => (parent, title),
        None => ("", relative_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tree_contains_only_root() {
        let tree = DirectoryTree::new("2023-trip");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.lookup(""), Some(DirId::ROOT));
        assert!(tree.root().is_root());
        assert_eq!(tree.root().title, "2023-trip");
    }

    #[test]
    fn ensure_inserts_missing_ancestors_first() {
        let mut tree = DirectoryTree::new("root");
        let leaf = tree.ensure("a/b/c");

        assert_eq!(tree.len(), 4);
        let a = tree.lookup("a").unwrap();
        let b = tree.lookup("a/b").unwrap();
        assert!(a < b && b < leaf);

        let leaf_node = tree.get(leaf).unwrap();
        assert_eq!(leaf_node.title, "c");
        assert_eq!(leaf_node.parent, Some(b));
        assert_eq!(leaf_node.depth, 3);
        assert_eq!(tree.get(a).unwrap().parent, Some(DirId::ROOT));
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut tree = DirectoryTree::new("root");
        let first = tree.ensure("day-1");
        let second = tree.ensure("day-1");
        assert_eq!(first, second);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn parents_always_precede_children() {
        let mut tree = DirectoryTree::new("root");
        tree.ensure("b/x");
        tree.ensure("a");
        tree.ensure("b/x/y");
        tree.ensure("a/z");
        for (id, node) in tree.iter() {
            if let Some(parent) = node.parent {
                assert!(parent < id, "{} listed before its parent", node.relative_path);
            }
        }
    }

    #[test]
    fn split_relative_handles_single_segment() {
        assert_eq!(split_relative("a"), ("", "a"));
        assert_eq!(split_relative("a/b/c"), ("a/b", "c"));
    }
}
