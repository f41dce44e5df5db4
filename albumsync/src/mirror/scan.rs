use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use walkdir::WalkDir;

use super::tree::{DirectoryTree, UploadItem};
use crate::classify::ContentClassifier;
use crate::pattern::NamePattern;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("directory does not exist: {0}")]
    RootMissing(PathBuf),
    #[error("cannot read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Everything found below one sub-tree root.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub tree: DirectoryTree,
    pub items: Vec<UploadItem>,
    /// Regular files rejected by the classifier.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct LocalScanner {
    classifier: Arc<dyn ContentClassifier>,
}

impl LocalScanner {
    pub fn new(classifier: Arc<dyn ContentClassifier>) -> Self {
        Self { classifier }
    }

    /// Immediate sub-directories of `root` whose names match `pattern`.
    ///
    /// A missing root is not an error here; the caller decides what an
    /// empty result means.
    pub fn scan_candidates(
        &self,
        root: &Path,
        pattern: &NamePattern,
    ) -> Result<BTreeSet<String>, ScanError> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(root = %root.display(), "local root does not exist");
                return Ok(BTreeSet::new());
            }
            Err(source) => {
                return Err(ScanError::ReadDir {
                    path: root.to_path_buf(),
                    source,
                });
            }
        };

        let mut candidates = BTreeSet::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(root = %root.display(), %err, "skipping unreadable entry");
                    continue;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if entry.path().is_dir() && pattern.matches(&name) {
                candidates.insert(name);
            }
        }
        tracing::info!(
            root = %root.display(),
            count = candidates.len(),
            "found local candidate directories"
        );
        Ok(candidates)
    }

    /// Recursively collects media files below `sub_tree_root`.
    ///
    /// Entries are visited in file-name order, directories before their
    /// contents. A directory gets a tree entry only when a kept file lives in
    /// it or somewhere below it.
    pub fn scan_items(&self, sub_tree_root: &Path) -> Result<ScanResult, ScanError> {
        if !sub_tree_root.is_dir() {
            return Err(ScanError::RootMissing(sub_tree_root.to_path_buf()));
        }
        let root_title = sub_tree_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut tree = DirectoryTree::new(root_title);
        let mut items = Vec::new();
        let mut skipped = 0usize;

        // Remote names are UTF-8; a lossy conversion could merge siblings.
        let walker = WalkDir::new(sub_tree_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let utf8 = entry.depth() == 0 || entry.file_name().to_str().is_some();
                if !utf8 {
                    tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 name");
                }
                utf8
            });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(ScanError::Walk {
                        path: sub_tree_root.to_path_buf(),
                        source,
                    });
                }
                Err(err) => {
                    tracing::warn!(%err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(title) = entry.file_name().to_str() else {
                continue;
            };

            let path = entry.path();
            let kind = self.classifier.classify(path);
            if !kind.is_media() {
                tracing::trace!(path = %path.display(), "not a photo or video");
                skipped += 1;
                continue;
            }

            let folder = path.parent().unwrap_or(sub_tree_root);
            let relative = relative_dir(sub_tree_root, folder);
            let directory = tree.ensure(&relative);
            items.push(UploadItem {
                path: path.to_path_buf(),
                directory,
                title: title.to_string(),
                kind,
            });
        }

        tracing::debug!(
            root = %sub_tree_root.display(),
            files = items.len(),
            directories = tree.len(),
            skipped,
            "scanned sub-tree"
        );
        Ok(ScanResult {
            tree,
            items,
            skipped,
        })
    }
}

/// `folder` relative to `root`, slash-separated with no leading or trailing
/// separator. The root itself maps to the empty string.
fn relative_dir(root: &Path, folder: &Path) -> String {
    let Ok(relative) = folder.strip_prefix(root) else {
        return String::new();
    };
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => part.to_str().map(str::to_owned),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
