use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::scan::{LocalScanner, ScanError};
use super::tree::UploadItem;
use crate::pattern::NamePattern;
use crate::remote::{RemoteDirectoryId, RemoteError, RemoteFileId, RemoteStore};

const DEFAULT_UPLOAD_CONCURRENCY: usize = 2;
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("scan task failed: {0}")]
    ScanTask(#[from] tokio::task::JoinError),
    #[error("cannot create remote directory {relative_path:?}: {source}")]
    CreateDirectory {
        relative_path: String,
        #[source]
        source: RemoteError,
    },
    #[error("mirror cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct MirrorOptions {
    pub upload_concurrency: usize,
    /// Upper bound for any single remote call.
    pub op_timeout: Duration,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: RemoteError,
}

#[derive(Debug, Default)]
pub struct MirrorReport {
    pub name: String,
    pub directories_created: usize,
    /// Directories that already existed remotely and were reused.
    pub directories_reused: usize,
    pub files_uploaded: usize,
    /// Files the store already had; never overwritten.
    pub files_skipped: usize,
    pub failures: Vec<FileFailure>,
    pub elapsed: Duration,
}

impl MirrorReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Recreates one local sub-tree under a remote parent directory.
#[derive(Clone)]
pub struct MirrorEngine {
    scanner: LocalScanner,
    store: Arc<dyn RemoteStore>,
    options: MirrorOptions,
}

impl MirrorEngine {
    pub fn new(scanner: LocalScanner, store: Arc<dyn RemoteStore>, options: MirrorOptions) -> Self {
        Self {
            scanner,
            store,
            options,
        }
    }

    /// Scans `sub_tree_root` and mirrors it into a directory of the same name
    /// below `remote_parent`.
    ///
    /// Directories are ensured strictly parent-first and each relative path
    /// at most once per call. A failing directory aborts the call; a failing
    /// file is recorded in the report and the rest carries on.
    pub async fn mirror(
        &self,
        sub_tree_root: &Path,
        remote_parent: &RemoteDirectoryId,
        cancel: &CancellationToken,
    ) -> Result<MirrorReport, MirrorError> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }

        let scanner = self.scanner.clone();
        let root = sub_tree_root.to_path_buf();
        let scan = tokio::task::spawn_blocking(move || scanner.scan_items(&root)).await??;

        let mut report = MirrorReport {
            name: scan.tree.root().title.clone(),
            ..MirrorReport::default()
        };

        // Indexed by DirId; the tree is top-down so a parent is always
        // resolved before any of its children is looked at.
        let mut resolved: Vec<RemoteDirectoryId> = Vec::with_capacity(scan.tree.len());
        for (_, dir) in scan.tree.iter() {
            if cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            let parent = match dir.parent {
                Some(parent) => &resolved[parent.index()],
                None => remote_parent,
            };
            let (id, created) = self
                .ensure_directory(&dir.title, parent, cancel)
                .await
                .map_err(|source| match source {
                    RemoteError::Cancelled => MirrorError::Cancelled,
                    source => MirrorError::CreateDirectory {
                        relative_path: dir.relative_path.clone(),
                        source,
                    },
                })?;
            if created {
                report.directories_created += 1;
            } else {
                report.directories_reused += 1;
            }
            resolved.push(id);
        }

        let concurrency = self.options.upload_concurrency.max(1);
        let mut uploads = stream::iter(scan.items.iter())
            .map(|item| {
                let parent = &resolved[item.directory.index()];
                async move { (item, self.upload(item, parent, cancel).await) }
            })
            .buffer_unordered(concurrency);

        let mut cancelled = false;
        while let Some((item, outcome)) = uploads.next().await {
            match outcome {
                Ok(_) => report.files_uploaded += 1,
                Err(RemoteError::AlreadyExists { .. }) => {
                    tracing::debug!(path = %item.path.display(), "already uploaded");
                    report.files_skipped += 1;
                }
                Err(RemoteError::Cancelled) => cancelled = true,
                Err(error) => {
                    tracing::warn!(path = %item.path.display(), %error, "upload failed");
                    report.failures.push(FileFailure {
                        path: item.path.clone(),
                        error,
                    });
                }
            }
        }
        if cancelled {
            return Err(MirrorError::Cancelled);
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Creates `name` under `parent`, or reuses the directory if the store
    /// already has one by that name. The flag is `true` when it was created.
    async fn ensure_directory(
        &self,
        name: &str,
        parent: &RemoteDirectoryId,
        cancel: &CancellationToken,
    ) -> Result<(RemoteDirectoryId, bool), RemoteError> {
        let created = bounded(
            cancel,
            self.options.op_timeout,
            self.store.create_directory(name, parent),
        )
        .await;
        match created {
            Ok(id) => {
                tracing::debug!(%name, %id, "created remote directory");
                Ok((id, true))
            }
            Err(err) if err.is_already_exists() => {
                let filter = NamePattern::exact(name);
                let existing = bounded(
                    cancel,
                    self.options.op_timeout,
                    self.store.list_child_directories(parent, Some(&filter)),
                )
                .await?;
                // A file of that name is not something we can upload into.
                match existing.get(name) {
                    Some(id) => Ok((id.clone(), false)),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn upload(
        &self,
        item: &UploadItem,
        parent: &RemoteDirectoryId,
        cancel: &CancellationToken,
    ) -> Result<RemoteFileId, RemoteError> {
        if cancel.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }
        tracing::debug!(path = %item.path.display(), kind = %item.kind, %parent, "uploading");
        bounded(
            cancel,
            self.options.op_timeout,
            self.store.upload_file(&item.path, item.kind, parent),
        )
        .await
    }
}

/// Races a remote call against cancellation and a timeout.
pub(crate) async fn bounded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    call: F,
) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RemoteError::Cancelled),
        outcome = tokio::time::timeout(timeout, call) => {
            outcome.unwrap_or(Err(RemoteError::TimedOut(timeout)))
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
