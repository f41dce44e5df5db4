use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::classify::ContentClassifier;
use crate::config::MirrorConfig;
use crate::mirror::engine::bounded;
use crate::mirror::{LocalScanner, MirrorEngine, MirrorError, MirrorReport, ScanError, diff};
use crate::pattern::NamePattern;
use crate::remote::{RemoteDirectoryId, RemoteError, RemoteStore};
use crate::selection::SelectionPolicy;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("local root does not exist: {0}")]
    LocalRootMissing(PathBuf),
    #[error("cannot list local candidates: {0}")]
    Scan(#[from] ScanError),
    #[error("cannot list remote candidates: {0}")]
    RemoteList(#[source] RemoteError),
    #[error("run cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtreeStatus {
    Mirrored,
    Partial { failures: usize },
    Failed { error: String },
}

impl std::fmt::Display for SubtreeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtreeStatus::Mirrored => f.write_str("mirrored"),
            SubtreeStatus::Partial { failures } => {
                write!(f, "partially mirrored ({failures} file failures)")
            }
            SubtreeStatus::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug)]
pub struct SubtreeOutcome {
    pub name: String,
    pub status: SubtreeStatus,
    pub report: Option<MirrorReport>,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    /// Local candidates with no remote counterpart.
    pub pending: Vec<String>,
    pub selected: Vec<String>,
    pub outcomes: Vec<SubtreeOutcome>,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self
                .outcomes
                .iter()
                .all(|outcome| outcome.status == SubtreeStatus::Mirrored)
    }

    pub fn files_uploaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.report.as_ref())
            .map(|report| report.files_uploaded)
            .sum()
    }
}

/// Ties scanning, diffing, selection and mirroring together for one
/// configured local root / remote root pair.
pub struct Runner {
    local_root: PathBuf,
    remote_root: RemoteDirectoryId,
    pattern: NamePattern,
    op_timeout: Duration,
    scanner: LocalScanner,
    store: Arc<dyn RemoteStore>,
    engine: MirrorEngine,
}

impl Runner {
    pub fn new(
        config: &MirrorConfig,
        classifier: Arc<dyn ContentClassifier>,
        store: Arc<dyn RemoteStore>,
    ) -> Self {
        let scanner = LocalScanner::new(classifier);
        let engine = MirrorEngine::new(scanner.clone(), Arc::clone(&store), config.mirror_options());
        Self {
            local_root: config.local_root.clone(),
            remote_root: config.remote_root.clone(),
            pattern: config.candidate_pattern.clone(),
            op_timeout: config.op_timeout,
            scanner,
            store,
            engine,
        }
    }

    /// Local candidates that the remote root does not have yet.
    pub async fn pending(&self, cancel: &CancellationToken) -> Result<Vec<String>, ProcessError> {
        if !self.local_root.is_dir() {
            return Err(ProcessError::LocalRootMissing(self.local_root.clone()));
        }
        let local = self.scanner.scan_candidates(&self.local_root, &self.pattern)?;

        let remote: BTreeMap<String, RemoteDirectoryId> = bounded(
            cancel,
            self.op_timeout,
            self.store
                .list_child_directories(&self.remote_root, Some(&self.pattern)),
        )
        .await
        .map_err(|err| match err {
            RemoteError::Cancelled => ProcessError::Cancelled,
            err => ProcessError::RemoteList(err),
        })?;
        tracing::info!(
            remote_root = %self.remote_root,
            count = remote.len(),
            "found remote candidate directories"
        );

        Ok(diff(&local, &remote))
    }

    /// Mirrors every pending directory the policy picks, in the order it
    /// picks them. Failures of one sub-tree do not stop the others;
    /// cancellation does.
    pub async fn process<P>(
        &self,
        selection: &mut P,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ProcessError>
    where
        P: SelectionPolicy + ?Sized,
    {
        let started = Instant::now();
        let pending = self.pending(cancel).await?;
        let mut summary = RunSummary {
            selected: sanitize_selection(selection.select(&pending), &pending),
            pending,
            ..RunSummary::default()
        };
        if summary.selected.is_empty() {
            tracing::info!("nothing selected for upload");
        }

        for name in &summary.selected {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let dir_started = Instant::now();
            let local = self.local_root.join(name);
            let result = self.engine.mirror(&local, &self.remote_root, cancel).await;
            let elapsed = dir_started.elapsed();

            let outcome = match result {
                Ok(report) => {
                    tracing::info!(
                        %name,
                        created = report.directories_created,
                        reused = report.directories_reused,
                        uploaded = report.files_uploaded,
                        skipped = report.files_skipped,
                        failed = report.failures.len(),
                        ?elapsed,
                        "mirrored directory"
                    );
                    let status = if report.is_complete() {
                        SubtreeStatus::Mirrored
                    } else {
                        SubtreeStatus::Partial {
                            failures: report.failures.len(),
                        }
                    };
                    SubtreeOutcome {
                        name: name.clone(),
                        status,
                        report: Some(report),
                        elapsed,
                    }
                }
                Err(err) => {
                    tracing::warn!(%name, %err, ?elapsed, "directory not mirrored");
                    summary.cancelled = matches!(err, MirrorError::Cancelled);
                    SubtreeOutcome {
                        name: name.clone(),
                        status: SubtreeStatus::Failed {
                            error: err.to_string(),
                        },
                        report: None,
                        elapsed,
                    }
                }
            };
            summary.outcomes.push(outcome);
            if summary.cancelled {
                break;
            }
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            directories = summary.outcomes.len(),
            files = summary.files_uploaded(),
            elapsed = ?summary.elapsed,
            cancelled = summary.cancelled,
            "run finished"
        );
        Ok(summary)
    }
}

/// Keeps only pending names, first occurrence wins.
fn sanitize_selection(selected: Vec<String>, pending: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    selected
        .into_iter()
        .filter(|name| {
            if !pending.contains(name) {
                tracing::warn!(%name, "selected directory is not pending; ignoring");
                return false;
            }
            seen.insert(name.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn sanitize_drops_unknown_and_duplicate_names() {
        let pending = names(&["a", "b", "c"]);
        let picked = sanitize_selection(names(&["c", "x", "a", "c"]), &pending);
        assert_eq!(picked, names(&["c", "a"]));
    }

    #[test]
    fn status_display_distinguishes_outcomes() {
        assert_eq!(SubtreeStatus::Mirrored.to_string(), "mirrored");
        assert_eq!(
            SubtreeStatus::Partial { failures: 2 }.to_string(),
            "partially mirrored (2 file failures)"
        );
        assert_eq!(
            SubtreeStatus::Failed {
                error: "boom".into()
            }
            .to_string(),
            "failed: boom"
        );
    }

    #[test]
    fn summary_success_requires_every_outcome_mirrored() {
        let mut summary = RunSummary::default();
        assert!(summary.is_success());
        summary.outcomes.push(SubtreeOutcome {
            name: "a".into(),
            status: SubtreeStatus::Partial { failures: 1 },
            report: None,
            elapsed: Duration::ZERO,
        });
        assert!(!summary.is_success());
    }
}
