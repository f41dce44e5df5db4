use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use albumsync_disk::DiskError;
use async_trait::async_trait;
use thiserror::Error;

use crate::classify::ContentKind;
use crate::pattern::NamePattern;

pub mod memory;
pub mod retry;
pub mod yandex;

pub use memory::MemoryStore;
pub use yandex::YandexStore;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{name} already exists")]
    AlreadyExists { name: String },
    #[error("remote directory not found: {0}")]
    NotFound(String),
    #[error("not authorized: {0}")]
    Auth(String),
    #[error("invalid remote name: {0:?}")]
    InvalidName(String),
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("api error: {0}")]
    Api(#[source] DiskError),
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
}

impl RemoteError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RemoteError::AlreadyExists { .. })
    }
}

/// Opaque handle for a remote directory, only meaningful to the store that
/// issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteDirectoryId(String);

impl RemoteDirectoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteDirectoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteFileId(String);

impl RemoteFileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hierarchical storage the mirror writes into.
///
/// Stores are expected to refuse a second directory or file with the same
/// name under one parent by returning [`RemoteError::AlreadyExists`]; they
/// never overwrite.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Immediate child directories of `parent`, keyed by name. With a filter,
    /// only names it matches are returned.
    async fn list_child_directories(
        &self,
        parent: &RemoteDirectoryId,
        filter: Option<&NamePattern>,
    ) -> Result<BTreeMap<String, RemoteDirectoryId>, RemoteError>;

    async fn create_directory(
        &self,
        name: &str,
        parent: &RemoteDirectoryId,
    ) -> Result<RemoteDirectoryId, RemoteError>;

    async fn upload_file(
        &self,
        local_path: &Path,
        kind: ContentKind,
        parent: &RemoteDirectoryId,
    ) -> Result<RemoteFileId, RemoteError>;
}

/// Rejects names that cannot be a single path segment on any store.
pub fn validate_name(name: &str) -> Result<(), RemoteError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(RemoteError::InvalidName(name.to_string()));
    }
    Ok(())
}
