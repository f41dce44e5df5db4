use std::collections::BTreeMap;
use std::path::Path;

use albumsync_disk::{ApiErrorClass, DiskClient, DiskError, ResourceType};
use async_trait::async_trait;

use super::retry::RetryPolicy;
use super::{RemoteDirectoryId, RemoteError, RemoteFileId, RemoteStore, validate_name};
use crate::classify::ContentKind;
use crate::pattern::NamePattern;

const LIST_PAGE_SIZE: u32 = 100;

/// [`RemoteStore`] backed by Yandex Disk. Directory ids are remote paths
/// such as `disk:/Photos/2023-trip`.
#[derive(Clone)]
pub struct YandexStore {
    client: DiskClient,
    retry: RetryPolicy,
}

impl YandexStore {
    pub fn new(client: DiskClient) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

pub fn child_path(parent: &RemoteDirectoryId, name: &str) -> String {
    format!("{}/{name}", parent.as_str().trim_end_matches('/'))
}

fn map_error(err: DiskError, path: &str, name: &str) -> RemoteError {
    match err {
        DiskError::Io(io) => RemoteError::Io(io),
        err => match err.classification() {
            Some(ApiErrorClass::Conflict) => RemoteError::AlreadyExists {
                name: name.to_string(),
            },
            Some(ApiErrorClass::NotFound) => RemoteError::NotFound(path.to_string()),
            Some(ApiErrorClass::Auth) => RemoteError::Auth(err.to_string()),
            _ => RemoteError::Api(err),
        },
    }
}

#[async_trait]
impl RemoteStore for YandexStore {
    async fn list_child_directories(
        &self,
        parent: &RemoteDirectoryId,
        filter: Option<&NamePattern>,
    ) -> Result<BTreeMap<String, RemoteDirectoryId>, RemoteError> {
        let path = parent.as_str();
        let items = self
            .retry
            .run("list", || {
                self.client.list_directory_all(path, LIST_PAGE_SIZE)
            })
            .await
            .map_err(|err| map_error(err, path, path))?;

        Ok(items
            .into_iter()
            .filter(|item| item.resource_type == ResourceType::Dir)
            .filter(|item| filter.is_none_or(|pattern| pattern.matches(&item.name)))
            .map(|item| (item.name, RemoteDirectoryId::new(item.path)))
            .collect())
    }

    async fn create_directory(
        &self,
        name: &str,
        parent: &RemoteDirectoryId,
    ) -> Result<RemoteDirectoryId, RemoteError> {
        validate_name(name)?;
        let path = child_path(parent, name);
        self.retry.run("mkdir", || self.client.create_folder(&path))
            .await
            .map_err(|err| map_error(err, &path, name))?;
        tracing::debug!(%path, "created remote folder");
        Ok(RemoteDirectoryId::new(path))
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        kind: ContentKind,
        parent: &RemoteDirectoryId,
    ) -> Result<RemoteFileId, RemoteError> {
        let name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RemoteError::InvalidName(local_path.display().to_string()))?;
        validate_name(name)?;
        let path = child_path(parent, name);
        let client = &self.client;
        let remote_path = path.as_str();
        self.retry.run("upload", || async move {
            let link = client.get_upload_link(remote_path, false).await?;
            client.upload_from_path(&link, local_path).await
        })
        .await
        .map_err(|err| map_error(err, &path, name))?;
        tracing::debug!(%path, %kind, "uploaded file");
        Ok(RemoteFileId::new(path))
    }
}
