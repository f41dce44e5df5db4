use std::path::Path;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net";
const RESOURCES_ENDPOINT: &str = "/v1/disk/resources";
const UPLOAD_ENDPOINT: &str = "/v1/disk/resources/upload";

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("api response missing embedded items")]
    MissingEmbedded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    NotFound,
    Conflict,
    RateLimit,
    Transient,
    Permanent,
}

/// Thin client over the handful of Yandex Disk endpoints the uploader needs.
///
/// Paths are passed through verbatim (`disk:/Photos/2023-trip`), the API
/// accepts both the `disk:` scheme and plain absolute paths.
#[derive(Clone)]
pub struct DiskClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DiskClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DiskError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DiskError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn list_directory_page(
        &self,
        path: &str,
        limit: u32,
        offset: u32,
    ) -> Result<ResourceList, DiskError> {
        let mut url = self.endpoint(RESOURCES_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let payload: ResourceListResponse = self.send_json(self.http.get(url)).await?;
        payload.embedded.ok_or(DiskError::MissingEmbedded)
    }

    /// Walks every page of a directory listing.
    pub async fn list_directory_all(
        &self,
        path: &str,
        page_size: u32,
    ) -> Result<Vec<Resource>, DiskError> {
        let page_size = page_size.max(1);
        let mut offset = 0u32;
        let mut items = Vec::new();
        loop {
            let page = self.list_directory_page(path, page_size, offset).await?;
            let received = page.items.len() as u32;
            offset = offset.saturating_add(received);
            let total = page.total;
            items.extend(page.items);
            if received == 0 || offset >= total {
                break;
            }
        }
        Ok(items)
    }

    /// Creates a single folder. Both an existing folder at `path` and a
    /// missing parent come back as HTTP 409; [`DiskError::classification`]
    /// tells them apart.
    pub async fn create_folder(&self, path: &str) -> Result<Link, DiskError> {
        let mut url = self.endpoint(RESOURCES_ENDPOINT)?;
        url.query_pairs_mut().append_pair("path", path);
        self.send_json(self.http.put(url)).await
    }

    pub async fn get_upload_link(&self, path: &str, overwrite: bool) -> Result<Link, DiskError> {
        let mut url = self.endpoint(UPLOAD_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("overwrite", if overwrite { "true" } else { "false" });
        self.send_json(self.http.get(url)).await
    }

    /// Streams a local file to an upload link. Upload hrefs are pre-signed,
    /// so no authorization header is attached.
    pub async fn upload_from_path(&self, link: &Link, source: &Path) -> Result<(), DiskError> {
        let file = tokio::fs::File::open(source).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let request = match link.method.to_ascii_uppercase().as_str() {
            "POST" => self.http.post(link.href.clone()),
            _ => self.http.put(link.href.clone()),
        };
        let response = request.body(body).send().await?;
        if response.status().is_success() {
            tracing::trace!(href = %link.href, status = %response.status(), "upload accepted");
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    fn auth_header_value(&self) -> String {
        format!("OAuth {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DiskError> {
        Ok(self.base_url.join(path)?)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, DiskError> {
        let response = request
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: reqwest::Response) -> DiskError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        DiskError::Api { status, body }
    }
}

impl DiskError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DiskError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DiskError::Api { status, body } => Some(classify_api_error(*status, body)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DiskError::Request(err) => err.is_timeout() || err.is_connect(),
            _ => matches!(
                self.classification(),
                Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
            ),
        }
    }
}

const PARENT_MISSING_CODE: &str = "DiskPathDoesntExistsError";

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
}

fn api_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body).ok()?.error
}

// A 409 is a name clash unless the body says the parent path is missing.
// Neither is transient.
fn classify_api_error(status: StatusCode, body: &str) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::NOT_FOUND {
        ApiErrorClass::NotFound
    } else if status == StatusCode::CONFLICT {
        if api_error_code(body).as_deref() == Some(PARENT_MISSING_CODE) {
            ApiErrorClass::NotFound
        } else {
            ApiErrorClass::Conflict
        }
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_EARLY)
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Resource {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResourceList {
    pub items: Vec<Resource>,
    pub limit: u32,
    pub offset: u32,
    pub total: u32,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResourceListResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<ResourceList>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Link {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub templated: bool,
}
