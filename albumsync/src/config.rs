use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::mirror::MirrorOptions;
use crate::pattern::NamePattern;
use crate::remote::RemoteDirectoryId;

const DEFAULT_LOCAL_ROOT_NAME: &str = "Pictures";
const DEFAULT_REMOTE_ROOT: &str = "disk:/Photos";
const DEFAULT_DIR_PATTERN: &str = r"\d{4}";
const DEFAULT_UPLOAD_CONCURRENCY: usize = 2;
const DEFAULT_OP_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory is unavailable")]
    NoHome,
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid directory pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// On-disk settings, all optional. YAML unless the file name ends in
/// `.json`.
///
/// ```yaml
/// local_photos_root: ~/Pictures
/// remote_photos_root: disk:/Photos
/// photo_dir_regex: '\d{4}'
/// ```
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    local_photos_root: Option<String>,
    remote_photos_root: Option<String>,
    photo_dir_regex: Option<String>,
    upload_concurrency: Option<usize>,
    op_timeout_secs: Option<u64>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            return serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            });
        }
        // An empty YAML document means "no settings".
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub local_root: PathBuf,
    pub remote_root: RemoteDirectoryId,
    pub candidate_pattern: NamePattern,
    pub upload_concurrency: usize,
    pub op_timeout: Duration,
}

impl MirrorConfig {
    /// Reads `ALBUMSYNC_*` variables, layered over the JSON file named by
    /// `ALBUMSYNC_CONFIG` when it is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        Self::resolve(|name| std::env::var(name).ok(), &home)
    }

    fn resolve<E>(env: E, home: &Path) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let file = match env("ALBUMSYNC_CONFIG") {
            Some(path) => FileConfig::load(&expand_with_home(&path, home))?,
            None => FileConfig::default(),
        };

        let local_root = env("ALBUMSYNC_LOCAL_ROOT")
            .or(file.local_photos_root)
            .map(|value| expand_with_home(&value, home))
            .unwrap_or_else(|| home.join(DEFAULT_LOCAL_ROOT_NAME));
        let remote_root = env("ALBUMSYNC_REMOTE_ROOT")
            .or(file.remote_photos_root)
            .unwrap_or_else(|| DEFAULT_REMOTE_ROOT.to_string());
        let pattern = env("ALBUMSYNC_DIR_PATTERN")
            .or(file.photo_dir_regex)
            .unwrap_or_else(|| DEFAULT_DIR_PATTERN.to_string());
        let candidate_pattern =
            NamePattern::new(&pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        let upload_concurrency = read_positive(&env, "ALBUMSYNC_UPLOAD_CONCURRENCY")
            .or(file.upload_concurrency.map(|v| v as u64))
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_UPLOAD_CONCURRENCY as u64) as usize;
        let op_timeout_secs = read_positive(&env, "ALBUMSYNC_OP_TIMEOUT_SECS")
            .or(file.op_timeout_secs)
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_OP_TIMEOUT_SECS);

        Ok(Self {
            local_root,
            remote_root: RemoteDirectoryId::new(remote_root),
            candidate_pattern,
            upload_concurrency,
            op_timeout: Duration::from_secs(op_timeout_secs),
        })
    }

    pub fn mirror_options(&self) -> MirrorOptions {
        MirrorOptions {
            upload_concurrency: self.upload_concurrency,
            op_timeout: self.op_timeout,
        }
    }
}

fn read_positive<E>(env: &E, name: &str) -> Option<u64>
where
    E: Fn(&str) -> Option<String>,
{
    env(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}
