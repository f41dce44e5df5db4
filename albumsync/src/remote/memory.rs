use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RemoteDirectoryId, RemoteError, RemoteFileId, RemoteStore, validate_name};
use crate::classify::ContentKind;
use crate::pattern::NamePattern;

const ROOT_ID: &str = "mem:/";

#[derive(Debug, Default)]
struct MemoryDir {
    dirs: BTreeMap<String, RemoteDirectoryId>,
    files: BTreeMap<String, ContentKind>,
}

#[derive(Debug, Default)]
struct State {
    dirs: BTreeMap<RemoteDirectoryId, MemoryDir>,
    create_calls: usize,
    upload_calls: usize,
    failing_uploads: HashSet<String>,
    failing_dirs: HashSet<String>,
    unavailable: bool,
}

/// In-process store with the same "refuse duplicates" behaviour as the real
/// backend. Ids are slash-joined paths below `mem:/`.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut state = State::default();
        state.dirs.insert(Self::root(), MemoryDir::default());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn root() -> RemoteDirectoryId {
        RemoteDirectoryId::new(ROOT_ID)
    }

    /// Makes every upload of a file called `name` fail.
    pub fn fail_uploads_named(&self, name: &str) {
        self.lock().failing_uploads.insert(name.to_string());
    }

    /// Makes creation of directories called `name` fail.
    pub fn fail_directories_named(&self, name: &str) {
        self.lock().failing_dirs.insert(name.to_string());
    }

    /// Makes listing fail, as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn upload_calls(&self) -> usize {
        self.lock().upload_calls
    }

    /// Resolves a slash-separated path of directory names below the root.
    pub fn find_dir(&self, path: &str) -> Option<RemoteDirectoryId> {
        let state = self.lock();
        let mut current = Self::root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = state.dirs.get(&current)?.dirs.get(segment)?.clone();
        }
        Some(current)
    }

    pub fn dir_names(&self, id: &RemoteDirectoryId) -> Vec<String> {
        self.lock()
            .dirs
            .get(id)
            .map(|dir| dir.dirs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn file_names(&self, id: &RemoteDirectoryId) -> Vec<String> {
        self.lock()
            .dirs
            .get(id)
            .map(|dir| dir.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn total_dirs(&self) -> usize {
        // The root is not something the mirror created.
        self.lock().dirs.len() - 1
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_child_directories(
        &self,
        parent: &RemoteDirectoryId,
        filter: Option<&NamePattern>,
    ) -> Result<BTreeMap<String, RemoteDirectoryId>, RemoteError> {
        let state = self.lock();
        if state.unavailable {
            return Err(RemoteError::Unavailable("memory store offline".into()));
        }
        let dir = state
            .dirs
            .get(parent)
            .ok_or_else(|| RemoteError::NotFound(parent.to_string()))?;
        Ok(dir
            .dirs
            .iter()
            .filter(|(name, _)| filter.is_none_or(|pattern| pattern.matches(name)))
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect())
    }

    async fn create_directory(
        &self,
        name: &str,
        parent: &RemoteDirectoryId,
    ) -> Result<RemoteDirectoryId, RemoteError> {
        validate_name(name)?;
        let mut state = self.lock();
        state.create_calls += 1;
        if state.failing_dirs.contains(name) {
            return Err(RemoteError::Unavailable(format!("cannot create {name}")));
        }
        let id = RemoteDirectoryId::new(format!(
            "{}/{name}",
            parent.as_str().trim_end_matches('/')
        ));
        let parent_dir = state
            .dirs
            .get_mut(parent)
            .ok_or_else(|| RemoteError::NotFound(parent.to_string()))?;
        if parent_dir.dirs.contains_key(name) || parent_dir.files.contains_key(name) {
            return Err(RemoteError::AlreadyExists {
                name: name.to_string(),
            });
        }
        parent_dir.dirs.insert(name.to_string(), id.clone());
        state.dirs.insert(id.clone(), MemoryDir::default());
        Ok(id)
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        kind: ContentKind,
        parent: &RemoteDirectoryId,
    ) -> Result<RemoteFileId, RemoteError> {
        let name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        validate_name(&name)?;
        // Mirrors the real backend: the file has to be readable.
        std::fs::metadata(local_path)?;

        let mut state = self.lock();
        state.upload_calls += 1;
        if state.failing_uploads.contains(&name) {
            return Err(RemoteError::Unavailable(format!("upload of {name} refused")));
        }
        let parent_dir = state
            .dirs
            .get_mut(parent)
            .ok_or_else(|| RemoteError::NotFound(parent.to_string()))?;
        if parent_dir.files.contains_key(&name) || parent_dir.dirs.contains_key(&name) {
            return Err(RemoteError::AlreadyExists { name });
        }
        parent_dir.files.insert(name.clone(), kind);
        Ok(RemoteFileId::new(format!(
            "{}/{name}",
            parent.as_str().trim_end_matches('/')
        )))
    }
}
