//! Byte sources
//!
//! A `ByteSource` hands the cache the raw encoded bytes of a resource. The
//! cache owns decoding; sources only know where the bytes live.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::error::{MixlineError, Result};

/// Where encoded audio comes from
pub trait ByteSource {
    /// Fetch the full encoded bytes of `resource_id`
    ///
    /// Unknown ids are `ResourceNotFound`; transport failures are `FetchFailed`.
    fn fetch(&self, resource_id: &str) -> Result<Vec<u8>>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn fetch(&self, resource_id: &str) -> Result<Vec<u8>> {
        (**self).fetch(resource_id)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn fetch(&self, resource_id: &str) -> Result<Vec<u8>> {
        (**self).fetch(resource_id)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Resources held in memory, keyed by id
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    resources: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource_id: impl Into<String>, bytes: Vec<u8>) {
        self.resources.insert(resource_id.into(), bytes);
    }

    pub fn with(mut self, resource_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(resource_id, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ByteSource for MemorySource {
    fn fetch(&self, resource_id: &str) -> Result<Vec<u8>> {
        self.resources
            .get(resource_id)
            .cloned()
            .ok_or_else(|| MixlineError::ResourceNotFound {
                resource_id: resource_id.to_string(),
            })
    }
}

// ============================================================================
// Directory
// ============================================================================

/// Resources stored as files under a root directory
///
/// A resource id maps to `<root>/<id>` or `<root>/<id>.wav`. Ids may contain
/// `/` to reach nested folders but never escape the root.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    index: HashMap<String, PathBuf>,
}

impl DirectorySource {
    /// Source that resolves ids lazily against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: HashMap::new(),
        }
    }

    /// Walk `root` and index every `.wav` file by its relative id
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut index = HashMap::new();

        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|e| MixlineError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_wav = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false);
            if !is_wav {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&root) {
                let id = relative.with_extension("").to_string_lossy().replace('\\', "/");
                index.insert(id, path.to_path_buf());
            }
        }

        debug!("[DirectorySource] indexed {} files under {}", index.len(), root.display());
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ids found by `scan`, sorted
    pub fn resource_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.index.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn locate(&self, resource_id: &str) -> Option<PathBuf> {
        if let Some(path) = self.index.get(resource_id) {
            return Some(path.clone());
        }

        let relative = Path::new(resource_id);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return None;
        }

        let exact = self.root.join(relative);
        if exact.is_file() {
            return Some(exact);
        }
        let with_ext = self.root.join(format!("{}.wav", resource_id));
        with_ext.is_file().then_some(with_ext)
    }
}

impl ByteSource for DirectorySource {
    fn fetch(&self, resource_id: &str) -> Result<Vec<u8>> {
        let path = self
            .locate(resource_id)
            .ok_or_else(|| MixlineError::ResourceNotFound {
                resource_id: resource_id.to_string(),
            })?;

        std::fs::read(&path).map_err(|e| MixlineError::FetchFailed {
            resource_id: resource_id.to_string(),
            reason: format!("cannot read {}", path.display()),
            source: Some(Box::new(e)),
        })
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Resources served by the audio API at `GET {base}/api/audio/{id}`
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    timeout_ms: u64,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpSource {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| MixlineError::InvalidConfig {
                reason: format!("cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_ms,
            client,
        })
    }

    pub fn url_for(&self, resource_id: &str) -> String {
        format!("{}/api/audio/{}", self.base_url, resource_id)
    }
}

#[cfg(feature = "remote")]
impl ByteSource for HttpSource {
    fn fetch(&self, resource_id: &str) -> Result<Vec<u8>> {
        let url = self.url_for(resource_id);
        tracing::debug!(%url, "fetching audio resource");

        let response = self.client.get(&url).send().map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}ms", self.timeout_ms)
            } else if e.is_connect() {
                format!("cannot connect to {}", self.base_url)
            } else {
                "request failed".to_string()
            };
            tracing::warn!(resource_id, %reason, "audio fetch failed");
            MixlineError::FetchFailed {
                resource_id: resource_id.to_string(),
                reason,
                source: Some(Box::new(e)),
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MixlineError::ResourceNotFound {
                resource_id: resource_id.to_string(),
            });
        }
        if !status.is_success() {
            tracing::warn!(resource_id, %status, "audio API returned an error");
            return Err(MixlineError::fetch_failed(
                resource_id,
                format!("server returned {}", status),
            ));
        }

        let bytes = response.bytes().map_err(|e| MixlineError::FetchFailed {
            resource_id: resource_id.to_string(),
            reason: "body read failed".to_string(),
            source: Some(Box::new(e)),
        })?;
        tracing::debug!(resource_id, len = bytes.len(), "audio resource fetched");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with("a", vec![1, 2, 3]);
        assert_eq!(source.fetch("a").unwrap(), vec![1, 2, 3]);
        assert_eq!(source.fetch("b").unwrap_err().error_code(), "RESOURCE_NOT_FOUND");
    }

    #[test]
    fn test_directory_source_lazy_lookup() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("kick.wav"), b"kick").unwrap();
        fs::write(dir.path().join("raw"), b"raw").unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.fetch("kick").unwrap(), b"kick");
        assert_eq!(source.fetch("kick.wav").unwrap(), b"kick");
        assert_eq!(source.fetch("raw").unwrap(), b"raw");
        assert!(source.fetch("snare").is_err());
    }

    #[test]
    fn test_directory_source_scan_nested() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("stems")).unwrap();
        fs::write(dir.path().join("stems").join("bass.WAV"), b"bass").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let source = DirectorySource::scan(dir.path()).unwrap();
        assert_eq!(source.resource_ids(), vec!["stems/bass"]);
        assert_eq!(source.fetch("stems/bass").unwrap(), b"bass");
    }

    #[test]
    fn test_directory_source_stays_inside_root() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("inner");
        fs::create_dir(&inner).unwrap();
        fs::write(dir.path().join("secret.wav"), b"secret").unwrap();

        let source = DirectorySource::new(&inner);
        assert_eq!(
            source.fetch("../secret").unwrap_err().error_code(),
            "RESOURCE_NOT_FOUND"
        );
    }

    #[test]
    fn test_boxed_source() {
        let source: Box<dyn ByteSource> = Box::new(MemorySource::new().with("a", vec![7]));
        assert_eq!(source.fetch("a").unwrap(), vec![7]);
    }
}
