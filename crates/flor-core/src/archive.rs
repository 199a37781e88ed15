//! Release archive download and checksums.
//!
//! Recipes pin their source archive by md5 and sha256. Archives are kept in
//! a tar directory and their digests in `checksums.json` beside them, so a
//! rerun with the same `--tar-archive-dir` neither downloads nor hashes
//! again.

use crate::naming::archive_file_name;
use crate::retry::{RetryConfig, retry_on_error};
use crate::Reporter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

const CACHE_FILE: &str = "checksums.json";

/// Digests of a source archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveChecksums {
    pub md5: String,
    pub sha256: String,
}

impl ArchiveChecksums {
    /// Hash `bytes` with both algorithms.
    pub fn compute(bytes: &[u8]) -> Self {
        Self {
            md5: format!("{:x}", md5::compute(bytes)),
            sha256: hex::encode(Sha256::digest(bytes)),
        }
    }
}

/// A single cached digest pair persisted to disk.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CachedEntry {
    pub md5: String,
    pub sha256: String,
    /// UNIX epoch timestamp of when this entry was cached.
    pub timestamp: u64,
}

/// Archive file name -> digests.
#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
pub struct ChecksumCache {
    pub entries: HashMap<String, CachedEntry>,
}

impl ChecksumCache {
    /// Load the cache from `dir/checksums.json`.
    ///
    /// Returns an empty cache if the file does not exist or cannot be parsed.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CACHE_FILE);
        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(cache) = serde_json::from_str(&content) {
                    return cache;
                }
                tracing::warn!("ignoring unreadable checksum cache {}", path.display());
            }
        }
        Self::default()
    }

    /// Persist the cache to `dir/checksums.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(CACHE_FILE), content)?;
        Ok(())
    }

    pub fn get(&self, file_name: &str) -> Option<ArchiveChecksums> {
        self.entries.get(file_name).map(|e| ArchiveChecksums {
            md5: e.md5.clone(),
            sha256: e.sha256.clone(),
        })
    }

    pub fn insert(&mut self, file_name: String, sums: &ArchiveChecksums) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        self.entries.insert(
            file_name,
            CachedEntry {
                md5: sums.md5.clone(),
                sha256: sums.sha256.clone(),
                timestamp,
            },
        );
    }
}

/// The archive of one released package.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveRequest<'a> {
    pub package: &'a str,
    pub version: &'a str,
    pub distro: &'a str,
    pub url: &'a str,
}

impl ArchiveRequest<'_> {
    pub fn file_name(&self) -> String {
        archive_file_name(self.package, self.version, self.distro)
    }
}

#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn checksums(&self, request: ArchiveRequest<'_>) -> Result<ArchiveChecksums>;
}

/// Downloads archives over HTTP into a tar directory.
pub struct HttpArchives {
    client: Client,
    dir: PathBuf,
    // keeps a temporary tar directory alive
    _temp: Option<TempDir>,
    cache: Mutex<ChecksumCache>,
    retry: RetryConfig,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for HttpArchives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpArchives")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl HttpArchives {
    /// Use `dir` as the tar directory, or a temporary one when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(client: Client, dir: Option<&Path>, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let (dir, temp) = match dir {
            Some(dir) => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                (dir.to_path_buf(), None)
            }
            None => {
                let temp = tempfile::Builder::new().prefix("flor-tar-").tempdir()?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };
        Ok(Self {
            client,
            cache: Mutex::new(ChecksumCache::load(&dir)),
            dir,
            _temp: temp,
            retry: RetryConfig::default(),
            reporter,
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the checksum cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub async fn save(&self) -> Result<()> {
        self.cache.lock().await.save(&self.dir)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let bytes = retry_on_error(
            &self.retry,
            self.reporter.as_ref(),
            "Retrying archive download",
            "Failed to download archive",
            || async {
                self.client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await
            },
        )
        .await
        .with_context(|| format!("Failed to download {url}"))?;
        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(())
    }
}

#[async_trait]
impl ArchiveSource for HttpArchives {
    async fn checksums(&self, request: ArchiveRequest<'_>) -> Result<ArchiveChecksums> {
        let file_name = request.file_name();
        if let Some(sums) = self.cache.lock().await.get(&file_name) {
            return Ok(sums);
        }

        let path = self.dir.join(&file_name);
        if path.exists() {
            self.reporter.info(&format!(
                "using cached archive for package '{}'...",
                request.package
            ));
        } else {
            self.reporter.info(&format!(
                "downloading archive version for package '{}' from {}...",
                request.package, request.url
            ));
            self.download(request.url, &path).await?;
        }

        let bytes = tokio::fs::read(&path).await?;
        let sums = ArchiveChecksums::compute(&bytes);
        self.cache.lock().await.insert(file_name, &sums);
        Ok(sums)
    }
}
