//! HTTP client for the rosdistro index and distribution caches.

use super::IndexSource;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flor_schema::{DistributionCache, IndexFile};
use reqwest::Client;
use std::io::Read;
use tokio::sync::OnceCell;

#[derive(Debug)]
pub struct HttpIndex {
    client: Client,
    index_url: String,
    index: OnceCell<IndexFile>,
}

impl HttpIndex {
    pub fn new(client: Client, index_url: &str) -> Self {
        Self {
            client,
            index_url: index_url.to_string(),
            index: OnceCell::new(),
        }
    }

    /// URL of the distribution cache of `distro`, resolved against the index.
    async fn cache_url(&self, distro: &str) -> Result<String> {
        let index = self.index().await?;
        let entry = index
            .distributions
            .get(distro)
            .ok_or_else(|| anyhow!("Distro '{distro}' is not in the rosdistro index"))?;
        let url = entry
            .distribution_cache
            .as_deref()
            .ok_or_else(|| anyhow!("Distro '{distro}' has no distribution_cache"))?;
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        let base = self
            .index_url
            .rsplit_once('/')
            .map_or(self.index_url.as_str(), |(base, _)| base);
        Ok(format!("{base}/{url}"))
    }
}

fn gunzip(bytes: &[u8]) -> Result<String> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .context("Failed to decompress distribution cache")?;
    Ok(text)
}

/// Convert an HTTP date to the compact UTC stamp written into the distro conf.
pub fn format_http_date(value: &str) -> Result<String> {
    let ts = DateTime::parse_from_rfc2822(value)
        .with_context(|| format!("Invalid Last-Modified header '{value}'"))?;
    Ok(ts.with_timezone(&Utc).format("%Y%m%d%H%M%S").to_string())
}

#[async_trait]
impl IndexSource for HttpIndex {
    async fn index(&self) -> Result<IndexFile> {
        let index = self
            .index
            .get_or_try_init(|| async {
                tracing::debug!("fetching rosdistro index {}", self.index_url);
                let text = self
                    .client
                    .get(&self.index_url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                IndexFile::parse(&text).context("Failed to parse rosdistro index")
            })
            .await?;
        Ok(index.clone())
    }

    async fn distribution_cache(&self, distro: &str) -> Result<(String, DistributionCache)> {
        let url = self.cache_url(distro).await?;
        tracing::debug!("fetching distribution cache {url}");
        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let text = if url.ends_with(".gz") {
            gunzip(&bytes)?
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };
        let cache = DistributionCache::parse(&text)
            .with_context(|| format!("Failed to parse distribution cache for '{distro}'"))?;
        Ok((text, cache))
    }

    async fn cache_last_modified(&self, distro: &str) -> Result<String> {
        let url = self.cache_url(distro).await?;
        let resp = self.client.head(&url).send().await?.error_for_status()?;
        let value = resp
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("No Last-Modified header for {url}"))?;
        format_http_date(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use mockito::Server;
    use std::io::Write;

    const INDEX: &str = r#"
type: index
version: 4
distributions:
  humble:
    distribution: [humble/distribution.yaml]
    distribution_cache: humble-cache.yaml.gz
    distribution_status: active
    distribution_type: ros2
  noetic:
    distribution: [noetic/distribution.yaml]
    distribution_cache: http://example.invalid/noetic-cache.yaml.gz
    distribution_status: end-of-life
    distribution_type: ros1
"#;

    const CACHE: &str = r#"
name: humble
type: cache
version: 2
distribution_file:
- release_platforms:
    ubuntu: [jammy]
  repositories:
    rcutils:
      release:
        tags: {release: 'release/humble/{package}/{version}'}
        url: https://github.com/ros2-gbp/rcutils-release.git
        version: 5.1.3-1
release_package_xmls:
  rcutils: <package><name>rcutils</name></package>
"#;

    fn gz(text: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    #[tokio::test]
    async fn test_index_and_cache() {
        let mut server = Server::new_async().await;
        let index_mock = server
            .mock("GET", "/index-v4.yaml")
            .with_body(INDEX)
            .expect(1)
            .create_async()
            .await;
        let _cache = server
            .mock("GET", "/humble-cache.yaml.gz")
            .with_body(gz(CACHE))
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/humble-cache.yaml.gz")
            .with_header("last-modified", "Tue, 15 Oct 2024 08:30:05 GMT")
            .create_async()
            .await;

        let index = HttpIndex::new(Client::new(), &format!("{}/index-v4.yaml", server.url()));
        let parsed = index.index().await.unwrap();
        assert_eq!(parsed.distros_by_status("active"), vec!["humble"]);
        assert_eq!(parsed.ros_version("noetic"), 1);

        let (raw, cache) = index.distribution_cache("humble").await.unwrap();
        assert!(raw.contains("rcutils-release"));
        assert_eq!(cache.name, "humble");

        let stamp = index.cache_last_modified("humble").await.unwrap();
        assert_eq!(stamp, "20241015083005");

        // the index is fetched once and reused
        index_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_distro() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/index-v4.yaml")
            .with_body(INDEX)
            .create_async()
            .await;
        let index = HttpIndex::new(Client::new(), &format!("{}/index-v4.yaml", server.url()));
        assert!(index.distribution_cache("bouncy").await.is_err());
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(
            format_http_date("Wed, 01 Jan 2025 00:00:00 +0100").unwrap(),
            "20241231230000"
        );
        assert!(format_http_date("yesterday").is_err());
    }
}
