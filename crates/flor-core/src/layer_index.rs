//! OpenEmbedded layer index lookup.
//!
//! Queried for rosdep keys that have no OpenEmbedded rule, in the hope that
//! some layer already ships a recipe under the converted name.

use crate::resolver::{RecipeLookup, RecipeMatch};
use crate::retry::{RetryConfig, retry_on_error};
use crate::Reporter;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RecipeRecord {
    pn: String,
    #[serde(default)]
    layerbranch: serde_json::Value,
}

pub struct LayerIndex {
    client: Client,
    base_url: String,
    retry: RetryConfig,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for LayerIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerIndex")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LayerIndex {
    pub fn new(client: Client, base_url: &str, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
            reporter,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self, name: &str) -> Result<Vec<RecipeRecord>, reqwest::Error> {
        let url = format!("{}/layerindex/api/recipes/", self.base_url);
        self.client
            .get(&url)
            .query(&[("filter", format!("pn:{name}"))])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

fn layer_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RecipeLookup for LayerIndex {
    async fn query_recipe(&self, name: &str) -> Result<Option<RecipeMatch>> {
        let records = retry_on_error(
            &self.retry,
            self.reporter.as_ref(),
            "Retrying layer index query",
            "Failed to query layer index",
            || self.fetch(name),
        )
        .await?;
        Ok(records.into_iter().next().map(|r| RecipeMatch {
            name: r.pn,
            layer: layer_label(&r.layerbranch),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn index(server: &Server) -> LayerIndex {
        LayerIndex::new(Client::new(), &server.url(), Arc::new(crate::NullReporter)).with_retry(
            RetryConfig {
                max_retries: 1,
                initial_delay: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn test_query_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/layerindex/api/recipes/")
            .match_query(Matcher::UrlEncoded("filter".into(), "pn:libusb1".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"[{"pn": "libusb1", "pv": "1.0.26", "layerbranch": 12}]"#)
            .create_async()
            .await;

        let found = index(&server).query_recipe("libusb1").await.unwrap();
        assert_eq!(
            found,
            Some(RecipeMatch {
                name: "libusb1".to_string(),
                layer: "12".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_query_missing() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/layerindex/api/recipes/")
            .match_query(Matcher::Any)
            .with_body("[]")
            .create_async()
            .await;
        assert_eq!(index(&server).query_recipe("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_query_server_error() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/layerindex/api/recipes/")
            .match_query(Matcher::Any)
            .with_status(500)
            .expect(2)
            .create_async()
            .await;
        assert!(index(&server).query_recipe("boom").await.is_err());
        m.assert_async().await;
    }
}
