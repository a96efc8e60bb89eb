//! Web-search collaborator.
//!
//! The backfill step needs one keyword search per pipeline run. The
//! [`WebSearch`] trait returns the results as a flat text blob — the caller
//! feeds it straight into a model prompt, so structure beyond
//! title/link/snippet lines would be wasted.
//!
//! The production client is [`SerpApiSearch`], which queries SerpAPI's
//! Google engine. Requires the `SERPAPI_API_KEY` environment variable.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::WebSearchConfig;

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Run a keyword query and return the results as readable text.
    async fn search(&self, query: &str) -> Result<String>;
}

pub struct SerpApiSearch {
    engine: String,
    client: reqwest::Client,
}

impl SerpApiSearch {
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        if std::env::var("SERPAPI_API_KEY").is_err() {
            bail!("SERPAPI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            engine: config.engine.clone(),
            client,
        })
    }
}

#[async_trait]
impl WebSearch for SerpApiSearch {
    async fn search(&self, query: &str) -> Result<String> {
        let api_key = std::env::var("SERPAPI_API_KEY")
            .map_err(|_| anyhow::anyhow!("SERPAPI_API_KEY not set"))?;

        let response = self
            .client
            .get("https://serpapi.com/search")
            .query(&[
                ("engine", self.engine.as_str()),
                ("q", query),
                ("api_key", api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("SerpAPI error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        Ok(flatten_results(&json))
    }
}

/// Flatten `organic_results` into "title / link / snippet" text blocks.
///
/// Unknown or partial entries are kept with whatever fields they carry;
/// an empty result set yields an empty string.
fn flatten_results(json: &serde_json::Value) -> String {
    let Some(results) = json.get("organic_results").and_then(|r| r.as_array()) else {
        return String::new();
    };

    let mut blob = String::new();
    for result in results {
        let title = result.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let link = result.get("link").and_then(|v| v.as_str()).unwrap_or("");
        let snippet = result.get("snippet").and_then(|v| v.as_str()).unwrap_or("");

        if title.is_empty() && link.is_empty() && snippet.is_empty() {
            continue;
        }

        if !blob.is_empty() {
            blob.push_str("\n\n");
        }
        blob.push_str(title);
        if !link.is_empty() {
            blob.push('\n');
            blob.push_str(link);
        }
        if !snippet.is_empty() {
            blob.push('\n');
            blob.push_str(snippet);
        }
    }

    blob
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_results() {
        let json = serde_json::json!({
            "organic_results": [
                { "title": "Pequod's Pizza", "link": "https://pequodspizza.com", "snippet": "Deep dish." },
                { "title": "Lou Malnati's", "link": "https://www.loumalnatis.com" }
            ]
        });
        let blob = flatten_results(&json);
        assert!(blob.contains("Pequod's Pizza"));
        assert!(blob.contains("https://pequodspizza.com"));
        assert!(blob.contains("Deep dish."));
        assert!(blob.contains("Lou Malnati's"));
    }

    #[test]
    fn test_flatten_results_missing_section() {
        let json = serde_json::json!({ "search_metadata": {} });
        assert_eq!(flatten_results(&json), "");
    }
}
