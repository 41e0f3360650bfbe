//! External public-book search.
//!
//! Queries the Open Library search endpoint (keyless) for book records that
//! are not part of the local catalog. Failures of any kind degrade to an
//! empty contribution so a listing never breaks on the external source.

use crate::config::SearchConfig;
use serde::Deserialize;
use std::time::Duration;

/// Non-persistent book record from the public search source.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PublicBook {
    /// Synthetic ID ("ol:" followed by the source key).
    pub id: String,
    /// Book title.
    pub title: String,
    /// Primary author.
    pub author: String,
    /// First publication year.
    pub publication_year: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    key: String,
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    first_publish_year: Option<i64>,
}

/// Client for the public search source.
#[derive(Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    endpoint: String,
    limit: usize,
    enabled: bool,
}

impl SearchClient {
    /// Create a client from configuration.
    pub fn new(config: &SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: config.endpoint.clone(),
            limit: config.limit,
            enabled: config.enabled,
        }
    }

    /// Whether the external source is queried at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Search public books matching the given text.
    ///
    /// Returns an empty vector when disabled, on transport failure, or on an
    /// undecodable response.
    pub async fn search(&self, text: &str) -> Vec<PublicBook> {
        if !self.enabled || text.trim().is_empty() {
            return Vec::new();
        }

        let url = format!(
            "{}?q={}&limit={}",
            self.endpoint,
            urlencoding::encode(text),
            self.limit
        );

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "Public search request failed");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Public search returned error status");
            return Vec::new();
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(error = %e, "Public search response not decodable");
                return Vec::new();
            }
        };

        parsed
            .docs
            .into_iter()
            .filter_map(|doc| {
                let title = doc.title?;
                Some(PublicBook {
                    id: format!("ol:{}", doc.key.trim_start_matches('/')),
                    title,
                    author: doc
                        .author_name
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "Unknown".to_string()),
                    publication_year: doc.first_publish_year,
                })
            })
            .take(self.limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_client_returns_empty() {
        let client = SearchClient::new(&SearchConfig {
            enabled: false,
            endpoint: "http://127.0.0.1:1/search.json".to_string(),
            limit: 5,
        });

        let results = tokio_test::block_on(client.search("dune"));
        assert!(results.is_empty());
    }

    #[test]
    fn unreachable_endpoint_degrades_to_empty() {
        let client = SearchClient::new(&SearchConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:1/search.json".to_string(),
            limit: 5,
        });

        let results = tokio_test::block_on(client.search("dune"));
        assert!(results.is_empty());
    }

    #[test]
    fn blank_query_skips_the_source() {
        let client = SearchClient::new(&SearchConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:1/search.json".to_string(),
            limit: 5,
        });

        let results = tokio_test::block_on(client.search("   "));
        assert!(results.is_empty());
    }

    #[test]
    fn response_docs_map_to_public_books() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{"docs": [
                {"key": "/works/OL1W", "title": "Dune", "author_name": ["Frank Herbert"], "first_publish_year": 1965},
                {"key": "/works/OL2W", "author_name": ["No Title"]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(parsed.docs.len(), 2);
        assert_eq!(parsed.docs[0].title.as_deref(), Some("Dune"));
        assert_eq!(parsed.docs[0].first_publish_year, Some(1965));
        // Docs without a title are dropped during mapping
        assert!(parsed.docs[1].title.is_none());
    }
}
