//! Provider trait and query/result records.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Optional query constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Restrict to these engines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_engines: Vec<String>,
    /// Restrict to these categories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_categories: Vec<String>,
    /// Restrict to a time range (e.g. `day`, `week`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_time_range: Option<String>,
}

impl SearchParams {
    /// Creates empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts engines.
    #[must_use]
    pub fn with_engines(mut self, engines: Vec<String>) -> Self {
        self.search_engines = engines;
        self
    }

    /// Restricts categories.
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.search_categories = categories;
        self
    }

    /// Restricts the time range.
    #[must_use]
    pub fn with_time_range(mut self, range: impl Into<String>) -> Self {
        self.search_time_range = Some(range.into());
        self
    }

    /// Returns true if no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.search_engines.is_empty()
            && self.search_categories.is_empty()
            && self.search_time_range.is_none()
    }

    /// Returns the same constraints without the engine restriction.
    #[must_use]
    pub fn without_engines(&self) -> Self {
        Self {
            search_engines: Vec::new(),
            ..self.clone()
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Text excerpt.
    #[serde(default)]
    pub content: String,
    /// Relevance score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Engine that produced the hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Category of the hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SearchResultItem {
    /// Creates a hit.
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
            score: None,
            engine: None,
            category: None,
        }
    }
}

/// A provider's answer to one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// The query as executed.
    pub query: String,
    /// Hits, best first.
    #[serde(default)]
    pub results: Vec<SearchResultItem>,
    /// Provider-reported latency.
    #[serde(default)]
    pub cost_time_ms: u64,
}

impl SearchResponse {
    /// Returns true if there are no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// A search backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name, used in logs.
    fn name(&self) -> &str;

    /// Runs one query.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn query(&self, query: &str, params: &SearchParams) -> Result<SearchResponse>;
}
