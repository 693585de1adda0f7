//! Query with progressively relaxed constraints.

use super::provider::{SearchParams, SearchProvider, SearchResponse};
use crate::errors::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Wraps a provider with the empty-result fallback policy.
///
/// 1. query with the requested parameters
/// 2. if empty and engines were restricted, drop the engine restriction
/// 3. if still empty, query with no parameters at all
///
/// At most three calls are made. A request that already carries no
/// parameters is sent once.
#[derive(Clone)]
pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl SearchService {
    /// Creates a service over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Runs `query`, relaxing constraints while the result set is empty.
    ///
    /// # Errors
    ///
    /// Propagates the first provider error.
    pub async fn query(&self, query: &str, params: &SearchParams) -> Result<SearchResponse> {
        let provider = self.provider.name();
        let mut response = self.provider.query(query, params).await?;
        if !response.is_empty() {
            return Ok(response);
        }

        if !params.search_engines.is_empty() {
            info!(
                provider,
                engines = ?params.search_engines,
                "No results, retrying without engine restriction"
            );
            response = self.provider.query(query, &params.without_engines()).await?;
            if !response.is_empty() {
                return Ok(response);
            }
        }

        if !params.is_empty() {
            info!(provider, "No results, retrying without parameters");
            response = self.provider.query(query, &SearchParams::default()).await?;
        }

        if response.is_empty() {
            debug!(provider, query, "Search returned no results after fallback");
        }
        Ok(response)
    }
}
