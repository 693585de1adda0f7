//! Search provider boundary.
//!
//! Concrete backends are external. The pipeline's caller talks to them
//! through [`SearchProvider`] and relies on [`SearchService`] to relax
//! constraints when a query comes back empty.

mod provider;
mod service;

#[cfg(test)]
pub use provider::MockSearchProvider;
pub use provider::{SearchParams, SearchProvider, SearchResponse, SearchResultItem};
pub use service::SearchService;
