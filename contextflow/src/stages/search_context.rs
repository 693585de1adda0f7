//! Search workflow prompt and result injection.

use super::injection::{append_to_last_user, merge_or_create_system_message};
use super::Stage;
use crate::config::{SearchConfig, SearchMode};
use crate::context::PipelineContext;
use crate::errors::Result;
use crate::search::SearchResultItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const WEB_WORKFLOW: &str = "You can search the web. When the question needs current or external information, rely on the search results provided with the user's message. Cite sources by their number and URL, and say so when the results do not answer the question.";

const KNOWLEDGE_WORKFLOW: &str = "You can search the user's knowledge bases. Answer from the knowledge-base results provided with the user's message, cite the documents you used, and say so when they do not contain the answer.";

const HYBRID_WORKFLOW: &str = "You can search both the web and the user's knowledge bases. Prefer knowledge-base results for questions about the user's own material and web results for current or public information. Cite every source you use by its number and URL.";

fn builtin_workflow(mode: SearchMode) -> &'static str {
    match mode {
        SearchMode::Web => WEB_WORKFLOW,
        SearchMode::Knowledge => KNOWLEDGE_WORKFLOW,
        SearchMode::Hybrid => HYBRID_WORKFLOW,
    }
}

/// A search hit as rendered into the user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchResult {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Text excerpt.
    pub snippet: String,
    /// Relevance score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    /// Where the hit came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<SearchResultItem> for SearchResult {
    fn from(item: SearchResultItem) -> Self {
        Self {
            title: item.title,
            url: item.url,
            snippet: item.content,
            relevance: item.score,
            source: item.engine,
        }
    }
}

fn render_results(results: &[SearchResult], query: Option<&str>) -> String {
    let mut out = String::from("<search_results>\n");
    for (index, result) in results.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", index + 1, result.title));
        out.push_str(&format!("URL: {}\n", result.url));
        if !result.snippet.is_empty() {
            out.push_str(&format!("Snippet: {}\n", result.snippet));
        }
        if let Some(relevance) = result.relevance {
            out.push_str(&format!("Relevance: {relevance:.2}\n"));
        }
        if let Some(source) = &result.source {
            out.push_str(&format!("Source: {source}\n"));
        }
        if index + 1 < results.len() {
            out.push('\n');
        }
    }
    out.push_str("</search_results>");

    if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
        out.push_str(&format!("\n<search_query>{query}</search_query>"));
    }
    out
}

/// Injects the search workflow prompt and the latest results.
#[derive(Debug, Clone, Default)]
pub struct SearchContextStage {
    config: SearchConfig,
    results: Vec<SearchResult>,
}

impl SearchContextStage {
    /// Stage name.
    pub const NAME: &'static str = "searchContext";

    /// Creates the stage.
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            results: Vec::new(),
        }
    }

    /// Sets the results to render.
    #[must_use]
    pub fn with_results(mut self, results: Vec<SearchResult>) -> Self {
        self.results = results;
        self
    }

    fn workflow_prompt(&self) -> Option<&str> {
        match self.config.workflow_prompt.as_deref() {
            Some(prompt) => Some(prompt).filter(|p| !p.trim().is_empty()),
            None => Some(builtin_workflow(self.config.mode)),
        }
    }
}

#[async_trait]
impl Stage for SearchContextStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        if !self.config.enabled {
            debug!("Search disabled");
            return Ok(self.mark_executed(ctx));
        }

        let mut workflow_injected = false;
        if let Some(prompt) = self.workflow_prompt() {
            let outcome = merge_or_create_system_message(&mut ctx.messages, prompt, Self::NAME);
            workflow_injected = true;
            debug!(?outcome, mode = self.config.mode.as_str(), "Injected search workflow");
        }

        let shown = &self.results[..self.results.len().min(self.config.max_results)];
        let mut results_injected = false;
        if shown.is_empty() {
            debug!("No search results");
        } else {
            let block = render_results(shown, self.config.query.as_deref());
            if append_to_last_user(&mut ctx.messages, &block).is_some() {
                results_injected = true;
                debug!(result_count = shown.len(), "Injected search results");
            } else {
                debug!("No user message to attach search results");
            }
        }

        let ns = ctx.metadata.namespace_mut(Self::NAME);
        ns.insert("workflowInjected".into(), workflow_injected.into());
        ns.insert("resultsInjected".into(), results_injected.into());
        ns.insert(
            "resultCount".into(),
            (if results_injected { shown.len() } else { 0 }).into(),
        );
        ns.insert("mode".into(), self.config.mode.as_str().into());

        Ok(self.mark_executed(ctx))
    }
}
