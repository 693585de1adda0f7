//! Retrieved-context injection into the last user message.

use super::injection::append_to_last_user;
use super::Stage;
use crate::config::RagConfig;
use crate::context::PipelineContext;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A partially fitting chunk is only kept if more than this many
/// characters of budget remain.
pub const MIN_TRUNCATION_BUDGET: usize = 100;

const TRUNCATION_MARKER: &str = "...";

/// A retrieved unit of knowledge-base content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagChunk {
    /// Chunk text.
    pub content: String,
    /// Similarity score in `[0, 1]`.
    pub similarity: f64,
    /// Optional source label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RagChunk {
    /// Creates a chunk.
    #[must_use]
    pub fn new(content: impl Into<String>, similarity: f64) -> Self {
        Self {
            content: content.into(),
            similarity,
            source: None,
        }
    }

    fn len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Result of filtering, sorting and truncating chunks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkSelection {
    /// Chunks that fit, in render order.
    pub chunks: Vec<RagChunk>,
    /// Similarities of every chunk that passed the filter.
    pub filtered_similarities: Vec<f64>,
    /// Whether the last chunk was cut short.
    pub truncated: bool,
}

impl ChunkSelection {
    /// Total characters across the selected chunks.
    #[must_use]
    pub fn total_length(&self) -> usize {
        self.chunks.iter().map(RagChunk::len).sum()
    }
}

/// Filters, sorts and truncates chunks, in that order.
#[must_use]
pub fn select_chunks(chunks: &[RagChunk], config: &RagConfig) -> ChunkSelection {
    let mut filtered: Vec<RagChunk> = match config.min_similarity {
        Some(min) => chunks.iter().filter(|c| c.similarity >= min).cloned().collect(),
        None => chunks.to_vec(),
    };

    if config.sort_by_similarity {
        // sort_by is stable, so equal scores keep encounter order
        filtered.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    }

    let filtered_similarities = filtered.iter().map(|c| c.similarity).collect();

    let Some(budget) = config.max_context_length else {
        return ChunkSelection {
            chunks: filtered,
            filtered_similarities,
            truncated: false,
        };
    };

    let mut selected = Vec::new();
    let mut used = 0;
    let mut truncated = false;
    for chunk in filtered {
        let len = chunk.len();
        if used + len <= budget {
            used += len;
            selected.push(chunk);
            continue;
        }

        let remaining = budget - used;
        if remaining > MIN_TRUNCATION_BUDGET {
            let mut content: String = chunk.content.chars().take(remaining).collect();
            content.push_str(TRUNCATION_MARKER);
            selected.push(RagChunk { content, ..chunk });
            truncated = true;
        }
        break;
    }

    ChunkSelection {
        chunks: selected,
        filtered_similarities,
        truncated,
    }
}

fn render_block(chunks: &[RagChunk], rewrite_query: Option<&str>) -> String {
    let mut out = String::from("<retrieved_knowledge>\n");
    out.push_str(
        "<instruction>Answer the question using the retrieved passages below when they are relevant. Prefer passages with higher similarity.</instruction>\n",
    );
    for (index, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!(
            "<chunk index=\"{}\" similarity=\"{:.1}%\"",
            index + 1,
            chunk.similarity * 100.0
        ));
        if let Some(source) = &chunk.source {
            out.push_str(&format!(" source=\"{source}\""));
        }
        out.push_str(&format!(">\n{}\n</chunk>\n", chunk.content));
    }
    out.push_str("</retrieved_knowledge>");

    if let Some(query) = rewrite_query.filter(|q| !q.trim().is_empty()) {
        out.push_str(&format!("\n<rewritten_query>{query}</rewritten_query>"));
    }
    out
}

/// Appends ranked retrieval chunks to the last user message.
#[derive(Debug, Clone, Default)]
pub struct RagContextStage {
    chunks: Vec<RagChunk>,
    config: RagConfig,
}

impl RagContextStage {
    /// Stage name.
    pub const NAME: &'static str = "ragContext";

    /// Creates the stage.
    #[must_use]
    pub fn new(chunks: Vec<RagChunk>, config: RagConfig) -> Self {
        Self { chunks, config }
    }
}

#[async_trait]
impl Stage for RagContextStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let selection = select_chunks(&self.chunks, &self.config);
        if selection.chunks.is_empty() {
            debug!(input = self.chunks.len(), "No retrieval chunks survived selection");
            return Ok(self.mark_executed(ctx));
        }

        let block = render_block(&selection.chunks, self.config.rewrite_query.as_deref());
        if append_to_last_user(&mut ctx.messages, &block).is_none() {
            debug!("No user message to attach retrieval context");
            return Ok(self.mark_executed(ctx));
        }

        let sims = &selection.filtered_similarities;
        let min = sims.iter().copied().fold(f64::INFINITY, f64::min);
        let max = sims.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let avg = sims.iter().sum::<f64>() / sims.len() as f64;

        let ns = ctx.metadata.namespace_mut(Self::NAME);
        ns.insert("chunkCount".into(), selection.chunks.len().into());
        ns.insert("filteredCount".into(), sims.len().into());
        ns.insert("totalLength".into(), selection.total_length().into());
        ns.insert("minSimilarity".into(), min.into());
        ns.insert("maxSimilarity".into(), max.into());
        ns.insert("avgSimilarity".into(), avg.into());
        ns.insert("truncated".into(), selection.truncated.into());
        ctx.metadata.set_in(Self::NAME, "injected", true);

        debug!(
            chunk_count = selection.chunks.len(),
            total_length = selection.total_length(),
            truncated = selection.truncated,
            "Injected retrieval context"
        );

        Ok(self.mark_executed(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InitialState;
    use crate::core::Message;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chunk(len: usize, similarity: f64) -> RagChunk {
        RagChunk::new("x".repeat(len), similarity)
    }

    fn sims(selection: &ChunkSelection) -> Vec<f64> {
        selection.chunks.iter().map(|c| c.similarity).collect()
    }

    #[test]
    fn test_budget_floor_excludes_small_remainder() {
        let config = RagConfig::default().with_max_context_length(150);
        let selection = select_chunks(&[chunk(100, 0.9), chunk(100, 0.8)], &config);

        assert_eq!(sims(&selection), vec![0.9]);
        assert!(!selection.truncated);
        assert_eq!(selection.total_length(), 100);
    }

    #[test]
    fn test_budget_truncates_when_remainder_exceeds_floor() {
        let config = RagConfig::default().with_max_context_length(300);
        let selection = select_chunks(&[chunk(100, 0.9), chunk(400, 0.8)], &config);

        assert_eq!(selection.chunks.len(), 2);
        assert!(selection.truncated);
        assert_eq!(selection.chunks[1].content, format!("{}...", "x".repeat(200)));
    }

    #[test]
    fn test_remainder_equal_to_floor_is_excluded() {
        let config = RagConfig::default().with_max_context_length(200);
        let selection = select_chunks(&[chunk(100, 0.9), chunk(150, 0.8)], &config);
        assert_eq!(selection.chunks.len(), 1);
    }

    #[test]
    fn test_filter_then_sort() {
        let config = RagConfig::default().with_min_similarity(0.5);
        let selection = select_chunks(
            &[chunk(50, 0.95), chunk(50, 0.4), chunk(50, 0.7)],
            &config,
        );
        assert_eq!(sims(&selection), vec![0.95, 0.7]);
    }

    #[test]
    fn test_sort_is_stable_and_optional() {
        let mut a = chunk(1, 0.5);
        a.content = "a".to_string();
        let mut b = chunk(1, 0.5);
        b.content = "b".to_string();
        let c = chunk(1, 0.9);

        let sorted = select_chunks(&[a.clone(), b.clone(), c.clone()], &RagConfig::default());
        let order: Vec<&str> = sorted.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(order, vec!["x", "a", "b"]);

        let config = RagConfig {
            sort_by_similarity: false,
            ..RagConfig::default()
        };
        let unsorted = select_chunks(&[a, b, c], &config);
        assert_eq!(sims(&unsorted), vec![0.5, 0.5, 0.9]);
    }

    #[test]
    fn test_lengths_count_characters() {
        let config = RagConfig::default().with_max_context_length(3);
        let selection = select_chunks(&[RagChunk::new("日本語", 0.9)], &config);
        assert_eq!(selection.chunks.len(), 1);
    }

    fn ctx(messages: Vec<Message>) -> PipelineContext {
        PipelineContext::new(InitialState::new("m", "p").with_messages(messages))
    }

    #[test]
    fn test_block_layout() {
        let chunks = vec![RagChunk {
            source: Some("guide.md".to_string()),
            ..RagChunk::new("Paris.", 0.5)
        }];

        assert_eq!(
            render_block(&chunks, Some("  ")),
            "<retrieved_knowledge>\n<instruction>Answer the question using the retrieved passages below when they are relevant. Prefer passages with higher similarity.</instruction>\n<chunk index=\"1\" similarity=\"50.0%\" source=\"guide.md\">\nParis.\n</chunk>\n</retrieved_knowledge>"
        );
        assert!(render_block(&chunks, Some("q")).ends_with("</retrieved_knowledge>\n<rewritten_query>q</rewritten_query>"));
    }

    #[tokio::test]
    async fn test_appends_to_last_user_message() {
        let stage = RagContextStage::new(
            vec![RagChunk::new("Paris is in France.", 0.92), RagChunk::new("Lyon too.", 0.61)],
            RagConfig::default().with_rewrite_query("where is paris"),
        );
        let out = stage
            .process(ctx(vec![
                Message::user("first"),
                Message::assistant("a"),
                Message::user("Where is Paris?"),
            ]))
            .await
            .unwrap();

        assert_eq!(out.messages.len(), 3);
        assert_eq!(out.messages[0].content.as_text(), Some("first"));
        let text = out.messages[2].content.text();
        assert!(text.starts_with("Where is Paris?\n\n<retrieved_knowledge>"));
        assert!(text.contains("<chunk index=\"1\" similarity=\"92.0%\">\nParis is in France.\n</chunk>"));
        assert!(text.contains("<chunk index=\"2\" similarity=\"61.0%\">"));
        assert!(text.ends_with("<rewritten_query>where is paris</rewritten_query>"));

        assert!(out.metadata.get_bool_in("ragContext", "injected"));
        assert_eq!(out.metadata.get_in("ragContext", "chunkCount"), Some(&json!(2)));
        assert_eq!(out.metadata.get_in("ragContext", "maxSimilarity"), Some(&json!(0.92)));
        assert_eq!(out.metadata.get_in("ragContext", "minSimilarity"), Some(&json!(0.61)));
        assert_eq!(out.metadata.get_in("ragContext", "truncated"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn test_no_user_message_is_noop() {
        let stage = RagContextStage::new(vec![RagChunk::new("c", 0.9)], RagConfig::default());
        let out = stage.process(ctx(vec![Message::system("s")])).await.unwrap();
        assert_eq!(out.messages[0].content.as_text(), Some("s"));
        assert!(!out.metadata.get_bool_in("ragContext", "injected"));
    }

    #[tokio::test]
    async fn test_all_filtered_is_noop() {
        let stage = RagContextStage::new(
            vec![RagChunk::new("c", 0.1)],
            RagConfig::default().with_min_similarity(0.5),
        );
        let out = stage.process(ctx(vec![Message::user("q")])).await.unwrap();
        assert_eq!(out.messages[0].content.as_text(), Some("q"));
    }
}
