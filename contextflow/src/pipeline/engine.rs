//! Sequential stage orchestrator.

use super::builder::validation_errors;
use crate::context::PipelineContext;
use crate::errors::{Result, StageExecutionError};
use crate::events::{types, EventSink, NoOpEventSink, PipelineEvent};
use crate::observability::{SpanTimer, StageSpanAttributes};
use crate::stages::Stage;
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, debug_span, error, info, info_span, Instrument};

/// Snapshot of an engine's stage list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// Number of stages.
    pub stage_count: usize,
    /// Stage names, in run order.
    pub stage_names: Vec<String>,
}

/// Result of [`ContextEngine::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// True when no error was found.
    pub valid: bool,
    /// Human-readable problems.
    pub errors: Vec<String>,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Stages whose `process` was invoked.
    pub processed_count: usize,
    /// Stages skipped by `should_run`.
    pub skipped_count: usize,
    /// Wall time of the whole run.
    pub total_duration_ms: f64,
    /// Wall time per processed stage, in run order.
    pub stage_durations_ms: Vec<(String, f64)>,
}

/// Final context of a run plus its counters.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The context after the last stage that ran.
    pub context: PipelineContext,
    /// Run counters.
    pub stats: RunStats,
}

/// Runs an ordered list of stages over a context, one at a time.
///
/// After each stage the engine checks the abort flag and stops dispatching
/// when it is set. Cloning an engine copies the list; the stage instances
/// themselves are shared.
#[derive(Clone)]
pub struct ContextEngine {
    stages: Vec<Arc<dyn Stage>>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ContextEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextEngine")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

impl Default for ContextEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ContextEngine {
    /// Creates an engine over `stages`.
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            stages,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Appends a stage.
    pub fn add_stage(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Removes every stage named `name`.
    pub fn remove_stage(&mut self, name: &str) -> &mut Self {
        self.stages.retain(|stage| stage.name() != name);
        self
    }

    /// Removes all stages.
    pub fn clear(&mut self) -> &mut Self {
        self.stages.clear();
        self
    }

    /// Returns a copy of the stage list.
    #[must_use]
    pub fn stages(&self) -> Vec<Arc<dyn Stage>> {
        self.stages.clone()
    }

    fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Returns the stage count and names.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            stage_count: self.stages.len(),
            stage_names: self.stage_names(),
        }
    }

    /// Checks the stage list for problems without running it.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let errors: Vec<String> = validation_errors(&self.stages)
            .into_iter()
            .map(|e| e.message)
            .collect();
        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    async fn emit(&self, event_type: &str, data: serde_json::Value) {
        self.event_sink
            .emit(PipelineEvent::new(event_type, data))
            .await;
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    ///
    /// Returns `ContextflowError::StageExecution` if a stage fails
    /// unexpectedly. An abort is not an error: the outcome carries the
    /// aborted context.
    pub async fn process(&self, ctx: PipelineContext) -> Result<PipelineOutcome> {
        let span = info_span!(
            "context_engine.process",
            stage_count = self.stages.len(),
            model = %ctx.initial_state().model,
        );
        self.run(ctx).instrument(span).await
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineOutcome> {
        let run_timer = SpanTimer::start("context_engine.process");
        let mut stats = RunStats::default();
        self.emit(
            types::PIPELINE_STARTED,
            json!({ "stageCount": self.stages.len(), "messageCount": ctx.messages.len() }),
        )
        .await;

        for stage in &self.stages {
            if ctx.is_aborted() {
                break;
            }
            let name = stage.name().to_string();

            if !stage.should_run(&ctx) {
                debug!(stage = %name, "Stage skipped");
                stats.skipped_count += 1;
                let attrs = StageSpanAttributes::new(&name).with_status("skipped");
                self.emit(types::STAGE_SKIPPED, attrs.to_event_data()).await;
                continue;
            }

            self.emit(types::STAGE_STARTED, StageSpanAttributes::new(&name).to_event_data())
                .await;
            let timer = SpanTimer::start(&name);

            ctx = match stage
                .process(ctx)
                .instrument(debug_span!("stage", stage = %name))
                .await
            {
                Ok(next) => next,
                Err(e) => {
                    error!(stage = %name, error = %e, "Stage execution failed");
                    let attrs = StageSpanAttributes::new(&name)
                        .with_status("failed")
                        .with_duration_ms(timer.elapsed_ms())
                        .with_error(e.to_string());
                    self.emit(types::PIPELINE_FAILED, attrs.to_event_data()).await;
                    return Err(StageExecutionError::new(name, e.to_string()).into());
                }
            };

            let duration_ms = timer.finish();
            stats.processed_count += 1;
            stats.stage_durations_ms.push((name.clone(), duration_ms));
            let attrs = StageSpanAttributes::new(&name)
                .with_status("completed")
                .with_duration_ms(duration_ms);
            self.emit(types::STAGE_COMPLETED, attrs.to_event_data()).await;

            if ctx.is_aborted() {
                info!(stage = %name, reason = ctx.abort_reason(), "Pipeline aborted");
                let mut attrs = StageSpanAttributes::new(&name).with_status("aborted");
                if let Some(reason) = ctx.abort_reason() {
                    attrs = attrs.with_error(reason);
                }
                self.emit(types::PIPELINE_ABORTED, attrs.to_event_data()).await;
                break;
            }
        }

        stats.total_duration_ms = run_timer.finish();
        self.emit(
            types::PIPELINE_COMPLETED,
            json!({
                "processedCount": stats.processed_count,
                "skippedCount": stats.skipped_count,
                "aborted": ctx.is_aborted(),
                "durationMs": stats.total_duration_ms,
            }),
        )
        .await;
        debug!(
            processed = stats.processed_count,
            skipped = stats.skipped_count,
            aborted = ctx.is_aborted(),
            "Pipeline finished"
        );

        Ok(PipelineOutcome {
            context: ctx,
            stats,
        })
    }

    /// Runs independent turns concurrently. Each run owns its context.
    pub async fn process_many(&self, contexts: Vec<PipelineContext>) -> Vec<Result<PipelineOutcome>> {
        join_all(contexts.into_iter().map(|ctx| self.process(ctx))).await
    }
}
