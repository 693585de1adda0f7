//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::context::PipelineContext;
use crate::errors::{ContextflowError, Result};
use crate::stages::Stage;

/// Shared, ordered log of stage invocations.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Creates an empty call log.
#[must_use]
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A stage that records its name into a shared log and passes the context on.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    log: CallLog,
}

impl RecordingStage {
    /// Creates a recording stage writing into `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }

    /// Returns the number of times this stage ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.log.lock().iter().filter(|n| **n == self.name).count()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: PipelineContext) -> Result<PipelineContext> {
        self.log.lock().push(self.name.clone());
        Ok(self.mark_executed(ctx))
    }
}

/// A stage that aborts the run with a fixed reason.
#[derive(Debug)]
pub struct AbortingStage {
    name: String,
    reason: String,
}

impl AbortingStage {
    /// Creates a new aborting stage.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Stage for AbortingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: PipelineContext) -> Result<PipelineContext> {
        let ctx = self.mark_executed(ctx);
        Ok(self.abort(ctx, &self.reason))
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _ctx: PipelineContext) -> Result<PipelineContext> {
        Err(ContextflowError::collaborator(&self.name, &self.error))
    }
}

/// A stage that only runs when a metadata flag is true.
#[derive(Debug)]
pub struct ConditionalStage {
    name: String,
    flag: String,
    log: CallLog,
}

impl ConditionalStage {
    /// Creates a stage gated on `metadata[flag] == true`.
    #[must_use]
    pub fn new(name: impl Into<String>, flag: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            flag: flag.into(),
            log,
        }
    }
}

#[async_trait]
impl Stage for ConditionalStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        ctx.metadata.get_bool(&self.flag)
    }

    async fn process(&self, ctx: PipelineContext) -> Result<PipelineContext> {
        self.log.lock().push(self.name.clone());
        Ok(self.mark_executed(ctx))
    }
}

/// A stage that takes time to execute.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self {
            name: name.into(),
            delay: Duration::from_millis(ms),
        }
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: PipelineContext) -> Result<PipelineContext> {
        tokio::time::sleep(self.delay).await;
        Ok(self.mark_executed(ctx))
    }
}
