//! Testing utilities for contextflow pipelines.
//!
//! This module provides:
//! - Mock stages (recording, aborting, failing, conditional, slow)
//! - Request and context fixtures
//! - Assertions over assembled messages

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_flag, assert_no_flag, assert_roles, assert_single_leading_system,
    assert_text_contains, assert_texts,
};
pub use fixtures::{sample_context, sample_messages, TestState, TEST_MODEL, TEST_PROVIDER};
pub use mocks::{
    call_log, AbortingStage, CallLog, ConditionalStage, FailingStage, RecordingStage, SlowStage,
};
