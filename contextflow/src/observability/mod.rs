//! Observability utilities.

mod spans;
mod subscriber;

pub use spans::{SpanTimer, StageSpanAttributes};
pub use subscriber::init_tracing;
