//! Range-aware file streaming

pub mod body;
pub mod responder;

pub use body::{StreamPhase, TrackedBody};
pub use responder::{Disposition, ResponseError, StreamingResponder};
