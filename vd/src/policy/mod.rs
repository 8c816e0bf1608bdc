//! Content and safety policy evaluation
//!
//! Policies inspect input or output text and report pass/fail with structured
//! violation detail. Violations are data, not errors: a failed evaluation is a
//! normal return value that the pipeline turns into a rejection message.

mod engine;
mod validators;

pub use engine::{Policy, PolicyContext, PolicyEngine, PolicyResult};
pub use validators::{
    ContentFilterPolicy, InputSanitizationPolicy, ResponseLengthPolicy, DEFAULT_MAX_INPUT_LENGTH,
    DEFAULT_MAX_RESPONSE_LENGTH,
};
