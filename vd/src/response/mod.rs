//! Template-based response selection
//!
//! Responses come from per-intent template pools with light variation: the
//! template used last time is avoided when possible, and anything that cannot
//! render falls back to the default pool.

mod embedded;
mod templates;

pub use embedded::{default_templates, DEFAULT_INTENT};
pub use templates::TemplateResponseGenerator;
