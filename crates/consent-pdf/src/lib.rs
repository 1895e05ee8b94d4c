//! Consent document rendering
//!
//! Fills the case study consent template with a submission's values at
//! fixed text insertion points and embeds the drawn signature.

pub mod layout;
pub mod renderer;
mod stamp;

pub use layout::{FieldLayout, Point, Rect, TemplateField};
pub use renderer::{render_template, TemplateRenderer};
