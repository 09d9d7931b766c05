//! Markdown generation from the document tree.
//!
//! - [`escape`]: code span and fence sizing, table and YAML escaping
//! - [`fragment`]: rendered text with deferred image references
//! - [`noise`]: visibility and UI-chrome filtering
//! - [`render`]: the tree walker
//!
//! The walker is pure with respect to the document: it reads the tree and the
//! run's computed styles and writes only to the per-message
//! [`ConversionState`](crate::images::ConversionState).

mod escape;
mod fragment;
pub mod noise;
mod render;

pub use escape::{
    calculate_fence_length, calculate_inline_code_ticks, escape_table_cell, escape_yaml_string,
    inline_code,
};
pub use fragment::{Fragment, ImageId, Piece};
pub use render::{RenderContext, render_message};
