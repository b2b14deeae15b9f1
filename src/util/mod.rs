//! Text helpers for rendering server-provided strings in the terminal.

mod text;

pub use text::{sanitize, truncate_to_width};
