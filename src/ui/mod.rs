//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background tasks and their completion events
//! - `render` - Layout, tag bar and confirmation overlay
//! - `card` - The dish card (front, back, end and loading cards)
//! - `status` - Status bar widget

mod card;
mod events;
mod input;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::{run, Action};
