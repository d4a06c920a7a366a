//! Editing core of the snapredact screenshot editor: load a capture, black
//! out regions, crop without losing resolution, and export a flattened PNG.

pub mod app;
pub mod config;
pub mod crop;
pub mod document;
pub mod editor;
pub mod error;
pub mod export;
pub mod geometry;
pub mod handoff;
pub mod render;
pub mod throttle;
pub mod tool;

pub use editor::{Editor, EditorSettings, InputEvent, Outcome, Status};
pub use error::{EditorError, Result};
