//! ReelCut Library
//!
//! A non-destructive timeline editing engine for one recording at a time:
//! segments are range references into the source, every edit is undoable,
//! drafts are journaled to disk, and a background pipeline derives a
//! scrubbing proxy, a thumbnail sprite and a loudness envelope.

pub mod adapters;
pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use app::{DraftInteractor, MediaPipeline, TimelineEditor};
pub use config::ReelConfig;
pub use domain::errors::{DomainError, EditError};
pub use domain::model::{Draft, MediaAsset, Segment};
pub use error::{ReelError, ReelResult};
