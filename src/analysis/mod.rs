//! Media analysis algorithms behind the derived-resource pipeline
//!
//! Pure computations only; decoding lives behind [`crate::ports::DecodePort`].

pub mod envelope;
pub mod sprite;

pub use envelope::{rms_envelope, WaveformEnvelope};
pub use sprite::{SpriteLayout, SpriteManifest};
