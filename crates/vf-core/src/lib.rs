//! vf-core: shared types, IDs, errors, configuration, presets, and events.
//!
//! This crate is the foundational dependency for all other vf-* crates,
//! providing type-safe identifiers, a unified error type, media-kind enums,
//! the Preset / ParameterSet models, application configuration, and a
//! broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod params;
pub mod preset;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
pub use params::{ImageParameters, ParameterSet, Parameters, VideoParameters, WatermarkParameters};
pub use preset::{FlipPolicy, ImagePreset, Preset, RangeParameter, VideoPreset};
