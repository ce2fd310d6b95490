//! # vf-variants
//!
//! The shared variant core used by every execution backend and by the HTTP
//! relay:
//!
//! - **[`Sampler`]** -- draws one concrete [`ParameterSet`](vf_core::ParameterSet)
//!   per requested copy from a [`Preset`](vf_core::Preset).
//! - **[`CommandBuilder`]** -- turns a parameter set into an ordered
//!   [`TransformProgram`]. Pure and deterministic.
//! - **[`program`]** -- the program model and its ffmpeg rendering.

pub mod builder;
pub mod program;
pub mod sampler;

pub use builder::CommandBuilder;
pub use program::{OutputSettings, StreamKind, TransformProgram, TransformStep, Trim};
pub use sampler::Sampler;
