//! # vf-av
//!
//! Media tooling for the variant engine.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support and streamed stderr for running external processes.
//! - **Workspace management** ([`Workspace`]) -- temporary directory lifecycle
//!   with a checked move into the output directory.
//! - **Progress parsing** ([`progress`]) -- ffmpeg `-progress` and banner
//!   lines turned into percentages.
//! - **Canvas operations** ([`canvas`]) -- per-pixel color filters, flip,
//!   darkened border and JPEG re-encoding for still images.

pub mod canvas;
pub mod command;
pub mod progress;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use canvas::CanvasOps;
pub use command::{ToolCommand, ToolOutput};
pub use progress::{parse_banner_duration, FfmpegProgress};
pub use tools::{ToolInfo, ToolRegistry};
pub use workspace::Workspace;
