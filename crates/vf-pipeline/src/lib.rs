//! # vf-pipeline
//!
//! Variant generation: execution backends, the job queue and the result
//! store.
//!
//! This crate provides:
//!
//! - **[`ExecutionBackend`]** trait -- turns one transform program and one
//!   input into exactly one [`Artifact`], with local ffmpeg
//!   ([`LocalTranscoder`]), remote relay ([`RemoteBackend`]) and still-image
//!   ([`CanvasBackend`]) implementations.
//! - **[`Scheduler`]** -- owned job queue that runs one job at a time, copies
//!   in index order, and publishes progress on an [`EventBus`](vf_core::events::EventBus).
//! - **[`ResultAggregator`]** -- append-only store of produced artifacts.
//! - **[`persist`]** -- JSON snapshot of finished jobs for crash recovery.

pub mod aggregator;
pub mod artifact;
pub mod backend;
pub mod backends;
pub mod context;
pub mod job;
pub mod persist;
pub mod scheduler;

// Re-export key types at the crate root.
pub use aggregator::{GlobalResult, ResultAggregator};
pub use artifact::{Artifact, SourceFile};
pub use backend::{BackendSet, ExecutionBackend, ExecutionRequest};
pub use backends::{CanvasBackend, LocalTranscoder, RemoteBackend};
pub use context::ProgressSender;
pub use job::{Job, JobStatus};
pub use scheduler::Scheduler;
