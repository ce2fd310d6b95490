//! Built-in execution backends.

mod canvas;
mod local;
mod remote;

pub use canvas::CanvasBackend;
pub use local::LocalTranscoder;
pub use remote::{RelayResponse, RemoteBackend};
