//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds a full [`AppContext`] around [`FakeBackend`]s that
//! write small files instead of running ffmpeg, with every output directory
//! inside a temp dir. [`TestHarness::with_server`] also binds the router on
//! a random port for HTTP-level tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vf_av::ToolRegistry;
use vf_core::config::Config;
use vf_core::{Error, MediaKind};
use vf_pipeline::{Artifact, BackendSet, ExecutionBackend, ExecutionRequest, ProgressSender};
use vf_server::{build_router, AppContext};

/// Backend that writes `FAKE_OUTPUT` for every copy.
pub struct FakeBackend {
    kind: MediaKind,
    /// While set, every call fails with a backend error.
    pub failing: AtomicBool,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

pub const FAKE_OUTPUT: &[u8] = b"rendered variant";

impl FakeBackend {
    pub fn video() -> Self {
        Self::new(MediaKind::Video)
    }

    pub fn image() -> Self {
        Self::new(MediaKind::Image)
    }

    fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            failing: AtomicBool::new(false),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ExecutionBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn supports(&self, kind: MediaKind) -> bool {
        kind == self.kind
    }

    async fn execute(
        &self,
        req: ExecutionRequest<'_>,
        progress: &ProgressSender,
    ) -> vf_core::Result<Artifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::backend("fake", "encoder exited with status 1"));
        }
        progress.send(100.0, "done");
        tokio::fs::create_dir_all(req.output_dir).await?;
        let dest = req.output_dir.join(req.output_name());
        tokio::fs::write(&dest, FAKE_OUTPUT).await?;
        Ok(Artifact::new(dest, FAKE_OUTPUT.len() as u64, req.params.clone()))
    }
}

pub struct TestHarness {
    pub ctx: AppContext,
    pub video: Arc<FakeBackend>,
    pub relay: Arc<FakeBackend>,
    /// Holds inputs and every configured output directory.
    pub dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_backends(FakeBackend::video(), FakeBackend::video(), |_| {})
    }

    /// Build a harness around explicit fakes. `tweak` runs after the output
    /// directories have been pointed into the temp dir.
    pub fn with_backends(
        video: FakeBackend,
        relay: FakeBackend,
        tweak: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        config.queue.output_dir = dir.path().join("variants");
        config.relay.output_dir = dir.path().join("processed");
        tweak(&mut config);

        let video = Arc::new(video);
        let relay = Arc::new(relay);
        let backends = BackendSet::new(video.clone(), Arc::new(FakeBackend::image()))
            .expect("fake backends cover both kinds");
        let ctx = AppContext::new(config, Arc::new(ToolRegistry::default()), backends, relay.clone());

        Self {
            ctx,
            video,
            relay,
            dir,
        }
    }

    /// Start Axum on a random port.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = build_router(self.ctx.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Write a dummy input file and return its path.
    pub fn input(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"not really media").expect("failed to write input");
        path
    }

    pub fn relay_dir(&self) -> &Path {
        &self.ctx.config.relay.output_dir
    }
}
