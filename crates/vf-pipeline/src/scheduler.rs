//! The job queue and its single-worker processing loop.
//!
//! [`Scheduler`] owns the job list. Callers mutate it only through
//! `enqueue`/`remove`/`retry`/`clear` and observe it through snapshots and
//! [`subscribe`](Scheduler::subscribe). [`process_queue`](Scheduler::process_queue)
//! drains waiting jobs in FIFO order, one job and one copy at a time; the
//! backend call is its only await point.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use vf_core::config::QueueConfig;
use vf_core::events::{Event, EventBus, EventCategory, EventPayload};
use vf_core::{Error, JobId, Preset, ResultSource};
use vf_variants::{CommandBuilder, Sampler};

use crate::aggregator::ResultAggregator;
use crate::artifact::{Artifact, SourceFile};
use crate::backend::{BackendSet, ExecutionBackend, ExecutionRequest};
use crate::context::ProgressSender;
use crate::job::{copy_progress, Job, JobStatus};
use crate::persist;

/// What the loop needs from a claimed job, copied out of the lock.
struct Claim {
    id: JobId,
    source: SourceFile,
    preset: Preset,
    copies: u32,
    mode: ResultSource,
}

pub struct Scheduler {
    jobs: Mutex<Vec<Job>>,
    processing: AtomicBool,
    /// Bumped by `clear`; a run started under an older generation stops
    /// before its next job.
    generation: AtomicU64,
    backends: BackendSet,
    aggregator: Arc<ResultAggregator>,
    events: Arc<EventBus>,
    sampler: Sampler,
    builder: CommandBuilder,
    config: QueueConfig,
}

impl Scheduler {
    pub fn new(
        config: QueueConfig,
        backends: BackendSet,
        aggregator: Arc<ResultAggregator>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            processing: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            backends,
            aggregator,
            events,
            sampler: Sampler::new(),
            builder: CommandBuilder::new(),
            config,
        }
    }

    // -- Queue mutation ------------------------------------------------------

    /// Validate and queue one file in single mode.
    pub fn enqueue(&self, path: &Path, preset: Preset, copies: u32) -> vf_core::Result<JobId> {
        let preset = self.checked_preset(preset, copies)?;
        let source = self.checked_source(path, &preset)?;
        let job = Job::new(source, preset, copies, ResultSource::Single);
        let id = job.id;
        self.push(vec![job]);
        Ok(id)
    }

    /// Validate every file, then queue them all in batch mode. Nothing is
    /// queued if any file is rejected.
    pub fn enqueue_batch(
        &self,
        paths: &[PathBuf],
        preset: Preset,
        copies: u32,
    ) -> vf_core::Result<Vec<JobId>> {
        if paths.is_empty() {
            return Err(Error::Validation("no files selected".into()));
        }
        let preset = self.checked_preset(preset, copies)?;
        let sources = paths
            .iter()
            .map(|p| self.checked_source(p, &preset))
            .collect::<vf_core::Result<Vec<_>>>()?;

        let jobs: Vec<Job> = sources
            .into_iter()
            .map(|source| Job::new(source, preset.clone(), copies, ResultSource::Batch))
            .collect();
        let ids = jobs.iter().map(|j| j.id).collect();
        self.push(jobs);
        Ok(ids)
    }

    fn checked_preset(&self, mut preset: Preset, copies: u32) -> vf_core::Result<Preset> {
        if copies == 0 || copies > self.config.max_copies {
            return Err(Error::Validation(format!(
                "copies must be between 1 and {}, got {copies}",
                self.config.max_copies
            )));
        }
        for warning in preset.normalize()? {
            tracing::warn!(preset = preset.name(), "{warning}");
        }
        Ok(preset)
    }

    fn checked_source(&self, path: &Path, preset: &Preset) -> vf_core::Result<SourceFile> {
        let source = SourceFile::from_path(path)?;
        if source.kind != preset.kind() {
            return Err(Error::Validation(format!(
                "{} is a {} file but the preset is for {}",
                source.file_name,
                source.kind,
                preset.kind()
            )));
        }
        Ok(source)
    }

    fn push(&self, jobs: Vec<Job>) {
        let announced: Vec<(JobId, String, u32)> = jobs
            .iter()
            .map(|j| (j.id, j.source.file_name.clone(), j.copies))
            .collect();
        self.jobs.lock().extend(jobs);

        for (job_id, file_name, copies) in announced {
            tracing::info!(%job_id, file = %file_name, copies, "job queued");
            self.events.broadcast(
                EventCategory::Queue,
                EventPayload::JobQueued {
                    job_id,
                    file_name,
                    copies,
                },
            );
        }
    }

    /// Remove a job that is not currently processing.
    pub fn remove(&self, id: JobId) -> vf_core::Result<Job> {
        let removed = {
            let mut jobs = self.jobs.lock();
            let pos = jobs
                .iter()
                .position(|j| j.id == id)
                .ok_or_else(|| Error::not_found("job", id))?;
            if jobs[pos].status == JobStatus::Processing {
                return Err(Error::Conflict(format!("job {id} is processing")));
            }
            jobs.remove(pos)
        };
        self.events
            .broadcast(EventCategory::Queue, EventPayload::JobRemoved { job_id: id });
        self.persist();
        Ok(removed)
    }

    /// Put a failed job back in the queue.
    pub fn retry(&self, id: JobId) -> vf_core::Result<()> {
        {
            let mut jobs = self.jobs.lock();
            let job = jobs
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or_else(|| Error::not_found("job", id))?;
            if job.status != JobStatus::Error {
                return Err(Error::Validation(format!(
                    "only failed jobs can be retried; job {id} is {}",
                    job.status
                )));
            }
            job.reset();
        }
        tracing::info!(job_id = %id, "job retried");
        self.events
            .broadcast(EventCategory::Queue, EventPayload::JobRetried { job_id: id });
        self.persist();
        Ok(())
    }

    /// Empty the queue and reset the processing flag. Aggregated results are
    /// untouched.
    pub fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.jobs.lock()).len();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.processing.store(false, Ordering::SeqCst);
        tracing::info!(removed, "queue cleared");
        self.events
            .broadcast(EventCategory::Queue, EventPayload::QueueCleared { removed });
        self.persist();
        removed
    }

    // -- Observation ---------------------------------------------------------

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().clone()
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        self.jobs.lock().iter().find(|j| j.id == id).cloned()
    }

    pub fn waiting_count(&self) -> usize {
        self.jobs
            .lock()
            .iter()
            .filter(|j| j.status == JobStatus::Waiting)
            .count()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn aggregator(&self) -> &Arc<ResultAggregator> {
        &self.aggregator
    }

    // -- Persistence ---------------------------------------------------------

    /// Load finished jobs from `queue.state_path` and append them.
    pub fn restore(&self) -> vf_core::Result<usize> {
        let Some(path) = self.config.state_path.as_deref() else {
            return Ok(0);
        };
        let restored = persist::load_jobs(path)?;
        let count = restored.len();
        if count > 0 {
            let mut jobs = self.jobs.lock();
            for job in restored {
                if !jobs.iter().any(|j| j.id == job.id) {
                    jobs.push(job);
                }
            }
        }
        tracing::info!(count, path = %path.display(), "queue history restored");
        Ok(count)
    }

    fn persist(&self) {
        let Some(path) = self.config.state_path.as_deref() else {
            return;
        };
        let snapshot = self.jobs();
        if let Err(e) = persist::save_jobs(path, &snapshot) {
            tracing::warn!(path = %path.display(), "failed to persist queue: {e}");
        }
    }

    // -- Processing ----------------------------------------------------------

    /// Run every waiting job to completion or failure.
    ///
    /// Returns the number of jobs processed. Returns 0 immediately if another
    /// run is already in progress.
    pub async fn process_queue(&self) -> usize {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("process_queue called while already processing");
            return 0;
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let mut processed = 0;

        while self.generation.load(Ordering::SeqCst) == generation {
            let Some(claim) = self.claim_next() else {
                break;
            };
            processed += 1;

            tracing::info!(job_id = %claim.id, file = %claim.source.file_name, copies = claim.copies, "job started");
            self.events.broadcast(
                EventCategory::Queue,
                EventPayload::JobStarted { job_id: claim.id },
            );

            let outcome = self.run_job(&claim).await;
            self.finish(&claim, outcome);
        }

        if self.generation.load(Ordering::SeqCst) == generation {
            self.processing.store(false, Ordering::SeqCst);
        }
        processed
    }

    /// Mark the oldest waiting job as processing.
    fn claim_next(&self) -> Option<Claim> {
        let mut jobs = self.jobs.lock();
        let job = jobs.iter_mut().find(|j| j.status == JobStatus::Waiting)?;
        job.start();
        Some(Claim {
            id: job.id,
            source: job.source.clone(),
            preset: job.preset.clone(),
            copies: job.copies,
            mode: job.mode,
        })
    }

    async fn run_job(&self, claim: &Claim) -> vf_core::Result<Vec<Artifact>> {
        let backend = self.backends.for_kind(claim.source.kind).clone();
        let output_dir = self.config.output_dir.join(claim.id.to_string());
        tokio::fs::create_dir_all(&output_dir).await?;

        let mut artifacts: Vec<Artifact> = Vec::with_capacity(claim.copies as usize);
        for index in 0..claim.copies as usize {
            match self.run_copy(claim, index, backend.as_ref(), &output_dir).await {
                Ok(artifact) => {
                    artifacts.push(artifact);
                    let done = artifacts.len() as u32;
                    let progress = copy_progress(done, claim.copies);
                    self.set_progress(claim.id, progress);
                    self.events.broadcast(
                        EventCategory::Queue,
                        EventPayload::JobProgress {
                            job_id: claim.id,
                            progress,
                            completed_copies: done,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(job_id = %claim.id, variant = index, backend = backend.name(), "copy failed: {e}");
                    discard(&artifacts, &output_dir);
                    return Err(e);
                }
            }
        }
        Ok(artifacts)
    }

    async fn run_copy(
        &self,
        claim: &Claim,
        index: usize,
        backend: &dyn ExecutionBackend,
        output_dir: &Path,
    ) -> vf_core::Result<Artifact> {
        let params = self.sampler.sample(&claim.preset, index);
        let program = self.builder.build(&params, claim.source.kind)?;
        for note in &program.diagnostics {
            tracing::warn!(job_id = %claim.id, variant = index, "{note}");
        }

        let events = self.events.clone();
        let job_id = claim.id;
        let progress = ProgressSender::new(move |percent, step| {
            events.broadcast(
                EventCategory::Queue,
                EventPayload::CopyProgress {
                    job_id,
                    variant_index: index,
                    percent,
                    step: step.to_string(),
                },
            );
        });

        let req = ExecutionRequest {
            source: &claim.source,
            preset: &claim.preset,
            params: &params,
            program: &program,
            output_dir,
        };

        let timeout = self.config.copy_timeout();
        match tokio::time::timeout(timeout, backend.execute(req, &progress)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::Timeout(timeout)),
        }
    }

    fn set_progress(&self, id: JobId, progress: u8) {
        if let Some(job) = self.jobs.lock().iter_mut().find(|j| j.id == id) {
            job.progress = progress;
        }
    }

    fn finish(&self, claim: &Claim, outcome: vf_core::Result<Vec<Artifact>>) {
        match outcome {
            Ok(artifacts) => {
                let count = artifacts.len();
                let found = {
                    let mut jobs = self.jobs.lock();
                    match jobs.iter_mut().find(|j| j.id == claim.id) {
                        Some(job) => {
                            job.complete(artifacts.clone());
                            true
                        }
                        None => false,
                    }
                };
                if !found {
                    tracing::info!(job_id = %claim.id, "job cleared while running; keeping its results");
                }
                self.aggregator.add_results(artifacts, claim.mode);
                tracing::info!(job_id = %claim.id, artifacts = count, "job completed");
                self.events.broadcast(
                    EventCategory::Queue,
                    EventPayload::JobCompleted {
                        job_id: claim.id,
                        artifacts: count,
                    },
                );
            }
            Err(e) => {
                let message = e.to_string();
                if let Some(job) = self.jobs.lock().iter_mut().find(|j| j.id == claim.id) {
                    job.fail(message.clone());
                }
                tracing::error!(job_id = %claim.id, error = %message, "job failed");
                self.events.broadcast(
                    EventCategory::Queue,
                    EventPayload::JobFailed {
                        job_id: claim.id,
                        error: message,
                    },
                );
            }
        }
        self.persist();
    }
}

/// Delete the files of a failed job's finished copies.
fn discard(artifacts: &[Artifact], output_dir: &Path) {
    for artifact in artifacts {
        if let Err(e) = std::fs::remove_file(&artifact.location) {
            tracing::debug!(file = %artifact.location.display(), "failed to remove partial artifact: {e}");
        }
    }
    // Only succeeds when nothing else is left in the directory.
    let _ = std::fs::remove_dir(output_dir);
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("jobs", &self.jobs.lock().len())
            .field("processing", &self.is_processing())
            .field("backends", &self.backends)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use vf_core::{ImagePreset, MediaKind, RangeParameter, VideoPreset};

    /// Writes a small file per copy; fails on the configured copy index.
    struct FakeBackend {
        kind: MediaKind,
        fail_on: Option<usize>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new(kind: MediaKind) -> Self {
            Self {
                kind,
                fail_on: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
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
            if self.fail_on == Some(req.params.variant_index) {
                return Err(Error::backend("fake", "engine crashed"));
            }
            progress.send(50.0, "encoding");
            let dest = req.output_dir.join(req.output_name());
            std::fs::write(&dest, b"variant").unwrap();
            Ok(Artifact::new(dest, 7, req.params.clone()))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        scheduler: Scheduler,
        video: Arc<FakeBackend>,
    }

    fn fixture_with(video: FakeBackend, tweak: impl FnOnce(&mut QueueConfig)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let mut config = QueueConfig {
            output_dir: root.join("out"),
            ..Default::default()
        };
        tweak(&mut config);

        let video = Arc::new(video);
        let image: Arc<dyn ExecutionBackend> = Arc::new(FakeBackend::new(MediaKind::Image));
        let backends = BackendSet::new(video.clone(), image).unwrap();
        let events = Arc::new(EventBus::default());
        let aggregator = Arc::new(ResultAggregator::new(events.clone()));
        Fixture {
            _dir: dir,
            root,
            scheduler: Scheduler::new(config, backends, aggregator, events),
            video,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeBackend::new(MediaKind::Video), |_| {})
    }

    fn clip(root: &Path, name: &str) -> PathBuf {
        let path = root.join(name);
        std::fs::write(&path, b"fake video data").unwrap();
        path
    }

    fn speed_preset() -> Preset {
        Preset::Video(VideoPreset {
            speed: RangeParameter::new(0.9, 1.1),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn two_files_three_copies_each() {
        let f = fixture();
        let files = vec![clip(&f.root, "a.mp4"), clip(&f.root, "b.mp4")];
        let ids = f.scheduler.enqueue_batch(&files, speed_preset(), 3).unwrap();

        assert_eq!(f.scheduler.process_queue().await, 2);

        for id in ids {
            let job = f.scheduler.job(id).unwrap();
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.progress, 100);
            let results = job.results.unwrap();
            assert_eq!(results.len(), 3);
            for (i, artifact) in results.iter().enumerate() {
                assert_eq!(artifact.variant_index, i);
                let speed = artifact.parameters.video().unwrap().speed;
                assert!((0.9..=1.1).contains(&speed));
                assert!(!artifact.parameters.video().unwrap().flip_horizontal);
            }
        }
        assert_eq!(f.scheduler.aggregator().len(), 6);
        assert_eq!(f.scheduler.aggregator().by_source(ResultSource::Batch).len(), 6);
        assert!(!f.scheduler.is_processing());
    }

    #[tokio::test]
    async fn failing_copy_fails_the_whole_job() {
        let f = fixture_with(
            FakeBackend {
                fail_on: Some(1),
                ..FakeBackend::new(MediaKind::Video)
            },
            |_| {},
        );
        let id = f
            .scheduler
            .enqueue(&clip(&f.root, "a.mp4"), speed_preset(), 3)
            .unwrap();

        f.scheduler.process_queue().await;

        let job = f.scheduler.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.results.is_none());
        assert!(job.error.unwrap().contains("engine crashed"));
        assert_eq!(f.scheduler.jobs().len(), 1);
        assert!(f.scheduler.aggregator().is_empty());
        // The first copy's file was cleaned up with the job.
        assert!(!f.root.join("out").join(id.to_string()).join("a_v1.mp4").exists());
    }

    #[tokio::test]
    async fn loop_continues_after_a_failed_job() {
        let f = fixture_with(
            FakeBackend {
                fail_on: Some(0),
                ..FakeBackend::new(MediaKind::Video)
            },
            |_| {},
        );
        let bad = f.scheduler.enqueue(&clip(&f.root, "a.mp4"), speed_preset(), 1).unwrap();
        let image = clip(&f.root, "b.png");
        let good = f
            .scheduler
            .enqueue(&image, Preset::Image(ImagePreset::default()), 2)
            .unwrap();

        assert_eq!(f.scheduler.process_queue().await, 2);
        assert_eq!(f.scheduler.job(bad).unwrap().status, JobStatus::Error);
        assert_eq!(f.scheduler.job(good).unwrap().status, JobStatus::Completed);
        assert_eq!(f.scheduler.aggregator().by_source(ResultSource::Single).len(), 2);
    }

    #[tokio::test]
    async fn timeout_fails_the_copy() {
        let f = fixture_with(
            FakeBackend {
                delay: Duration::from_secs(5),
                ..FakeBackend::new(MediaKind::Video)
            },
            |c| c.copy_timeout_secs = 0,
        );
        let id = f.scheduler.enqueue(&clip(&f.root, "a.mp4"), speed_preset(), 1).unwrap();
        f.scheduler.process_queue().await;
        let job = f.scheduler.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.error.unwrap().contains("Timed out"));
    }

    #[tokio::test]
    async fn retry_resets_and_reruns() {
        let f = fixture_with(
            FakeBackend {
                fail_on: Some(0),
                ..FakeBackend::new(MediaKind::Video)
            },
            |_| {},
        );
        let id = f.scheduler.enqueue(&clip(&f.root, "a.mp4"), speed_preset(), 1).unwrap();
        f.scheduler.process_queue().await;

        f.scheduler.retry(id).unwrap();
        let job = f.scheduler.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(job.progress, 0);
        assert!(job.error.is_none());
        assert!(job.results.is_none());

        assert_matches!(f.scheduler.retry(id), Err(Error::Validation(_)));
        assert_matches!(f.scheduler.retry(JobId::new()), Err(Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn second_run_is_a_no_op_and_never_two_processing() {
        let f = fixture_with(
            FakeBackend {
                delay: Duration::from_millis(100),
                ..FakeBackend::new(MediaKind::Video)
            },
            |_| {},
        );
        let files = vec![clip(&f.root, "a.mp4"), clip(&f.root, "b.mp4")];
        f.scheduler.enqueue_batch(&files, speed_preset(), 2).unwrap();

        let scheduler = &f.scheduler;
        let observer = async {
            let mut max_processing = 0;
            while !scheduler.is_processing() {
                tokio::task::yield_now().await;
            }
            while scheduler.is_processing() {
                let n = scheduler
                    .jobs()
                    .iter()
                    .filter(|j| j.status == JobStatus::Processing)
                    .count();
                max_processing = max_processing.max(n);
                assert_eq!(scheduler.process_queue().await, 0);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            max_processing
        };

        let (processed, max_processing) = tokio::join!(scheduler.process_queue(), observer);
        assert_eq!(processed, 2);
        assert_eq!(max_processing, 1);
        assert_eq!(f.video.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn remove_rejects_processing_jobs() {
        let f = fixture_with(
            FakeBackend {
                delay: Duration::from_millis(100),
                ..FakeBackend::new(MediaKind::Video)
            },
            |_| {},
        );
        let id = f.scheduler.enqueue(&clip(&f.root, "a.mp4"), speed_preset(), 1).unwrap();

        let scheduler = &f.scheduler;
        let attempt = async {
            while scheduler.job(id).map(|j| j.status) != Some(JobStatus::Processing) {
                tokio::task::yield_now().await;
            }
            scheduler.remove(id)
        };
        let (_, removal) = tokio::join!(scheduler.process_queue(), attempt);
        assert_matches!(removal, Err(Error::Conflict(_)));

        // Finished jobs can be removed; their results stay aggregated.
        f.scheduler.remove(id).unwrap();
        assert!(f.scheduler.jobs().is_empty());
        assert_eq!(f.scheduler.aggregator().len(), 1);
    }

    #[tokio::test]
    async fn clear_resets_flag_and_keeps_results() {
        let f = fixture();
        f.scheduler.enqueue(&clip(&f.root, "a.mp4"), speed_preset(), 1).unwrap();
        f.scheduler.process_queue().await;
        f.scheduler.enqueue(&clip(&f.root, "b.mp4"), speed_preset(), 1).unwrap();

        assert_eq!(f.scheduler.clear(), 2);
        assert!(f.scheduler.jobs().is_empty());
        assert!(!f.scheduler.is_processing());
        assert_eq!(f.scheduler.aggregator().len(), 1);
        assert_eq!(f.scheduler.process_queue().await, 0);
    }

    #[test]
    fn validation_never_enters_the_queue() {
        let f = fixture();
        let video = clip(&f.root, "a.mp4");

        assert_matches!(
            f.scheduler.enqueue_batch(&[], speed_preset(), 1),
            Err(Error::Validation(msg)) if msg == "no files selected"
        );
        assert_matches!(
            f.scheduler.enqueue(&f.root.join("missing.mp4"), speed_preset(), 1),
            Err(Error::Validation(_))
        );
        assert_matches!(
            f.scheduler.enqueue(&video, Preset::Image(ImagePreset::default()), 1),
            Err(Error::Validation(_))
        );
        assert_matches!(f.scheduler.enqueue(&video, speed_preset(), 0), Err(Error::Validation(_)));
        assert_matches!(f.scheduler.enqueue(&video, speed_preset(), 51), Err(Error::Validation(_)));
        assert_matches!(
            f.scheduler.enqueue_batch(&[video.clone(), f.root.join("gone.mp4")], speed_preset(), 1),
            Err(Error::Validation(_))
        );
        assert!(f.scheduler.jobs().is_empty());
    }

    #[test]
    fn inverted_ranges_are_normalized_on_enqueue() {
        let f = fixture();
        let preset = Preset::Video(VideoPreset {
            speed: RangeParameter::new(1.2, 0.8),
            ..Default::default()
        });
        let id = f.scheduler.enqueue(&clip(&f.root, "a.mp4"), preset, 1).unwrap();
        let Preset::Video(stored) = f.scheduler.job(id).unwrap().preset else {
            panic!("expected a video preset");
        };
        assert_eq!((stored.speed.min, stored.speed.max), (0.8, 1.2));
    }

    #[tokio::test]
    async fn progress_events_are_published() {
        let f = fixture();
        let mut rx = f.scheduler.subscribe();
        f.scheduler.enqueue(&clip(&f.root, "a.mp4"), speed_preset(), 2).unwrap();
        f.scheduler.process_queue().await;

        let mut job_progress = Vec::new();
        let mut copy_events = 0;
        while let Ok(event) = rx.try_recv() {
            match event.payload {
                EventPayload::JobProgress { progress, .. } => job_progress.push(progress),
                EventPayload::CopyProgress { .. } => copy_events += 1,
                _ => {}
            }
        }
        assert_eq!(job_progress, vec![50, 100]);
        assert_eq!(copy_events, 2);
    }

    #[tokio::test]
    async fn finished_jobs_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("queue.json");
        let f = fixture_with(FakeBackend::new(MediaKind::Video), |c| {
            c.state_path = Some(state.clone())
        });
        let done = f.scheduler.enqueue(&clip(&f.root, "a.mp4"), speed_preset(), 1).unwrap();
        f.scheduler.process_queue().await;
        f.scheduler.enqueue(&clip(&f.root, "b.mp4"), speed_preset(), 1).unwrap();

        let g = fixture_with(FakeBackend::new(MediaKind::Video), |c| {
            c.state_path = Some(state.clone())
        });
        assert_eq!(g.scheduler.restore().unwrap(), 1);
        let jobs = g.scheduler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, done);
        assert_eq!(jobs[0].status, JobStatus::Completed);
    }
}
