//! End-to-end queue tests: enqueue through the scheduler, run with fake
//! backends, observe jobs and aggregated results.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use common::{FakeBackend, TestHarness};
use vf_core::{Error, ImagePreset, Preset, RangeParameter, ResultSource, VideoPreset};
use vf_pipeline::JobStatus;

fn speed_only() -> Preset {
    Preset::Video(VideoPreset {
        name: "speed-only".into(),
        speed: RangeParameter::new(0.9, 1.1),
        ..Default::default()
    })
}

#[tokio::test]
async fn batch_of_two_files_with_three_copies() {
    let h = TestHarness::new();
    let files = vec![h.input("first.mp4"), h.input("second.mp4")];
    let before = h.ctx.aggregator.len();

    let ids = h.ctx.scheduler.enqueue_batch(&files, speed_only(), 3).unwrap();
    assert_eq!(h.ctx.scheduler.process_queue().await, 2);

    for id in &ids {
        let job = h.ctx.scheduler.job(*id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        let results = job.results.unwrap();
        assert_eq!(results.len(), 3);
        for artifact in &results {
            let params = artifact.parameters.video().unwrap();
            assert!((0.9..=1.1).contains(&params.speed), "speed {}", params.speed);
            assert!(!params.flip_horizontal);
            assert!(artifact.location.exists());
        }
    }
    assert_eq!(h.ctx.aggregator.len(), before + 6);
    assert_eq!(h.ctx.aggregator.by_source(ResultSource::Batch).len(), 6);
    assert_eq!(h.video.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn backend_failure_marks_job_as_error() {
    let h = TestHarness::with_backends(FakeBackend::video().failing(), FakeBackend::video(), |_| {});
    let id = h.ctx.scheduler.enqueue(&h.input("clip.mp4"), speed_only(), 2).unwrap();

    h.ctx.scheduler.process_queue().await;

    let job = h.ctx.scheduler.job(id).unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.results.is_none());
    assert!(job.error.unwrap().contains("encoder exited"));
    assert_eq!(h.ctx.scheduler.jobs().len(), 1);
    assert!(h.ctx.aggregator.is_empty());
    assert!(!h.ctx.scheduler.is_processing());
}

#[tokio::test]
async fn retry_after_fixing_the_backend_completes() {
    let h = TestHarness::with_backends(FakeBackend::video().failing(), FakeBackend::video(), |_| {});
    let id = h.ctx.scheduler.enqueue(&h.input("clip.mp4"), speed_only(), 2).unwrap();
    h.ctx.scheduler.process_queue().await;
    assert_eq!(h.ctx.scheduler.job(id).unwrap().status, JobStatus::Error);

    h.video.failing.store(false, Ordering::SeqCst);
    h.ctx.scheduler.retry(id).unwrap();
    h.ctx.scheduler.process_queue().await;

    let job = h.ctx.scheduler.job(id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error.is_none());
    assert_eq!(job.results.unwrap().len(), 2);
    assert_eq!(h.ctx.aggregator.by_source(ResultSource::Single).len(), 2);
}

#[tokio::test]
async fn mixed_media_uses_the_matching_backend() {
    let h = TestHarness::new();
    h.ctx.scheduler.enqueue(&h.input("clip.mp4"), speed_only(), 1).unwrap();
    let photo = h
        .ctx
        .scheduler
        .enqueue(&h.input("photo.jpg"), Preset::Image(ImagePreset::default()), 2)
        .unwrap();

    h.ctx.scheduler.process_queue().await;

    assert_eq!(h.video.calls.load(Ordering::SeqCst), 1);
    let job = h.ctx.scheduler.job(photo).unwrap();
    let names: Vec<String> = job.results.unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["photo_v1.jpg", "photo_v2.jpg"]);
}

#[tokio::test]
async fn rejected_inputs_leave_the_queue_untouched() {
    let h = TestHarness::new();
    let video = h.input("clip.mp4");

    assert_matches!(
        h.ctx.scheduler.enqueue(&video, Preset::Image(ImagePreset::default()), 1),
        Err(Error::Validation(_))
    );
    assert_matches!(
        h.ctx.scheduler.enqueue_batch(&[], speed_only(), 1),
        Err(Error::Validation(_))
    );
    assert_matches!(
        h.ctx.scheduler.enqueue(&h.dir.path().join("nope.mp4"), speed_only(), 1),
        Err(Error::Validation(_))
    );
    assert!(h.ctx.scheduler.jobs().is_empty());
}

#[tokio::test]
async fn history_survives_a_restart() {
    let state = tempfile::tempdir().unwrap();
    let state_path = state.path().join("queue.json");

    let h = TestHarness::with_backends(FakeBackend::video(), FakeBackend::video(), |c| {
        c.queue.state_path = Some(state_path.clone());
    });
    let done = h.ctx.scheduler.enqueue(&h.input("a.mp4"), speed_only(), 1).unwrap();
    h.ctx.scheduler.process_queue().await;
    // Still waiting when the process "dies": never restored.
    h.ctx.scheduler.enqueue(&h.input("b.mp4"), speed_only(), 1).unwrap();
    drop(h);

    let restarted = TestHarness::with_backends(FakeBackend::video(), FakeBackend::video(), |c| {
        c.queue.state_path = Some(state_path.clone());
    });
    assert_eq!(restarted.ctx.scheduler.restore().unwrap(), 1);
    let jobs = restarted.ctx.scheduler.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, done);
    assert_eq!(jobs[0].status, JobStatus::Completed);
}
