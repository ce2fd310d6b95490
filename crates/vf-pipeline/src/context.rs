//! Progress reporting shared by every backend invocation.

/// Sender for reporting progress from within a backend.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) for
/// the current copy and a short step description.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress.clamp(0.0, 100.0), step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn forwards_clamped_values() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sender = ProgressSender::new(move |pct, step| sink.lock().push((pct, step.to_string())));
        sender.send(42.0, "encoding");
        sender.send(130.0, "done");
        assert_eq!(
            *seen.lock(),
            vec![(42.0, "encoding".to_string()), (100.0, "done".to_string())]
        );
    }
}
