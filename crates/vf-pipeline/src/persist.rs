//! JSON snapshot of finished jobs.
//!
//! Only `completed` and `error` jobs are written and restored; a job that was
//! `waiting` or `processing` when the process died is never resumed.

use std::path::Path;

use vf_core::Error;

use crate::job::Job;

/// Write the terminal jobs in `jobs` as a JSON array, atomically.
pub fn save_jobs(path: &Path, jobs: &[Job]) -> vf_core::Result<usize> {
    let history: Vec<&Job> = jobs.iter().filter(|j| j.status.is_terminal()).collect();
    let json = serde_json::to_vec_pretty(&history)
        .map_err(|e| Error::Internal(format!("queue serialize error: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(history.len())
}

/// Read a snapshot written by [`save_jobs`].
///
/// A missing file yields an empty list. Entries that fail to parse or are
/// not terminal are skipped with a warning.
pub fn load_jobs(path: &Path) -> vf_core::Result<Vec<Job>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let entries: Vec<serde_json::Value> = serde_json::from_str(&contents).map_err(|e| {
        Error::Validation(format!("queue state {} is not a JSON array: {e}", path.display()))
    })?;

    let mut jobs = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Job>(entry) {
            Ok(job) if job.status.is_terminal() => jobs.push(job),
            Ok(job) => {
                tracing::warn!(job_id = %job.id, status = %job.status, "skipping non-terminal job in queue state");
            }
            Err(e) => {
                tracing::warn!(entry = i, "skipping unreadable job in queue state: {e}");
            }
        }
    }
    Ok(jobs)
}
