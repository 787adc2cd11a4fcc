//! Job Store
//!
//! In-memory registry for streaming runs executed in the background. A job
//! is created before the run starts; the driver appends every progress
//! event as it is produced, and any number of readers poll with
//! [`JobStore::events_since`] using their own cursors. Status is derived
//! from the terminal event, so drivers never set it explicitly.
//!
//! Finished jobs are retained (default 20) so late readers can still fetch
//! the full event history; the oldest finished jobs are pruned when new
//! ones are created.

use crate::engine::CancellationToken;
use crate::types::{AppError, ProgressEvent, Result};
use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

/// Default number of finished jobs kept for late readers.
pub const DEFAULT_RETENTION: usize = 20;

/// Lifecycle state of a job, derived from its event history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No terminal event yet.
    Running,
    /// Terminated with `done`.
    Done,
    /// Terminated with `cancelled`.
    Cancelled,
    /// Terminated with `error`.
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        self != JobStatus::Running
    }
}

struct JobRecord {
    events: Vec<ProgressEvent>,
    status: JobStatus,
    token: CancellationToken,
    // Creation order, for oldest-first pruning.
    seq: u64,
}

struct Inner {
    jobs: HashMap<String, JobRecord>,
    next_seq: u64,
}

/// Registry of background runs.
pub struct JobStore {
    inner: Mutex<Inner>,
    retain: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retain` finished jobs around.
    pub fn with_retention(retain: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                next_seq: 0,
            }),
            retain,
        }
    }

    /// Register a new job. Returns its id and the cancellation token the
    /// driver should pass to the streaming run.
    pub fn create(&self) -> (String, CancellationToken) {
        let token = CancellationToken::new();
        let mut inner = self.inner.lock();

        let mut id = new_job_id();
        while inner.jobs.contains_key(&id) {
            id = new_job_id();
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(
            id.clone(),
            JobRecord {
                events: Vec::new(),
                status: JobStatus::Running,
                token: token.clone(),
                seq,
            },
        );
        Self::prune(&mut inner, self.retain);
        (id, token)
    }

    /// Append one event to a job's history; a terminal event also settles
    /// the job's status.
    pub fn append_event(&self, id: &str, event: ProgressEvent) -> Result<()> {
        let mut inner = self.inner.lock();
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| AppError::Validation(format!("unknown job '{id}'")))?;

        if event.is_terminal() {
            job.status = match event {
                ProgressEvent::Done { .. } => JobStatus::Done,
                ProgressEvent::Cancelled { .. } => JobStatus::Cancelled,
                _ => JobStatus::Failed,
            };
        }
        job.events.push(event);
        Ok(())
    }

    /// Events appended at or after `cursor`, plus the next cursor. Each
    /// reader keeps its own cursor; readers never disturb each other.
    pub fn events_since(&self, id: &str, cursor: usize) -> Result<(Vec<ProgressEvent>, usize)> {
        let inner = self.inner.lock();
        let job = inner
            .jobs
            .get(id)
            .ok_or_else(|| AppError::Validation(format!("unknown job '{id}'")))?;

        let start = cursor.min(job.events.len());
        let events = job.events[start..].to_vec();
        Ok((events, job.events.len()))
    }

    /// Request cancellation of a job. Idempotent; returns whether the job
    /// is known.
    pub fn cancel(&self, id: &str) -> bool {
        let inner = self.inner.lock();
        match inner.jobs.get(id) {
            Some(job) => {
                job.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, id: &str) -> Option<JobStatus> {
        self.inner.lock().jobs.get(id).map(|job| job.status)
    }

    fn prune(inner: &mut Inner, retain: usize) {
        let mut finished: Vec<(u64, String)> = inner
            .jobs
            .iter()
            .filter(|(_, job)| job.status.is_finished())
            .map(|(id, job)| (job.seq, id.clone()))
            .collect();
        if finished.len() <= retain {
            return;
        }
        finished.sort_unstable();
        for (_, id) in finished.iter().take(finished.len() - retain) {
            inner.jobs.remove(id);
        }
    }
}

fn new_job_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("job_{suffix}")
}
