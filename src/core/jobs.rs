use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{RegdiffError, Result};

pub type JobId = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "kebab-case")]
pub enum JobStatus<T> {
    Queued,
    Running,
    Completed(T),
    Failed(String),
}

impl<T> JobStatus<T> {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed(_) | JobStatus::Failed(_))
    }
}

/// Caller's view of a submitted job
pub struct JobHandle<T> {
    id: JobId,
    receiver: watch::Receiver<JobStatus<T>>,
}

impl<T: Clone> JobHandle<T> {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> JobStatus<T> {
        self.receiver.borrow().clone()
    }

    /// Wait until the job finishes and return its result
    pub async fn wait(mut self) -> Result<T> {
        let id = self.id;
        let status = self
            .receiver
            .wait_for(JobStatus::is_finished)
            .await
            .map_err(|_| RegdiffError::Job(format!("Job {} stopped before finishing", id)))?
            .clone();

        match status {
            JobStatus::Completed(value) => Ok(value),
            JobStatus::Failed(error) => Err(RegdiffError::Job(error)),
            JobStatus::Queued | JobStatus::Running => {
                Err(RegdiffError::Job(format!("Job {} did not finish", id)))
            }
        }
    }
}

/// Runs submitted jobs on the tokio runtime, at most `workers` at a time.
///
/// Finished jobs stay pollable until more than `retained` of them pile up;
/// the oldest are then dropped on the next submit.
pub struct JobQueue<T> {
    permits: Arc<Semaphore>,
    workers: usize,
    retained: usize,
    next_id: AtomicU64,
    jobs: RwLock<BTreeMap<JobId, watch::Receiver<JobStatus<T>>>>,
}

impl<T> JobQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(workers: usize, retained: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            retained,
            next_id: AtomicU64::new(1),
            jobs: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue a job; it starts as soon as a worker slot is free
    pub async fn submit<F>(&self, job: F) -> JobHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = watch::channel(JobStatus::Queued);
        {
            let mut jobs = self.jobs.write().await;
            self.evict_finished(&mut jobs);
            jobs.insert(id, receiver.clone());
        }

        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    sender.send_replace(JobStatus::Failed("Worker pool closed".to_string()));
                    return;
                }
            };

            debug!("Job {} running", id);
            sender.send_replace(JobStatus::Running);

            let status = match job.await {
                Ok(value) => {
                    info!("Job {} completed", id);
                    JobStatus::Completed(value)
                }
                Err(e) => {
                    warn!("Job {} failed: {}", id, e);
                    JobStatus::Failed(e.to_string())
                }
            };
            sender.send_replace(status);
        });

        debug!("Job {} queued", id);
        JobHandle { id, receiver }
    }

    /// Poll any job submitted to this queue
    pub async fn status(&self, id: JobId) -> Option<JobStatus<T>> {
        self.jobs
            .read()
            .await
            .get(&id)
            .map(|receiver| receiver.borrow().clone())
    }

    /// Stop tracking a job. Returns false for unknown ids.
    pub async fn forget(&self, id: JobId) -> bool {
        self.jobs.write().await.remove(&id).is_some()
    }

    // Ids grow monotonically, so map order is submission order
    fn evict_finished(&self, jobs: &mut BTreeMap<JobId, watch::Receiver<JobStatus<T>>>) {
        let finished: Vec<JobId> = jobs
            .iter()
            .filter(|(_, receiver)| receiver.borrow().is_finished())
            .map(|(&id, _)| id)
            .collect();

        let excess = finished.len().saturating_sub(self.retained);
        for id in &finished[..excess] {
            jobs.remove(id);
        }
        if excess > 0 {
            debug!("Evicted {} finished jobs", excess);
        }
    }
}
