//! Background generation runs and the committed schedules they produce.
//!
//! Runs go through one permit so lab capacity, which is shared by every
//! cohort, is always checked against the latest committed schedules. An
//! accepted outcome replaces the cohort's schedule wholesale; a rejected one
//! leaves the store untouched.

mod store;

use parking_lot::RwLock;
use sched_core::{config, GenerateOutcome, GenerateRequest, Solver};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

pub use store::ScheduleStore;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum JobStatus {
    Queued,
    Running,
    Accepted { outcome: GenerateOutcome },
    Rejected { outcome: GenerateOutcome },
    Failed { message: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

pub struct GenerationQueue<S: Solver> {
    jobs: Arc<RwLock<HashMap<JobId, JobStatus>>>,
    solver: Arc<S>,
    store: Arc<ScheduleStore>,
    permit: Arc<Mutex<()>>,
}

impl<S: Solver> Clone for GenerationQueue<S> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            solver: self.solver.clone(),
            store: self.store.clone(),
            permit: self.permit.clone(),
        }
    }
}

impl<S: Solver> GenerationQueue<S> {
    pub fn new(solver: S, store: Arc<ScheduleStore>) -> Self {
        Self {
            jobs: Default::default(),
            solver: Arc::new(solver),
            store,
            permit: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<ScheduleStore> {
        &self.store
    }

    /// Queues a run and returns immediately.
    pub fn enqueue(&self, req: GenerateRequest) -> JobId {
        let id = JobId(Uuid::new_v4().to_string());
        self.jobs.write().insert(id.clone(), JobStatus::Queued);

        let queue = self.clone();
        let job = id.clone();
        tokio::spawn(async move {
            let status = match queue.run_as(&job, req).await {
                Ok(outcome) if outcome.accepted => JobStatus::Accepted { outcome },
                Ok(outcome) => JobStatus::Rejected { outcome },
                Err(e) => {
                    error!(?e, job = %job, "generation failed");
                    JobStatus::Failed {
                        message: e.to_string(),
                    }
                }
            };
            queue.jobs.write().insert(job, status);
        });

        id
    }

    pub fn get(&self, id: &JobId) -> Option<JobStatus> {
        self.jobs.read().get(id).cloned()
    }

    /// Runs a generation to completion, committing it when accepted.
    pub async fn run(&self, req: GenerateRequest) -> anyhow::Result<GenerateOutcome> {
        let _permit = self.permit.lock().await;
        self.generate_and_commit(req).await
    }

    async fn run_as(&self, job: &JobId, req: GenerateRequest) -> anyhow::Result<GenerateOutcome> {
        let _permit = self.permit.lock().await;
        self.jobs.write().insert(job.clone(), JobStatus::Running);
        self.generate_and_commit(req).await
    }

    async fn generate_and_commit(
        &self,
        mut req: GenerateRequest,
    ) -> anyhow::Result<GenerateOutcome> {
        let cohort = req.cohort();
        config::apply_env_overrides(&mut req.constraints)?;
        req.external = self.store.external_for(&cohort);
        info!(%cohort, external = req.external.len(), "generation started");

        let outcome = self.solver.solve(req).await?;
        if outcome.accepted {
            let replaced = self.store.replace(&cohort, outcome.entries.clone());
            info!(%cohort, replaced, entries = outcome.entries.len(), "schedule committed");
        } else {
            warn!(%cohort, blocking = outcome.blocking().count(), "schedule not committed");
        }
        Ok(outcome)
    }
}
