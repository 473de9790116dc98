//! Job store for tracking ingest job status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::types::{JobStatus, JobStatusResponse, PipelineStage};

/// In-memory job store for tracking ingest jobs.
pub struct JobStore {
    jobs: HashMap<Uuid, JobRecord>,
}

/// Internal record for tracking a job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_documents: usize,
    pub processed_documents: usize,
    pub chunks_created: usize,
    pub failed_stage: Option<PipelineStage>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub cancel: CancellationToken,
}

impl JobRecord {
    pub fn new(job_id: Uuid, total_documents: usize) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            total_documents,
            processed_documents: 0,
            chunks_created: 0,
            failed_stage: None,
            error: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn update_progress(&mut self, processed: usize, chunks: usize) {
        self.processed_documents = processed;
        self.chunks_created = chunks;
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the job as failed. The first failure's stage is kept.
    pub fn fail(&mut self, stage: Option<PipelineStage>, error: String) {
        self.status = JobStatus::Failed;
        if self.failed_stage.is_none() {
            self.failed_stage = stage;
        }
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    pub fn to_response(&self) -> JobStatusResponse {
        JobStatusResponse {
            job_id: self.job_id,
            status: self.status,
            total_documents: self.total_documents,
            processed_documents: self.processed_documents,
            chunks_created: self.chunks_created,
            failed_stage: self.failed_stage,
            error: self.error.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Create a new job and return its ID.
    pub fn create_job(&mut self, total_documents: usize) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs
            .insert(job_id, JobRecord::new(job_id, total_documents));
        job_id
    }

    pub fn get_job(&self, job_id: Uuid) -> Option<&JobRecord> {
        self.jobs.get(&job_id)
    }

    pub fn get_job_mut(&mut self, job_id: Uuid) -> Option<&mut JobRecord> {
        self.jobs.get_mut(&job_id)
    }

    /// The job's cancellation token, shared with whoever runs it.
    pub fn cancellation_token(&self, job_id: Uuid) -> Option<CancellationToken> {
        self.jobs.get(&job_id).map(|j| j.cancel.clone())
    }

    pub fn start_job(&mut self, job_id: Uuid) -> bool {
        self.with_job(job_id, JobRecord::start)
    }

    pub fn update_job_progress(&mut self, job_id: Uuid, processed: usize, chunks: usize) -> bool {
        self.with_job(job_id, |job| job.update_progress(processed, chunks))
    }

    pub fn complete_job(&mut self, job_id: Uuid) -> bool {
        self.with_job(job_id, JobRecord::complete)
    }

    pub fn fail_job(&mut self, job_id: Uuid, stage: Option<PipelineStage>, error: String) -> bool {
        self.with_job(job_id, |job| job.fail(stage, error))
    }

    /// Request cancellation of a job that has not finished.
    ///
    /// Returns false for unknown or already terminal jobs.
    pub fn cancel_job(&mut self, job_id: Uuid) -> bool {
        match self.jobs.get_mut(&job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.cancel.cancel();
                if job.status == JobStatus::Pending {
                    job.mark_cancelled();
                }
                true
            }
            _ => false,
        }
    }

    pub fn mark_cancelled(&mut self, job_id: Uuid) -> bool {
        self.with_job(job_id, JobRecord::mark_cancelled)
    }

    pub fn get_job_status(&self, job_id: Uuid) -> Option<JobStatusResponse> {
        self.jobs.get(&job_id).map(|j| j.to_response())
    }

    /// Drop terminal jobs that finished longer than `retention` ago.
    /// Returns how many were dropped.
    pub fn cleanup_old_jobs(&mut self, retention: chrono::Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            if job.status.is_terminal() {
                job.completed_at.map_or(true, |t| t > cutoff)
            } else {
                true
            }
        });
        before - self.jobs.len()
    }

    pub fn get_job_counts(&self) -> HashMap<JobStatus, usize> {
        let mut counts = HashMap::new();
        for job in self.jobs.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }

    fn with_job(&mut self, job_id: Uuid, f: impl FnOnce(&mut JobRecord)) -> bool {
        match self.jobs.get_mut(&job_id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
