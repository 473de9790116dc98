//! Ingest jobs: upload pipeline, job tracking and the worker pool.

mod processor;
mod store;
mod worker;

pub use processor::{JobProcessor, StageProgress, UploadPipeline};
pub use store::{JobRecord, JobStore};
pub use worker::{ResponseKind, WorkerPool, WorkerRequest, WorkerResponse, WorkerTask};
