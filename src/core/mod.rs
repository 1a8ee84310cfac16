//! Core processing logic.
//!
//! This module contains:
//! - JobStore: Keyed storage for processing jobs
//! - JobManager: Status transitions and cleanup over a store
//! - VoiceProcessor: The upload → transcribe → extract → persist pipeline
//! - JobSweeper: Periodic removal of finished jobs

pub mod job_manager;
pub mod job_store;
pub mod orchestrator;
pub mod sweeper;

// Re-export commonly used types
pub use job_manager::{JobManager, DEFAULT_MAX_JOB_AGE};
pub use job_store::{InMemoryJobStore, JobStore};
pub use orchestrator::{ProcessingError, VoiceAnalysis, VoiceProcessor, PROCESSING_ERROR_CODE};
pub use sweeper::{JobSweeper, SweeperHandle, DEFAULT_SWEEP_INTERVAL};
