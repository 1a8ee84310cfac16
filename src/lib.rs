//! decisions - Voice decision journal processing
//!
//! Turns a spoken recording into a structured decision record by running
//! it through upload, transcription, extraction and persistence, while
//! tracking each run as a processing job.
//!
//! # Architecture
//!
//! - Jobs live in a [`JobStore`] injected into a [`JobManager`]
//! - The [`VoiceProcessor`] drives one job through every stage and records
//!   the outcome on the job
//! - External services sit behind the traits in [`adapters`]
//! - A [`JobSweeper`] periodically removes finished jobs
//!
//! # Modules
//!
//! - `adapters`: External system integrations (Supabase, AssemblyAI, OpenAI)
//! - `core`: Job storage, status transitions and orchestration
//! - `domain`: Data structures (ProcessingJob, Extraction, NewDecision)
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process a recording into a decision
//! decisions process memo.m4a --user <user-id>
//!
//! # Extract from an existing transcript
//! cat transcript.txt | decisions extract
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{
    InMemoryJobStore, JobManager, JobStore, JobSweeper, ProcessingError, VoiceProcessor,
};
pub use domain::{Extraction, JobPatch, JobStatusView, ProcessingJob, ProcessingStatus};
