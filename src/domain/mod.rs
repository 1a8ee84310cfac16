//! Domain types for the decisions voice pipeline.
//!
//! This module contains the core data structures:
//! - Job: Processing job state and partial updates
//! - Extraction: Structured decision data from a transcript
//! - Decision: Records handed to the persistence layer

pub mod decision;
pub mod extraction;
pub mod job;

// Re-export commonly used types
pub use decision::{DecisionRecord, DecisionStatus, NewDecision, DEFAULT_CATEGORY};
pub use extraction::{EmotionalState, ExtractedOption, Extraction};
pub use job::{JobPatch, JobStatusView, ProcessingJob, ProcessingStatus};
