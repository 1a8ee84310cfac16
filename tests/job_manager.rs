//! Job Manager Integration Tests
//!
//! Tests for job creation, merging updates, status views and cleanup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use decisions::core::JobManager;
use decisions::domain::{Extraction, JobPatch, ProcessingStatus};

#[tokio::test]
async fn test_new_job_starts_uploaded_with_nothing_set() {
    let jobs = JobManager::in_memory();

    let job = jobs.create_job("user1", None, None).await;

    assert_eq!(job.user_id, "user1");
    assert_eq!(job.status, ProcessingStatus::Uploaded);
    assert_eq!(job.progress, 0.0);
    assert_eq!(job.retry_count, 0);
    assert!(job.audio_url.is_none());
    assert!(job.audio_duration_seconds.is_none());
    assert!(job.transcript.is_none());
    assert!(job.extraction.is_none());
    assert!(job.decision_id.is_none());
    assert!(job.error_message.is_none());
    assert!(job.error_code.is_none());
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());

    // Stored copy is identical
    assert_eq!(jobs.get_job(job.id).await, Some(job));
}

#[tokio::test]
async fn test_job_ids_are_unique() {
    let jobs = JobManager::in_memory();
    let a = jobs.create_job("user1", None, None).await;
    let b = jobs.create_job("user1", None, None).await;

    assert_ne!(a.id, b.id);
    assert_eq!(jobs.job_count().await, 2);
}

#[tokio::test]
async fn test_update_unknown_job_creates_nothing() {
    let jobs = JobManager::in_memory();
    let missing = Uuid::new_v4();

    let result = jobs
        .update_job(
            missing,
            JobPatch {
                status: Some(ProcessingStatus::Transcribing),
                progress: Some(0.3),
                ..Default::default()
            },
        )
        .await;

    assert!(result.is_none());
    assert!(jobs.get_job(missing).await.is_none());
    assert_eq!(jobs.job_count().await, 0);
}

#[tokio::test]
async fn test_update_merges_only_given_fields() {
    let jobs = JobManager::in_memory();
    let job = jobs
        .create_job("user1", Some("https://a/1.webm".to_string()), Some(3.0))
        .await;

    let updated = jobs
        .update_job(
            job.id,
            JobPatch {
                transcript: Some("hello".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.transcript.as_deref(), Some("hello"));
    assert_eq!(updated.audio_url.as_deref(), Some("https://a/1.webm"));
    assert_eq!(updated.audio_duration_seconds, Some(3.0));
    assert_eq!(updated.status, ProcessingStatus::Uploaded);
    assert_eq!(updated.created_at, job.created_at);
}

#[tokio::test]
async fn test_audio_url_is_write_once() {
    let jobs = JobManager::in_memory();
    let job = jobs
        .create_job("user1", Some("https://a/original.webm".to_string()), None)
        .await;

    let updated = jobs
        .update_job(
            job.id,
            JobPatch {
                audio_url: Some("https://a/other.webm".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.audio_url.as_deref(), Some("https://a/original.webm"));
}

#[tokio::test]
async fn test_mark_completed_records_results() {
    let jobs = JobManager::in_memory();
    let job = jobs.create_job("user1", None, None).await;

    let done = jobs
        .mark_completed(job.id, "transcript", Extraction::placeholder(), "decision-9")
        .await
        .unwrap();

    assert_eq!(done.status, ProcessingStatus::Completed);
    assert_eq!(done.progress, 1.0);
    assert_eq!(done.decision_id.as_deref(), Some("decision-9"));
    assert_eq!(done.transcript.as_deref(), Some("transcript"));
    assert_eq!(done.extraction, Some(Extraction::placeholder()));
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn test_terminal_job_does_not_transition() {
    let jobs = JobManager::in_memory();
    let job = jobs.create_job("user1", None, None).await;
    let done = jobs
        .mark_completed(job.id, "transcript", Extraction::placeholder(), "decision-9")
        .await
        .unwrap();

    let after_status = jobs
        .update_status(job.id, ProcessingStatus::Transcribing, 0.3)
        .await
        .unwrap();
    let after_failure = jobs
        .mark_failed(job.id, "late failure", Some("PROCESSING_ERROR"))
        .await
        .unwrap();

    assert_eq!(after_status, done);
    assert_eq!(after_failure, done);
    assert_eq!(after_failure.status, ProcessingStatus::Completed);
    assert!(after_failure.completed_at.is_some());
    assert_eq!(after_failure.decision_id.as_deref(), Some("decision-9"));
    assert!(after_failure.error_message.is_none());
}

#[tokio::test]
async fn test_status_view_serializes_camel_case() {
    let jobs = JobManager::in_memory();
    let job = jobs.create_job("user1", None, None).await;
    let failed = jobs
        .mark_failed(job.id, "Transcription failed: timeout", Some("PROCESSING_ERROR"))
        .await
        .unwrap();

    let json = serde_json::to_value(failed.status_view()).unwrap();

    assert_eq!(json["jobId"], job.id.to_string());
    assert_eq!(json["status"], "failed");
    assert_eq!(json["progress"], 1.0);
    assert_eq!(json["errorCode"], "PROCESSING_ERROR");
    assert_eq!(json["errorMessage"], "Transcription failed: timeout");
    assert!(json["decisionId"].is_null());
}

#[tokio::test]
async fn test_concurrent_updates_are_not_lost() {
    let jobs = JobManager::in_memory();
    let job = jobs.create_job("user1", None, None).await;

    let transcript = {
        let jobs = jobs.clone();
        tokio::spawn(async move {
            jobs.update_job(
                job.id,
                JobPatch {
                    transcript: Some("words".to_string()),
                    ..Default::default()
                },
            )
            .await
        })
    };
    let duration = {
        let jobs = jobs.clone();
        tokio::spawn(async move {
            jobs.update_job(
                job.id,
                JobPatch {
                    audio_duration_seconds: Some(12.0),
                    ..Default::default()
                },
            )
            .await
        })
    };
    transcript.await.unwrap();
    duration.await.unwrap();

    let merged = jobs.get_job(job.id).await.unwrap();
    assert_eq!(merged.transcript.as_deref(), Some("words"));
    assert_eq!(merged.audio_duration_seconds, Some(12.0));
}

// ============================================================================
// Cleanup
// ============================================================================

#[tokio::test]
async fn test_cleanup_removes_only_old_terminal_jobs() {
    let jobs = JobManager::in_memory();
    let max_age = Duration::from_secs(24 * 60 * 60);

    let completed = jobs.create_job("user1", None, None).await;
    jobs.mark_completed(completed.id, "t", Extraction::placeholder(), "d1")
        .await;
    let failed = jobs.create_job("user1", None, None).await;
    jobs.mark_failed(failed.id, "boom", None).await;
    let in_flight = jobs.create_job("user1", None, None).await;
    jobs.update_status(in_flight.id, ProcessingStatus::Transcribing, 0.3)
        .await;

    // Nothing is old enough yet
    assert_eq!(jobs.cleanup_old_jobs_at(max_age, Utc::now()).await, 0);
    assert_eq!(jobs.job_count().await, 3);

    // Two days later the finished jobs go, the stuck one stays
    let later = Utc::now() + chrono::Duration::hours(48);
    assert_eq!(jobs.cleanup_old_jobs_at(max_age, later).await, 2);

    assert!(jobs.get_job(completed.id).await.is_none());
    assert!(jobs.get_job(failed.id).await.is_none());
    assert!(jobs.get_job(in_flight.id).await.is_some());
}

#[tokio::test]
async fn test_cleanup_keeps_job_exactly_at_max_age() {
    let jobs = JobManager::in_memory();
    let job = jobs.create_job("user1", None, None).await;
    jobs.mark_failed(job.id, "boom", None).await;

    let max_age = Duration::from_secs(60);
    let boundary = job.created_at + chrono::Duration::seconds(60);

    assert_eq!(jobs.cleanup_old_jobs_at(max_age, boundary).await, 0);
    assert_eq!(
        jobs.cleanup_old_jobs_at(max_age, boundary + chrono::Duration::milliseconds(1))
            .await,
        1
    );
}

#[tokio::test]
async fn test_shared_store_between_managers() {
    let store = Arc::new(decisions::core::InMemoryJobStore::new());
    let writer = JobManager::new(store.clone());
    let reader = JobManager::new(store);

    let job = writer.create_job("user1", None, None).await;
    writer
        .update_status(job.id, ProcessingStatus::Extracting, 0.7)
        .await;

    let seen = reader.get_job(job.id).await.unwrap();
    assert_eq!(seen.status, ProcessingStatus::Extracting);
    assert_eq!(seen.progress, 0.7);
}
