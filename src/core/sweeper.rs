//! Periodic removal of finished jobs.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::job_manager::{JobManager, DEFAULT_MAX_JOB_AGE};

/// Default delay between sweeps (1 hour)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Background task that calls [`JobManager::cleanup_old_jobs`] on an interval
pub struct JobSweeper {
    jobs: JobManager,
    max_age: Duration,
    interval: Duration,
}

/// Handle to a running sweeper
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<usize>,
}

impl SweeperHandle {
    /// Stop the sweeper and return how many jobs it removed in total
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(total) => total,
            Err(e) => {
                warn!(error = %e, "Job sweeper task ended abnormally");
                0
            }
        }
    }
}

impl JobSweeper {
    pub fn new(jobs: JobManager) -> Self {
        Self {
            jobs,
            max_age: DEFAULT_MAX_JOB_AGE,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Age after which terminal jobs are removed
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Delay between sweeps
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one sweep now
    pub async fn sweep_once(&self) -> usize {
        let removed = self.jobs.cleanup_old_jobs(self.max_age).await;
        if removed > 0 {
            info!(removed, "Swept finished jobs");
        } else {
            debug!("No finished jobs to sweep");
        }
        removed
    }

    /// Start sweeping in the background. The first sweep runs immediately.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            // interval() panics on a zero period
            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut total = 0;

            info!(
                interval_secs = self.interval.as_secs(),
                max_age_secs = self.max_age.as_secs(),
                "Job sweeper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        total += self.sweep_once().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(total, "Job sweeper stopped");
            total
        });

        SweeperHandle { shutdown, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_once_removes_only_finished_jobs() {
        let jobs = JobManager::in_memory();
        let done = jobs.create_job("user1", None, None).await;
        let running = jobs.create_job("user1", None, None).await;
        jobs.mark_failed(done.id, "boom", None).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        let sweeper = JobSweeper::new(jobs.clone()).with_max_age(Duration::ZERO);

        assert_eq!(sweeper.sweep_once().await, 1);
        assert!(jobs.get_job(done.id).await.is_none());
        assert!(jobs.get_job(running.id).await.is_some());
    }

    fn failing_sweep() -> usize {
        panic!("sweep failed")
    }

    #[tokio::test]
    async fn test_shutdown_of_panicked_sweeper_reports_zero() {
        let (shutdown, _rx) = watch::channel(false);
        let task = tokio::spawn(async { failing_sweep() });
        let handle = SweeperHandle { shutdown, task };

        assert_eq!(handle.shutdown().await, 0);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_until_shutdown() {
        let jobs = JobManager::in_memory();
        let job = jobs.create_job("user1", None, None).await;
        jobs.mark_failed(job.id, "boom", None).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let handle = JobSweeper::new(jobs.clone())
            .with_max_age(Duration::ZERO)
            .with_interval(Duration::from_millis(10))
            .spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let removed = handle.shutdown().await;

        assert_eq!(removed, 1);
        assert_eq!(jobs.job_count().await, 0);
    }
}
