//! Fixed-interval sync job scheduler with single-flight execution.
//!
//! Each named job owns a recurring `tokio::time::interval` timer and a
//! membership flag in a shared running-set. A tick that finds its job already
//! running is skipped, never queued — the job body is responsible for making
//! forward progress on its own schedule, not the scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;
use crate::metrics::Metrics;

/// The job body's collaborator. The real external-provider ingestion
/// adapters are out of scope; this crate ships only test doubles.
#[async_trait]
pub trait SyncProvider: Send + Sync + 'static {
    async fn sync(&self) -> anyhow::Result<()>;
}

/// Test double that always succeeds immediately.
pub struct NoopSyncProvider;

#[async_trait]
impl SyncProvider for NoopSyncProvider {
    async fn sync(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Test double that counts invocations and optionally sleeps, for exercising
/// single-flight behavior under a slow provider.
pub struct CountingSyncProvider {
    pub runs: std::sync::atomic::AtomicU64,
    pub delay: Duration,
}

impl CountingSyncProvider {
    pub fn new(delay: Duration) -> Self {
        Self { runs: std::sync::atomic::AtomicU64::new(0), delay }
    }

    pub fn run_count(&self) -> u64 {
        self.runs.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncProvider for CountingSyncProvider {
    async fn sync(&self) -> anyhow::Result<()> {
        self.runs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// Configuration for one scheduled job.
pub struct JobConfig {
    pub name: String,
    pub interval: Duration,
    pub run_immediately: bool,
    pub provider: Arc<dyn SyncProvider>,
}

/// Whether a job is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
}

struct JobHandle {
    running: Arc<std::sync::atomic::AtomicBool>,
    provider: Arc<dyn SyncProvider>,
    cancellation: CancellationToken,
    timer_task: tokio::task::JoinHandle<()>,
}

/// Owns every scheduled job's timer task and single-flight guard.
#[derive(Clone)]
pub struct Scheduler {
    jobs: Arc<Mutex<HashMap<String, JobHandle>>>,
    metrics: Metrics,
}

impl Scheduler {
    pub fn new(metrics: Metrics) -> Self {
        Self { jobs: Arc::new(Mutex::new(HashMap::new())), metrics }
    }

    /// Replaces any existing schedule for `config.name`. If `run_immediately`
    /// the job runs once synchronously before the recurring timer is armed;
    /// errors from that run surface only through tracing, never to the caller.
    pub async fn schedule(&self, config: JobConfig) {
        self.stop(&config.name).await;

        let running = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let cancellation = CancellationToken::new();

        if config.run_immediately {
            Self::run_once(&config.name, &config.provider, &running, &self.metrics).await;
        }

        let name = config.name.clone();
        let provider = config.provider.clone();
        let interval = config.interval;
        let metrics = self.metrics.clone();
        let running_for_task = running.clone();
        let token = cancellation.clone();

        let timer_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; the caller already ran it if requested.
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {
                        Self::run_once(&name, &provider, &running_for_task, &metrics).await;
                    }
                }
            }
        });

        self.jobs.lock().await.insert(
            config.name,
            JobHandle { running, provider: config.provider, cancellation, timer_task },
        );
    }

    /// Runs the job body under the single-flight guard, recording outcome
    /// metrics and converting a panic into a failure result.
    #[tracing::instrument(skip(provider, running, metrics), fields(job = name))]
    async fn run_once(name: &str, provider: &Arc<dyn SyncProvider>, running: &Arc<std::sync::atomic::AtomicBool>, metrics: &Metrics) {
        if running
            .compare_exchange(false, true, std::sync::atomic::Ordering::SeqCst, std::sync::atomic::Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("tick skipped: previous run still in flight");
            metrics.record_scheduler_skip(name);
            return;
        }

        let started = Instant::now();
        let provider = provider.clone();
        let outcome = AssertUnwindSafe(provider.sync()).catch_unwind().await;
        let duration = started.elapsed();
        running.store(false, std::sync::atomic::Ordering::SeqCst);

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(?duration, "sync job completed");
                metrics.record_scheduler_run(name, true, duration);
            }
            Ok(Err(err)) => {
                tracing::warn!(%err, ?duration, "sync job failed");
                metrics.record_scheduler_run(name, false, duration);
            }
            Err(_) => {
                tracing::error!(?duration, "sync job panicked");
                metrics.record_scheduler_run(name, false, duration);
            }
        }
    }

    /// Disarms the job's timer. An in-flight run completes and releases the
    /// single-flight flag normally; it is never interrupted mid-tick.
    pub async fn stop(&self, name: &str) {
        if let Some(handle) = self.jobs.lock().await.remove(name) {
            handle.cancellation.cancel();
            handle.timer_task.abort();
        }
    }

    pub async fn stop_all(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, handle) in jobs.drain() {
            handle.cancellation.cancel();
            handle.timer_task.abort();
        }
    }

    /// Synchronous invocation with the same single-flight guard as a tick.
    pub async fn trigger(&self, name: &str) -> Result<(), SchedulerError> {
        let (provider, running) = {
            let jobs = self.jobs.lock().await;
            let handle = jobs.get(name).ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
            (handle.provider.clone(), handle.running.clone())
        };
        Self::run_once(name, &provider, &running, &self.metrics).await;
        Ok(())
    }

    pub async fn status(&self, name: &str) -> Option<JobStatus> {
        let jobs = self.jobs.lock().await;
        jobs.get(name).map(|handle| {
            if handle.running.load(std::sync::atomic::Ordering::SeqCst) {
                JobStatus::Running
            } else {
                JobStatus::Idle
            }
        })
    }

    pub async fn active_jobs(&self) -> Vec<String> {
        self.jobs.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_immediately_executes_synchronously_before_returning() {
        let metrics = Metrics::new();
        let scheduler = Scheduler::new(metrics.clone());
        let provider = Arc::new(CountingSyncProvider::new(Duration::ZERO));

        scheduler
            .schedule(JobConfig {
                name: "sync-a".into(),
                interval: Duration::from_secs(3600),
                run_immediately: true,
                provider: provider.clone(),
            })
            .await;

        assert_eq!(provider.run_count(), 1);
        assert_eq!(metrics.counter_total("scheduler.run.count"), 1);
        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn single_flight_skips_a_tick_while_the_previous_run_is_in_flight() {
        let metrics = Metrics::new();
        let scheduler = Scheduler::new(metrics.clone());
        let provider = Arc::new(CountingSyncProvider::new(Duration::from_millis(500)));

        scheduler
            .schedule(JobConfig {
                name: "slow-sync".into(),
                interval: Duration::from_millis(50),
                run_immediately: true,
                provider: provider.clone(),
            })
            .await;

        tokio::time::sleep(Duration::from_millis(600)).await;

        let runs = provider.run_count();
        assert!(runs >= 1 && runs <= 2, "expected 1 or 2 runs, got {runs}");
        assert!(metrics.counter_total("scheduler.skip.count") >= 1);
        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn stop_disarms_the_timer_without_aborting_an_inflight_run() {
        let metrics = Metrics::new();
        let scheduler = Scheduler::new(metrics.clone());
        let provider = Arc::new(CountingSyncProvider::new(Duration::ZERO));

        scheduler
            .schedule(JobConfig {
                name: "sync-a".into(),
                interval: Duration::from_millis(20),
                run_immediately: false,
                provider: provider.clone(),
            })
            .await;

        assert!(scheduler.active_jobs().await.contains(&"sync-a".to_string()));
        scheduler.stop("sync-a").await;
        assert!(scheduler.active_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn trigger_invokes_the_job_body_outside_the_timer() {
        let metrics = Metrics::new();
        let scheduler = Scheduler::new(metrics.clone());
        let provider = Arc::new(CountingSyncProvider::new(Duration::ZERO));

        scheduler
            .schedule(JobConfig {
                name: "sync-a".into(),
                interval: Duration::from_secs(3600),
                run_immediately: false,
                provider: provider.clone(),
            })
            .await;

        assert_eq!(provider.run_count(), 0);
        scheduler.trigger("sync-a").await.unwrap();
        assert_eq!(provider.run_count(), 1);
        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn trigger_on_unknown_job_returns_an_error() {
        let scheduler = Scheduler::new(Metrics::new());
        let err = scheduler.trigger("does-not-exist").await.unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownJob(_)));
    }
}
