//! Job scheduler infrastructure for background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Trait for implementing background jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// The name of this job (used for logging).
    fn name(&self) -> &'static str;

    /// Time between the starts of consecutive runs.
    fn period(&self) -> Duration;

    /// Whether the first run happens at start instead of one period later.
    fn run_on_start(&self) -> bool {
        false
    }

    /// Execute the job. Returns Ok(()) on success, Err with message on failure.
    async fn execute(&self) -> Result<(), String>;
}

/// Background job scheduler.
///
/// Each job runs on its own task. A run that overlaps the next tick delays
/// it; ticks missed meanwhile are skipped rather than replayed.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a job with the scheduler. The caller may keep its own handle.
    pub fn register(&mut self, job: Arc<dyn Job>) {
        self.jobs.push(job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Start all registered jobs.
    pub fn start(&mut self) {
        info!("Starting job scheduler with {} jobs", self.jobs.len());

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let name = job.name();
                let period = job.period();
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                // The first tick completes immediately
                if !job.run_on_start() {
                    interval.tick().await;
                }

                info!(job = name, period = ?period, "Job scheduled");

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let start = std::time::Instant::now();
                            debug!(job = name, "Job starting");

                            match job.execute().await {
                                Ok(()) => {
                                    debug!(
                                        job = name,
                                        elapsed_ms = start.elapsed().as_millis(),
                                        "Job completed successfully"
                                    );
                                }
                                Err(e) => {
                                    error!(
                                        job = name,
                                        elapsed_ms = start.elapsed().as_millis(),
                                        error = %e,
                                        "Job failed"
                                    );
                                }
                            }
                        }
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                info!(job = name, "Job shutting down");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Initiate graceful shutdown of all jobs.
    /// Returns immediately after signaling shutdown.
    pub fn shutdown(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all jobs to complete with timeout.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        info!("Waiting for jobs to complete (timeout: {:?})", timeout);

        let shutdown_future = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All jobs completed gracefully"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}
