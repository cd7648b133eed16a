use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use cronward_core::types::is_root;
use cronward_sandbox::Sandbox;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SchedulerError};
use crate::store::JobStore;

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the scheduling loop and its `Stopped`/`Running` state.
///
/// Starting spawns a Tokio task that scans the store every tick and hands
/// each due job to the sandbox on a task of its own. Stopping ends the scan;
/// runs already dispatched carry on to completion.
pub struct SchedulerEngine {
    store: Arc<JobStore>,
    sandbox: Arc<Sandbox>,
    tick: Duration,
    state: Mutex<Option<Running>>,
}

impl SchedulerEngine {
    pub fn new(store: Arc<JobStore>, sandbox: Arc<Sandbox>, tick: Duration) -> Self {
        Self {
            store,
            sandbox,
            tick,
            state: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called from within a Tokio runtime.
    pub fn start(&self, user: &str) -> Result<String> {
        require_root(user)?;

        let mut state = self.lock();
        if state.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (tx, rx) = watch::channel(false);
        let ticker = Ticker {
            store: Arc::clone(&self.store),
            sandbox: Arc::clone(&self.sandbox),
            period: self.tick,
        };
        let task = tokio::spawn(ticker.run(rx));
        *state = Some(Running { shutdown: tx, task });

        info!(user, tick_ms = self.tick.as_millis() as u64, "scheduling started");
        Ok("Scheduler started.".to_string())
    }

    pub fn stop(&self, user: &str) -> Result<String> {
        require_root(user)?;

        let running = self.lock().take().ok_or(SchedulerError::NotRunning)?;
        let _ = running.shutdown.send(true);

        info!(user, "scheduling stopped");
        Ok("Cronward job scheduling has been stopped.".to_string())
    }

    /// Stop the loop if it is running and wait for it to exit. Used on
    /// daemon shutdown; jobs already dispatched are not waited for.
    pub async fn shutdown(&self) {
        let running = self.lock().take();
        if let Some(running) = running {
            let _ = running.shutdown.send(true);
            if let Err(e) = running.task.await {
                error!("scheduler loop ended abnormally: {e}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    pub fn check_sched(&self) -> (bool, String) {
        if self.is_running() {
            (true, "Scheduler is running.".to_string())
        } else {
            (false, "Scheduler is stopped.".to_string())
        }
    }
}

fn require_root(user: &str) -> Result<()> {
    if is_root(user) {
        Ok(())
    } else {
        warn!(user, "scheduler control refused, not root");
        Err(SchedulerError::Unauthorized(
            "Only root can stop/start scheduling.".to_string(),
        ))
    }
}

/// The scan loop itself; lives inside the task spawned by `start`.
struct Ticker {
    store: Arc<JobStore>,
    sandbox: Arc<Sandbox>,
    period: Duration,
}

impl Ticker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler loop started");

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(Local::now()),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Claim every due job and dispatch each on its own task. The claim's
    /// slot guard travels with the task and frees the job when it ends.
    fn tick(&self, now: DateTime<Local>) {
        for (job, slot) in self.store.claim_due(now) {
            let sandbox = Arc::clone(&self.sandbox);
            debug!(job = %job.name, owner = %job.owner, "dispatching job");
            tokio::spawn(async move {
                let _slot = slot;
                if let Err(e) = sandbox
                    .execute(&job.name, &job.plugin_name, &job.owner, &job.kwargs)
                    .await
                {
                    error!(job = %job.name, code = e.code(), "scheduled run failed: {e}");
                }
            });
        }
    }
}
