//! In-memory job registry.
//!
//! Every operation takes the store lock exactly once, so each one is atomic
//! with respect to the others. In particular the due-scan checks due-ness,
//! reschedules and marks in-flight in one step, which is what keeps a job to
//! a single running instance.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::error::{Result, SchedulerError};
use crate::types::{Job, JobStatus};

struct Entry {
    job: Job,
    in_flight: bool,
}

#[derive(Default)]
pub struct JobStore {
    jobs: Mutex<BTreeMap<String, Entry>>,
}

/// Marks one run of a job as in flight; dropping it frees the slot.
///
/// Release is keyed by the job's id, so if the job was removed (and perhaps
/// re-added under the same name) while running, the new job is unaffected.
#[must_use = "the execution slot is released as soon as this is dropped"]
pub struct InFlight {
    store: Arc<JobStore>,
    name: String,
    id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.store.release(&self.name, &self.id);
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Entry>> {
        // A panic while holding the lock leaves the map itself intact.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a job under its name. Fails if the name is taken.
    pub fn insert(&self, job: Job) -> Result<()> {
        let mut jobs = self.lock();
        if jobs.contains_key(&job.name) {
            return Err(SchedulerError::DuplicateJob { name: job.name });
        }
        jobs.insert(
            job.name.clone(),
            Entry {
                job,
                in_flight: false,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Job> {
        self.lock()
            .get(name)
            .map(|e| e.job.clone())
            .ok_or_else(|| not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Snapshot of every job, in name order.
    pub fn list(&self) -> Vec<Job> {
        self.lock().values().map(|e| e.job.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn remove(&self, name: &str) -> Result<Job> {
        self.lock()
            .remove(name)
            .map(|e| e.job)
            .ok_or_else(|| not_found(name))
    }

    /// Run `f` against the named job while holding the lock. Checks and the
    /// mutation they guard happen atomically; if `f` fails it should leave
    /// the job untouched.
    pub fn update<T>(&self, name: &str, f: impl FnOnce(&mut Job) -> Result<T>) -> Result<T> {
        let mut jobs = self.lock();
        let entry = jobs.get_mut(name).ok_or_else(|| not_found(name))?;
        f(&mut entry.job)
    }

    /// Remove the named job if `check` passes, atomically.
    pub fn remove_if(&self, name: &str, check: impl FnOnce(&Job) -> Result<()>) -> Result<Job> {
        let mut jobs = self.lock();
        let entry = jobs.get(name).ok_or_else(|| not_found(name))?;
        check(&entry.job)?;
        jobs.remove(name)
            .map(|e| e.job)
            .ok_or_else(|| SchedulerError::InternalConsistency(format!("job '{name}' vanished")))
    }

    #[cfg(test)]
    pub(crate) fn is_in_flight(&self, name: &str) -> bool {
        self.lock().get(name).is_some_and(|e| e.in_flight)
    }

    /// Due-scan: every enabled job whose run time has arrived is rescheduled
    /// to its next occurrence after `now`. Those not already running are
    /// marked in flight and returned; the rest are skipped for this
    /// occurrence.
    pub fn claim_due(self: &Arc<Self>, now: DateTime<Local>) -> Vec<(Job, InFlight)> {
        let mut jobs = self.lock();
        let mut claimed = Vec::new();

        for entry in jobs.values_mut() {
            if !entry.job.is_due(&now) {
                continue;
            }

            let next = entry.job.schedule.next_after(&now);
            entry.job.next_run_time = next;
            if next.is_none() {
                warn!(job = %entry.job.name, schedule = %entry.job.schedule, "schedule has no further occurrences, disabling");
                entry.job.status = JobStatus::Disabled;
            }

            if entry.in_flight {
                debug!(job = %entry.job.name, "previous run still in flight, skipping");
                continue;
            }

            entry.in_flight = true;
            claimed.push((entry.job.clone(), self.in_flight_for(&entry.job)));
        }
        claimed
    }

    /// Mark a single job in flight regardless of its schedule (force-run),
    /// provided `check` passes.
    pub fn claim(
        self: &Arc<Self>,
        name: &str,
        check: impl FnOnce(&Job) -> Result<()>,
    ) -> Result<(Job, InFlight)> {
        let mut jobs = self.lock();
        let entry = jobs.get_mut(name).ok_or_else(|| not_found(name))?;
        check(&entry.job)?;
        if entry.in_flight {
            return Err(SchedulerError::JobBusy {
                name: name.to_string(),
            });
        }
        entry.in_flight = true;
        Ok((entry.job.clone(), self.in_flight_for(&entry.job)))
    }

    /// Free the execution slot of job `name`, if it is still the job `id`.
    pub fn release(&self, name: &str, id: &str) {
        if let Some(entry) = self.lock().get_mut(name) {
            if entry.job.id == id {
                entry.in_flight = false;
            }
        }
    }

    fn in_flight_for(self: &Arc<Self>, job: &Job) -> InFlight {
        InFlight {
            store: Arc::clone(self),
            name: job.name.clone(),
            id: job.id.clone(),
        }
    }
}

fn not_found(name: &str) -> SchedulerError {
    SchedulerError::NotFound {
        name: name.to_string(),
    }
}
