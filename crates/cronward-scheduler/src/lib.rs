//! `cronward-scheduler`: jobs, their schedules, and the loop that runs them.
//!
//! # Overview
//!
//! Jobs live in an in-memory [`store::JobStore`] keyed by name. They get
//! there through [`control::JobControl`], which parses definition files,
//! authorizes every change, and drives each job's
//! `Pending → Enabled ⇄ Disabled` lifecycle. While running, the
//! [`engine::SchedulerEngine`] scans the store every tick and dispatches due
//! jobs to the sandbox, never more than one run per job at a time.
//!
//! # Authorization
//!
//! | Operation              | Allowed for                                |
//! |------------------------|--------------------------------------------|
//! | add                    | owner, `root`, `initial_import`            |
//! | disable                | owner, `root`, `initial_import`            |
//! | enable, remove, force  | owner, `root`                              |
//! | start/stop scheduling  | `root`                                     |

pub mod control;
pub mod cron;
pub mod definition;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use control::JobControl;
pub use cron::CronSchedule;
pub use definition::JobDefinition;
pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use store::JobStore;
pub use types::{Job, JobStatus};
