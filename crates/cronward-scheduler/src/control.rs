//! Job control: validated, authorized lifecycle transitions.
//!
//! Every mutating operation is allowed for the job's owner and for root.
//! The bootstrap identity used by the startup import may also add jobs on an
//! owner's behalf and disable them when their definition says so.

use chrono::Local;
use cronward_core::types::{is_root, BOOTSTRAP_USER, OWNER_KWARG};
use cronward_core::Value;
use cronward_sandbox::Sandbox;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::definition::JobDefinition;
use crate::error::{Result, SchedulerError};
use crate::store::JobStore;
use crate::types::{Job, JobStatus};

const LISTING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct JobControl {
    store: Arc<JobStore>,
    sandbox: Arc<Sandbox>,
    job_dir: PathBuf,
}

impl JobControl {
    pub fn new(store: Arc<JobStore>, sandbox: Arc<Sandbox>, job_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            sandbox,
            job_dir: job_dir.into(),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    /// Add a job from a parsed definition.
    ///
    /// The job goes in as `Pending` and is then enabled, or disabled through
    /// the bootstrap identity when the definition has `enabled = false`.
    pub fn add_job(&self, def: JobDefinition, user: &str, real_user: &str) -> Result<String> {
        if self.store.contains(&def.name) {
            return Err(SchedulerError::DuplicateJob { name: def.name });
        }

        self.sandbox.identities().resolve(&def.owner)?;

        if user != def.owner && !is_root(user) && user != BOOTSTRAP_USER {
            warn!(job = %def.name, owner = %def.owner, user, "add rejected, owner mismatch");
            return Err(SchedulerError::Unauthorized(format!(
                "Job is set to run as user: '{}', You cannot add jobs that run as a different user.",
                def.owner
            )));
        }

        let next = def.schedule.next_after(&Local::now()).ok_or_else(|| {
            SchedulerError::InvalidSchedule(format!("'{}' never fires", def.schedule))
        })?;

        let mut kwargs = def.kwargs;
        kwargs.insert(OWNER_KWARG.to_string(), Value::from(def.owner.as_str()));

        let name = def.name.clone();
        self.store.insert(Job {
            id: Uuid::new_v4().to_string(),
            name: def.name,
            owner: def.owner,
            job_type: def.job_type,
            schedule: def.schedule,
            kwargs,
            plugin_name: def.plugin_name,
            status: JobStatus::Pending,
            next_run_time: Some(next),
            definition_path: def.path,
        })?;

        if def.enabled {
            self.store
                .update(&name, |job| {
                    job.status = JobStatus::Enabled;
                    Ok(())
                })
                .map_err(|e| vanished(&name, e))?;
        } else {
            self.disable_job(&name, BOOTSTRAP_USER, BOOTSTRAP_USER)
                .map_err(|e| vanished(&name, e))?;
        }

        info!(job = %name, user, real_user, "job added");
        Ok(format!("Successfully added job: '{name}'"))
    }

    /// Add the definition at `path`, which must sit directly in the job
    /// directory.
    pub fn add_job_file(&self, path: &Path, user: &str, real_user: &str) -> Result<String> {
        if !path.is_file() {
            return Err(SchedulerError::InvalidDefinition(
                "Jobfile does not exist.".to_string(),
            ));
        }
        if !self.in_job_dir(path) {
            return Err(SchedulerError::InvalidDefinition(format!(
                "Job file must be placed under: {}",
                self.job_dir.display()
            )));
        }

        let def = JobDefinition::from_file(path).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "adding job failed");
        })?;
        self.add_job(def, user, real_user)
    }

    fn in_job_dir(&self, path: &Path) -> bool {
        let (Ok(file), Ok(dir)) = (path.canonicalize(), self.job_dir.canonicalize()) else {
            return false;
        };
        file.parent() == Some(dir.as_path())
    }

    /// Load every `*.conf` in the job directory as the bootstrap identity,
    /// in file name order. Definitions with `autostart = false` are skipped.
    /// Failures are logged and do not stop the import. Returns how many
    /// jobs were added.
    pub fn import_jobs(&self) -> usize {
        let entries = match std::fs::read_dir(&self.job_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.job_dir.display(), error = %e, "cannot read job directory, nothing imported");
                return 0;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "conf"))
            .collect();
        files.sort();

        let mut added = 0;
        for path in files {
            let def = match JobDefinition::from_file(&path) {
                Ok(def) => def,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "skipping job file");
                    continue;
                }
            };
            if !def.autostart {
                info!(job = %def.name, "autostart=false, not importing");
                continue;
            }
            let name = def.name.clone();
            match self.add_job(def, BOOTSTRAP_USER, BOOTSTRAP_USER) {
                Ok(_) => added += 1,
                Err(e) => error!(job = %name, error = %e, "import failed"),
            }
        }

        info!(count = added, dir = %self.job_dir.display(), "startup import finished");
        added
    }

    pub fn disable_job(&self, name: &str, user: &str, real_user: &str) -> Result<String> {
        self.store.update(name, |job| {
            if job.owner != user && !is_root(user) && user != BOOTSTRAP_USER {
                warn!(job = %job.name, owner = %job.owner, user, real_user, "disable rejected");
                return Err(SchedulerError::Unauthorized(format!(
                    "Cannot disable job: '{}', owned by: '{}'",
                    job.name, job.owner
                )));
            }
            if job.status == JobStatus::Disabled {
                return Err(SchedulerError::AlreadyInState(format!(
                    "Job: '{}' is already disabled.",
                    job.name
                )));
            }
            job.status = JobStatus::Disabled;
            job.next_run_time = None;
            Ok(())
        })?;

        info!(job = name, user, real_user, "job disabled");
        Ok(format!("Job: '{name}' has been disabled."))
    }

    /// Re-enable a job. The next run time is computed afresh from now.
    pub fn enable_job(&self, name: &str, user: &str, real_user: &str) -> Result<String> {
        let next = self.store.update(name, |job| {
            if job.owner != user && !is_root(user) {
                warn!(job = %job.name, owner = %job.owner, user, real_user, "enable rejected");
                return Err(SchedulerError::Unauthorized(format!(
                    "Cannot re-enable job: '{}', owned by: '{}'",
                    job.name, job.owner
                )));
            }
            if job.status == JobStatus::Enabled {
                return Err(SchedulerError::AlreadyInState(format!(
                    "Job: '{}' is already enabled.",
                    job.name
                )));
            }
            let next = job.schedule.next_after(&Local::now()).ok_or_else(|| {
                SchedulerError::InvalidSchedule(format!("'{}' never fires", job.schedule))
            })?;
            job.status = JobStatus::Enabled;
            job.next_run_time = Some(next);
            Ok(next)
        })?;

        info!(job = name, user, real_user, next_run = %next, "job re-enabled");
        Ok(format!("Job: '{name}' has been re-enabled"))
    }

    pub fn remove_job(&self, name: &str, user: &str, real_user: &str) -> Result<String> {
        self.store.remove_if(name, |job| {
            if job.owner != user && !is_root(user) {
                warn!(job = %job.name, owner = %job.owner, user, real_user, "remove rejected");
                return Err(SchedulerError::Unauthorized(
                    "Cannot remove a job you do not own.".to_string(),
                ));
            }
            Ok(())
        })?;

        info!(job = name, user, real_user, "job removed");
        Ok(format!("Successfully removed job: '{name}'"))
    }

    /// Run a job now, outside its schedule, and wait for it to finish.
    ///
    /// Holds the job's execution slot for the duration, so it never overlaps
    /// a scheduled run. The next scheduled run time is left alone.
    pub async fn force_run_job(&self, name: &str, user: &str, real_user: &str) -> Result<String> {
        let (job, _slot) = self.store.claim(name, |job| {
            if job.owner != user && !is_root(user) {
                warn!(job = %job.name, owner = %job.owner, user, real_user, "force run rejected");
                return Err(SchedulerError::Unauthorized(format!(
                    "User: '{user}', cannot force run job: '{}', owned by '{}'",
                    job.name, job.owner
                )));
            }
            Ok(())
        })?;

        info!(job = name, user, real_user, "force running job");
        self.sandbox
            .execute(&job.name, &job.plugin_name, &job.owner, &job.kwargs)
            .await?;
        Ok(format!("Successfully force ran job: '{name}'"))
    }

    /// Listing: header, divider, then one row per job in name order.
    pub fn show_jobs(&self) -> Vec<String> {
        let mut lines = vec![
            listing_row("Jobname", "Jobowner", "JobType", "Status", "Next Run Time"),
            "=".repeat(110),
        ];
        for job in self.store.list() {
            let (status, next) = match (job.status, job.next_run_time) {
                (JobStatus::Disabled, _) | (_, None) => ("Disabled".to_string(), "Never".to_string()),
                (status, Some(t)) => (status.to_string(), t.format(LISTING_TIME_FORMAT).to_string()),
            };
            lines.push(listing_row(&job.name, &job.owner, &job.job_type, &status, &next));
        }
        lines
    }
}

fn listing_row(name: &str, owner: &str, job_type: &str, status: &str, next: &str) -> String {
    format!("{name:<25} {owner:<15} {job_type:<15} {status:<10} {next}")
}

/// A job we just inserted is gone again.
fn vanished(name: &str, e: SchedulerError) -> SchedulerError {
    match e {
        SchedulerError::NotFound { .. } => SchedulerError::InternalConsistency(format!(
            "job '{name}' vanished while being added"
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use chrono::{DateTime, NaiveDateTime};

    fn definition(name: &str, owner: &str, plugin: &str, enabled: bool) -> JobDefinition {
        let text = format!(
            "[{name}]\ntype = maintenance\nschedule = 0 2 * * *\nowner = {owner}\n\
             plugin_name = {plugin}\nkwargs = {{'path': '/data', 'owner': 'mallory'}}\n\
             enabled = {enabled}\nautostart = true\n"
        );
        JobDefinition::parse(&text, Path::new(&format!("/jobs/{name}.conf"))).unwrap()
    }

    fn control(h: &Harness) -> JobControl {
        JobControl::new(h.store.clone(), h.sandbox.clone(), "/nonexistent/jobs.d")
    }

    fn row_for<'a>(lines: &'a [String], name: &str) -> &'a str {
        lines
            .iter()
            .find(|l| l.starts_with(&format!("{name} ")))
            .map(String::as_str)
            .expect("job listed")
    }

    /// The trailing `date time` pair of a listing row.
    fn listed_time(row: &str) -> String {
        let mut parts: Vec<&str> = row.split_whitespace().collect();
        parts.split_off(parts.len() - 2).join(" ")
    }

    #[test]
    fn backup_walkthrough() {
        let h = Harness::new();
        let ctl = control(&h);

        let msg = ctl
            .add_job(definition("backup", "alice", "noop", true), "alice", "alice")
            .unwrap();
        assert_eq!(msg, "Successfully added job: 'backup'");
        let lines = ctl.show_jobs();
        assert!(row_for(&lines, "backup").contains("Enabled"));

        let err = ctl.disable_job("backup", "bob", "bob").unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert_eq!(err.to_string(), "Cannot disable job: 'backup', owned by: 'alice'");

        let msg = ctl.disable_job("backup", "alice", "alice").unwrap();
        assert_eq!(msg, "Job: 'backup' has been disabled.");
        let lines = ctl.show_jobs();
        let row = row_for(&lines, "backup");
        assert!(row.contains("Disabled"));
        assert!(row.ends_with("Never"));

        let msg = ctl.enable_job("backup", "alice", "alice").unwrap();
        assert_eq!(msg, "Job: 'backup' has been re-enabled");
        let job = h.store.get("backup").unwrap();
        assert_eq!(job.status, JobStatus::Enabled);
        let next = job.next_run_time.expect("real run time again");
        assert!(next > Local::now());

        let lines = ctl.show_jobs();
        let shown = listed_time(row_for(&lines, "backup"));
        let parsed = NaiveDateTime::parse_from_str(&shown, LISTING_TIME_FORMAT).unwrap();
        assert_eq!(parsed, next.naive_local());
    }

    #[test]
    fn listing_layout() {
        let h = Harness::new();
        let ctl = control(&h);
        let lines = ctl.show_jobs();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!(
                "{:<25} {:<15} {:<15} {:<10} {}",
                "Jobname", "Jobowner", "JobType", "Status", "Next Run Time"
            )
        );
        assert_eq!(lines[1], "=".repeat(110));
        assert!(lines[0].starts_with("Jobname                   Jobowner"));
    }

    #[test]
    fn duplicate_add_leaves_store_unchanged() {
        let h = Harness::new();
        let ctl = control(&h);
        ctl.add_job(definition("backup", "alice", "noop", true), "alice", "alice")
            .unwrap();
        let before = h.store.get("backup").unwrap();

        let err = ctl
            .add_job(definition("backup", "bob", "fails", false), "bob", "bob")
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_JOB");
        assert_eq!(err.to_string(), "Job: backup already exists.");

        let after = h.store.get("backup").unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.owner, "alice");
        assert_eq!(h.store.len(), 1);
    }

    #[test]
    fn owner_must_exist() {
        let h = Harness::new();
        let err = control(&h)
            .add_job(definition("backup", "ghost", "noop", true), "root", "root")
            .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_OWNER");
        assert!(h.store.is_empty());
    }

    #[test]
    fn only_owner_root_or_bootstrap_may_add() {
        let h = Harness::new();
        let ctl = control(&h);

        let err = ctl
            .add_job(definition("backup", "alice", "noop", true), "bob", "bob")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Job is set to run as user: 'alice', You cannot add jobs that run as a different user."
        );

        ctl.add_job(definition("a", "alice", "noop", true), "root", "root")
            .unwrap();
        ctl.add_job(definition("b", "alice", "noop", true), BOOTSTRAP_USER, BOOTSTRAP_USER)
            .unwrap();
        assert_eq!(h.store.len(), 2);
    }

    #[test]
    fn owner_kwarg_is_overwritten() {
        let h = Harness::new();
        control(&h)
            .add_job(definition("backup", "alice", "noop", true), "alice", "alice")
            .unwrap();
        let job = h.store.get("backup").unwrap();
        assert_eq!(job.kwargs[OWNER_KWARG], Value::from("alice"));
        assert_eq!(job.kwargs["path"], Value::from("/data"));
    }

    #[test]
    fn disabled_by_default_definition() {
        let h = Harness::new();
        control(&h)
            .add_job(definition("backup", "alice", "noop", false), "alice", "alice")
            .unwrap();
        let job = h.store.get("backup").unwrap();
        assert_eq!(job.status, JobStatus::Disabled);
        assert_eq!(job.next_run_time, None);
    }

    #[test]
    fn never_firing_schedule_rejected() {
        let h = Harness::new();
        let mut def = definition("feb31", "alice", "noop", true);
        def.schedule = "0 0 31 2 *".parse().unwrap();
        let err = control(&h).add_job(def, "alice", "alice").unwrap_err();
        assert_eq!(err.code(), "INVALID_SCHEDULE");
        assert!(h.store.is_empty());
    }

    #[test]
    fn no_op_transitions_rejected() {
        let h = Harness::new();
        let ctl = control(&h);
        ctl.add_job(definition("backup", "alice", "noop", true), "alice", "alice")
            .unwrap();

        let err = ctl.enable_job("backup", "alice", "alice").unwrap_err();
        assert_eq!(err.code(), "ALREADY_IN_STATE");
        assert_eq!(err.to_string(), "Job: 'backup' is already enabled.");

        ctl.disable_job("backup", "alice", "alice").unwrap();
        let err = ctl.disable_job("backup", "alice", "alice").unwrap_err();
        assert_eq!(err.code(), "ALREADY_IN_STATE");
        assert_eq!(err.to_string(), "Job: 'backup' is already disabled.");
    }

    #[test]
    fn strangers_rejected_root_allowed() {
        let h = Harness::new();
        let ctl = control(&h);
        ctl.add_job(definition("backup", "alice", "noop", true), "alice", "alice")
            .unwrap();

        let err = ctl.disable_job("backup", "bob", "bob").unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        ctl.disable_job("backup", "root", "admin").unwrap();

        let err = ctl.enable_job("backup", "bob", "bob").unwrap_err();
        assert_eq!(err.to_string(), "Cannot re-enable job: 'backup', owned by: 'alice'");
        // The bootstrap identity may only disable.
        assert!(ctl.enable_job("backup", BOOTSTRAP_USER, BOOTSTRAP_USER).is_err());
        ctl.enable_job("backup", "root", "admin").unwrap();

        let err = ctl.remove_job("backup", "bob", "bob").unwrap_err();
        assert_eq!(err.to_string(), "Cannot remove a job you do not own.");
        assert!(h.store.contains("backup"));
        let msg = ctl.remove_job("backup", "root", "admin").unwrap();
        assert_eq!(msg, "Successfully removed job: 'backup'");
        assert!(!h.store.contains("backup"));
    }

    #[test]
    fn unknown_job_messages() {
        let h = Harness::new();
        let ctl = control(&h);
        for err in [
            ctl.enable_job("nope", "root", "root").unwrap_err(),
            ctl.disable_job("nope", "root", "root").unwrap_err(),
            ctl.remove_job("nope", "root", "root").unwrap_err(),
        ] {
            assert_eq!(err.code(), "NOT_FOUND");
            assert_eq!(err.to_string(), "Job does not exist.");
        }
    }

    #[tokio::test]
    async fn force_run_executes_without_touching_schedule() {
        let h = Harness::new();
        let ctl = control(&h);
        ctl.add_job(definition("backup", "alice", "noop", true), "alice", "alice")
            .unwrap();
        let before: Option<DateTime<Local>> = h.store.get("backup").unwrap().next_run_time;

        let msg = ctl.force_run_job("backup", "alice", "alice").await.unwrap();
        assert_eq!(msg, "Successfully force ran job: 'backup'");

        let runs = h.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].job, "backup");
        assert_eq!(runs[0].uid, 1001);
        assert_eq!(runs[0].kwargs[OWNER_KWARG], Value::from("alice"));
        assert_eq!(h.store.get("backup").unwrap().next_run_time, before);
        assert!(!h.store.is_in_flight("backup"));

        // Disabled jobs can still be force-run.
        ctl.disable_job("backup", "alice", "alice").unwrap();
        ctl.force_run_job("backup", "root", "root").await.unwrap();
        assert_eq!(h.runs().len(), 2);
    }

    #[tokio::test]
    async fn force_run_rejections() {
        let h = Harness::new();
        let ctl = control(&h);
        ctl.add_job(definition("backup", "alice", "noop", true), "alice", "alice")
            .unwrap();

        let err = ctl.force_run_job("backup", "bob", "bob").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "User: 'bob', cannot force run job: 'backup', owned by 'alice'"
        );
        assert!(h.runs().is_empty());

        let (_job, _slot) = h.store.claim("backup", |_| Ok(())).unwrap();
        let err = ctl.force_run_job("backup", "alice", "alice").await.unwrap_err();
        assert_eq!(err.code(), "JOB_BUSY");
        assert!(h.runs().is_empty());
    }

    #[tokio::test]
    async fn force_run_reports_plugin_failures() {
        let h = Harness::new();
        let ctl = control(&h);
        ctl.add_job(definition("broken", "alice", "fails", true), "alice", "alice")
            .unwrap();
        ctl.add_job(definition("orphan", "alice", "missing", true), "alice", "alice")
            .unwrap();

        let err = ctl.force_run_job("broken", "alice", "alice").await.unwrap_err();
        assert_eq!(err.code(), "PLUGIN_EXECUTION");
        assert!(!h.store.is_in_flight("broken"), "slot freed after failure");

        let err = ctl.force_run_job("orphan", "alice", "alice").await.unwrap_err();
        assert_eq!(err.code(), "PLUGIN_NOT_FOUND");
    }

    const FILE_BODY: &str = "type = t\nschedule = */10 * * * *\nowner = alice\nplugin_name = noop\n\
                             kwargs = {}\nenabled = ENABLED\nautostart = AUTOSTART\n";

    fn write_job(dir: &Path, name: &str, enabled: bool, autostart: bool) -> PathBuf {
        let path = dir.join(format!("{name}.conf"));
        let body = FILE_BODY
            .replace("ENABLED", &enabled.to_string())
            .replace("AUTOSTART", &autostart.to_string());
        std::fs::write(&path, format!("[{name}]\n{body}")).unwrap();
        path
    }

    #[test]
    fn add_job_file_checks_location() {
        let h = Harness::new();
        let jobs = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let ctl = JobControl::new(h.store.clone(), h.sandbox.clone(), jobs.path());

        let err = ctl
            .add_job_file(&jobs.path().join("ghost.conf"), "alice", "alice")
            .unwrap_err();
        assert_eq!(err.to_string(), "Jobfile does not exist.");

        let stray = write_job(elsewhere.path(), "stray", true, true);
        let err = ctl.add_job_file(&stray, "alice", "alice").unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Job file must be placed under: {}", jobs.path().display())
        );

        let good = write_job(jobs.path(), "sync", true, true);
        ctl.add_job_file(&good, "alice", "alice").unwrap();
        assert_eq!(h.store.get("sync").unwrap().definition_path, good);
    }

    #[test]
    fn startup_import() {
        let h = Harness::new();
        let jobs = tempfile::tempdir().unwrap();
        write_job(jobs.path(), "alpha", true, true);
        write_job(jobs.path(), "beta", false, true);
        write_job(jobs.path(), "gamma", true, false);
        std::fs::write(jobs.path().join("broken.conf"), "[wrong]\ntype = x\n").unwrap();
        std::fs::write(jobs.path().join("notes.txt"), "[notes]\n").unwrap();

        let ctl = JobControl::new(h.store.clone(), h.sandbox.clone(), jobs.path());
        assert_eq!(ctl.import_jobs(), 2);

        assert_eq!(h.store.get("alpha").unwrap().status, JobStatus::Enabled);
        assert_eq!(h.store.get("beta").unwrap().status, JobStatus::Disabled);
        assert!(!h.store.contains("gamma"), "autostart=false is skipped");
        assert!(!h.store.contains("wrong"));
        assert_eq!(h.store.len(), 2);
    }

    #[test]
    fn import_from_missing_directory_is_empty() {
        let h = Harness::new();
        assert_eq!(control(&h).import_jobs(), 0);
    }
}
