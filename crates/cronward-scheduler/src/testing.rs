//! Test doubles shared by this crate's unit tests.

use async_trait::async_trait;
use cronward_core::Kwargs;
use cronward_sandbox::{
    Identity, Plugin, PluginLoader, Result as SandboxResult, Sandbox, SandboxError,
    StaticIdentities,
};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::store::JobStore;

/// One recorded plugin invocation.
#[derive(Debug, Clone)]
pub(crate) struct Run {
    pub job: String,
    pub uid: u32,
    pub kwargs: Kwargs,
}

/// Records runs. `fails` makes every run fail; a `gate` holds each run until
/// a permit is added.
struct FakePlugin {
    name: String,
    runs: Arc<Mutex<Vec<Run>>>,
    gate: Option<Arc<Semaphore>>,
    fails: bool,
}

#[async_trait]
impl Plugin for FakePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, identity: &Identity, job_name: &str, kwargs: &Kwargs) -> SandboxResult<()> {
        self.runs.lock().unwrap().push(Run {
            job: job_name.to_string(),
            uid: identity.uid,
            kwargs: kwargs.clone(),
        });
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fails {
            return Err(SandboxError::PluginExecution(format!(
                "job '{job_name}', plugin '{}': exit status 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// Knows `noop`, `fails` and `gated`; everything else is missing.
struct FakeLoader {
    runs: Arc<Mutex<Vec<Run>>>,
    gate: Arc<Semaphore>,
}

impl PluginLoader for FakeLoader {
    fn load(&self, name: &str) -> SandboxResult<Arc<dyn Plugin>> {
        let (gate, fails) = match name {
            "noop" => (None, false),
            "fails" => (None, true),
            "gated" => (Some(self.gate.clone()), false),
            _ => {
                return Err(SandboxError::PluginNotFound {
                    name: name.to_string(),
                    path: format!("/plugins/{name}"),
                })
            }
        };
        Ok(Arc::new(FakePlugin {
            name: name.to_string(),
            runs: self.runs.clone(),
            gate,
            fails,
        }))
    }
}

pub(crate) struct Harness {
    pub store: Arc<JobStore>,
    pub sandbox: Arc<Sandbox>,
    pub runs: Arc<Mutex<Vec<Run>>>,
    /// Releases runs of the `gated` plugin, one per permit.
    pub gate: Arc<Semaphore>,
}

impl Harness {
    /// Accounts: root (0), alice (1001), bob (1002).
    pub fn new() -> Self {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Semaphore::new(0));
        let identities = StaticIdentities::new()
            .with_user("root", 0, 0)
            .with_user("alice", 1001, 1001)
            .with_user("bob", 1002, 1002);
        let sandbox = Sandbox::new(
            Arc::new(FakeLoader {
                runs: runs.clone(),
                gate: gate.clone(),
            }),
            Arc::new(identities),
            false,
        );
        Self {
            store: Arc::new(JobStore::new()),
            sandbox: Arc::new(sandbox),
            runs,
            gate,
        }
    }

    pub fn runs(&self) -> Vec<Run> {
        self.runs.lock().unwrap().clone()
    }
}
