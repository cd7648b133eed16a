//! Owner → uid/gid resolution.

use nix::unistd::{geteuid, Group, User};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

use crate::error::{Result, SandboxError};

/// The system identity a job runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub uid: u32,
    /// Primary group.
    pub gid: u32,
    pub group: String,
    pub home: PathBuf,
}

/// Looks up accounts by name. Job control uses it to validate owners at add
/// time; the sandbox uses it again right before every run.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, user: &str) -> Result<Identity>;
}

/// Resolver backed by the host's passwd and group databases.
pub struct SystemIdentities;

impl IdentityResolver for SystemIdentities {
    fn resolve(&self, user: &str) -> Result<Identity> {
        let unknown = || SandboxError::UnknownOwner {
            owner: user.to_string(),
        };

        let account = match User::from_name(user) {
            Ok(Some(account)) => account,
            Ok(None) => return Err(unknown()),
            Err(e) => {
                warn!(user, error = %e, "passwd lookup failed");
                return Err(unknown());
            }
        };

        Ok(identity_from(account))
    }
}

/// The identity this process is currently running as.
pub fn current_identity() -> Result<Identity> {
    match User::from_uid(geteuid()) {
        Ok(Some(account)) => Ok(identity_from(account)),
        _ => Err(SandboxError::UnknownOwner {
            owner: geteuid().to_string(),
        }),
    }
}

fn identity_from(account: User) -> Identity {
    // A primary gid without a group entry is legal; fall back to the number.
    let group = match Group::from_gid(account.gid) {
        Ok(Some(group)) => group.name,
        _ => account.gid.to_string(),
    };

    Identity {
        user: account.name,
        uid: account.uid.as_raw(),
        gid: account.gid.as_raw(),
        group,
        home: account.dir,
    }
}

/// Fixed in-memory account table, for test mode and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentities {
    accounts: HashMap<String, Identity>,
}

impl StaticIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user` with the given ids; group name and home are derived.
    pub fn with_user(mut self, user: &str, uid: u32, gid: u32) -> Self {
        self.accounts.insert(
            user.to_string(),
            Identity {
                user: user.to_string(),
                uid,
                gid,
                group: user.to_string(),
                home: PathBuf::from(format!("/home/{user}")),
            },
        );
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.accounts.insert(identity.user.clone(), identity);
        self
    }
}

impl IdentityResolver for StaticIdentities {
    fn resolve(&self, user: &str) -> Result<Identity> {
        self.accounts
            .get(user)
            .cloned()
            .ok_or_else(|| SandboxError::UnknownOwner {
                owner: user.to_string(),
            })
    }
}
