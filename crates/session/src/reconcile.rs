//! The reconciliation state machine.
//!
//! A single pure decision point consumes account snapshots and yields a
//! verdict. Both call sites (the synchronous post-sign-in check and the live
//! change feed) funnel through the same `observe`, so the teardown rules are
//! written exactly once.

use std::collections::BTreeSet;

use serde::Serialize;

use tripgate_auth::{
    capabilities_of, eligible_in_context, AccountStatus, Capability, Portal, PortalContext, Role,
};
use tripgate_core::AccountId;

use crate::feed::AccountSnapshot;

/// Why a session was forcibly terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum TerminationReason {
    /// The account was deactivated. Takes precedence over a portal mismatch
    /// when both hold.
    Deactivated,
    /// The account's role is incompatible with the portal the session is on.
    PortalMismatch { role: Role, portal: Portal },
}

impl core::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TerminationReason::Deactivated => {
                write!(f, "your account has been deactivated")
            }
            TerminationReason::PortalMismatch { role, portal } => write!(
                f,
                "a {role} account cannot use the {portal:?} portal; please sign in on the correct portal",
            ),
        }
    }
}

/// The profile a session operates with after a snapshot is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveProfile {
    pub account_id: AccountId,
    pub role: Role,
    pub display_name: String,
    pub capabilities: BTreeSet<Capability>,
}

/// Outcome of observing one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Tear down the external auth session and surface the reason. Emitted at
    /// most once per session.
    Terminate(TerminationReason),
    /// The snapshot is the new effective profile.
    Accept(EffectiveProfile),
    /// Nothing to do: stale snapshot, or the session is already terminated.
    Ignore,
}

/// Per-session reconciler.
///
/// Holds the two pieces of local state the teardown rules need: the revision
/// of the last write this client itself applied (so a stale snapshot from the
/// eventually-consistent feed can never re-apply an outdated deactivation),
/// and whether this session has already been terminated (so teardown side
/// effects run exactly once).
#[derive(Debug)]
pub struct Reconciler {
    context: PortalContext,
    last_local_write: Option<u64>,
    terminated: bool,
}

impl Reconciler {
    pub fn new(context: PortalContext) -> Self {
        Self {
            context,
            last_local_write: None,
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Record the post-commit revision of a write this client just performed.
    ///
    /// Snapshots strictly older than this revision are ignored when deciding
    /// whether to force a teardown.
    pub fn note_local_write(&mut self, revision: u64) {
        self.last_local_write = Some(match self.last_local_write {
            Some(current) => current.max(revision),
            None => revision,
        });
    }

    /// Evaluate one observed snapshot.
    ///
    /// Checks run in a fixed order: deactivation first, portal eligibility
    /// second; the checks are mutually exclusive, so deactivation wins when
    /// both would fire.
    pub fn observe(&mut self, snapshot: &AccountSnapshot) -> Verdict {
        if self.terminated {
            return Verdict::Ignore;
        }

        if let Some(last_write) = self.last_local_write {
            if snapshot.revision < last_write {
                tracing::debug!(
                    account = %snapshot.account.id,
                    revision = snapshot.revision,
                    last_write,
                    "ignoring stale snapshot"
                );
                return Verdict::Ignore;
            }
        }

        let account = &snapshot.account;

        if account.status == AccountStatus::Inactive {
            self.terminated = true;
            tracing::info!(account = %account.id, "session terminated: account deactivated");
            return Verdict::Terminate(TerminationReason::Deactivated);
        }

        if !eligible_in_context(account.role, self.context) {
            self.terminated = true;
            tracing::info!(
                account = %account.id,
                role = %account.role,
                portal = ?self.context.portal,
                "session terminated: portal mismatch"
            );
            return Verdict::Terminate(TerminationReason::PortalMismatch {
                role: account.role,
                portal: self.context.portal,
            });
        }

        Verdict::Accept(EffectiveProfile {
            account_id: account.id,
            role: account.role,
            display_name: account.display_name.clone(),
            capabilities: capabilities_of(account.role, &account.custom_permissions),
        })
    }
}
