//! Session orchestration over the identity provider and the change feed.
//!
//! `SessionManager` owns the per-session wiring: sign-in resolves a principal,
//! the account document is fetched once synchronously and reconciled, then a
//! live subscription keeps reconciling until sign-out or forced teardown.

use chrono::Utc;

use tripgate_auth::PortalContext;
use tripgate_core::{AccountId, PortalError, PortalResult};

use crate::feed::{AccountSnapshot, SnapshotFeed, Subscription};
use crate::reconcile::{EffectiveProfile, Reconciler, Verdict};

/// External identity provider boundary.
///
/// Credential verification happens behind this trait; the core only sees the
/// resolved principal or an authentication failure.
pub trait IdentityProvider {
    fn sign_in(&self, email: &str, password: &str) -> PortalResult<AccountId>;

    /// Terminate the external auth session. Must be safe to call for an
    /// already-terminated session.
    fn sign_out(&self, account_id: AccountId);
}

/// Read access to account documents (the initial post-sign-in fetch).
pub trait ProfileSource {
    fn fetch(&self, id: AccountId) -> PortalResult<Option<tripgate_auth::Account>>;
}

struct LiveSession {
    account_id: AccountId,
    subscription: Subscription<AccountSnapshot>,
    reconciler: Reconciler,
    profile: EffectiveProfile,
}

/// Per-client session manager.
pub struct SessionManager<'a, I, P, F> {
    identity: &'a I,
    profiles: &'a P,
    feed: &'a F,
    context: PortalContext,
    live: Option<LiveSession>,
}

impl<'a, I, P, F> SessionManager<'a, I, P, F>
where
    I: IdentityProvider,
    P: ProfileSource,
    F: SnapshotFeed,
{
    pub fn new(identity: &'a I, profiles: &'a P, feed: &'a F, context: PortalContext) -> Self {
        Self {
            identity,
            profiles,
            feed,
            context,
            live: None,
        }
    }

    /// Authenticate and establish a session on this manager's portal.
    ///
    /// The account document is fetched once and reconciled synchronously
    /// before the session is considered established; an ineligible account is
    /// signed out of the external provider immediately.
    pub fn sign_in(&mut self, email: &str, password: &str) -> PortalResult<EffectiveProfile> {
        let account_id = self.identity.sign_in(email, password)?;

        let account = self
            .profiles
            .fetch(account_id)?
            .ok_or_else(|| PortalError::authentication("no account record for principal"))?;

        // Subscribe before the initial check so no change slips between the
        // fetch and the live feed.
        let subscription = self.feed.subscribe(account_id);

        let mut reconciler = Reconciler::new(self.context);
        match reconciler.observe(&AccountSnapshot::of(account, Utc::now())) {
            Verdict::Accept(profile) => {
                self.live = Some(LiveSession {
                    account_id,
                    subscription,
                    reconciler,
                    profile: profile.clone(),
                });
                Ok(profile)
            }
            Verdict::Terminate(reason) => {
                self.identity.sign_out(account_id);
                Err(PortalError::ineligible(reason.to_string()))
            }
            Verdict::Ignore => {
                // A fresh reconciler cannot ignore its first snapshot.
                Err(PortalError::authentication("session could not be established"))
            }
        }
    }

    /// Drain queued snapshots from the change feed and act on them.
    ///
    /// Returns the significant outcome, if any: a forced teardown (the
    /// external session has already been signed out when this returns) or a
    /// refreshed profile.
    pub fn poll(&mut self) -> Option<Verdict> {
        let live = self.live.as_mut()?;

        let mut outcome = None;
        while let Ok(snapshot) = live.subscription.try_recv() {
            match live.reconciler.observe(&snapshot) {
                Verdict::Terminate(reason) => {
                    outcome = Some(Verdict::Terminate(reason));
                    break;
                }
                Verdict::Accept(profile) => {
                    live.profile = profile.clone();
                    outcome = Some(Verdict::Accept(profile));
                }
                Verdict::Ignore => {}
            }
        }

        if let Some(Verdict::Terminate(_)) = &outcome {
            // Teardown is effect-once: the session is dropped here, and with
            // it the feed subscription.
            if let Some(live) = self.live.take() {
                self.identity.sign_out(live.account_id);
            }
        }

        outcome
    }

    /// Record the post-commit revision of a write this client just performed.
    pub fn note_local_write(&mut self, revision: u64) {
        if let Some(live) = self.live.as_mut() {
            live.reconciler.note_local_write(revision);
        }
    }

    /// The current effective profile, if a session is established.
    pub fn profile(&self) -> Option<&EffectiveProfile> {
        self.live.as_ref().map(|l| &l.profile)
    }

    /// Sign out voluntarily. Safe to call repeatedly; the subscription is
    /// dropped with the session.
    pub fn sign_out(&mut self) {
        if let Some(live) = self.live.take() {
            self.identity.sign_out(live.account_id);
        }
    }
}
