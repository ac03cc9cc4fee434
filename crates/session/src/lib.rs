//! `tripgate-session` — session/profile reconciliation.
//!
//! On every observed account snapshot (initial fetch after sign-in plus the
//! continuous change feed), the reconciler re-derives session validity:
//! deactivated accounts and portal mismatches force a teardown, exactly once
//! per session; everything else refreshes the effective profile.

pub mod feed;
pub mod manager;
pub mod reconcile;

pub use feed::{AccountSnapshot, InMemorySnapshotFeed, SnapshotFeed, Subscription};
pub use manager::{IdentityProvider, ProfileSource, SessionManager};
pub use reconcile::{EffectiveProfile, Reconciler, TerminationReason, Verdict};
