//! `tripgate-directory` — account and partner management services.
//!
//! This crate stitches the policy engine and the lifecycle aggregates to
//! persistence and notification boundaries. Every privileged operation runs
//! the same pipeline: authorize, validate, transition, compare-and-swap
//! write, then a fire-and-forget notification whose failure never rolls the
//! primary transition back.

pub mod notify;
pub mod service;
pub mod store;

pub use notify::{FailingNotifier, Notification, Notifier, NotifyOutcome, RecordingNotifier};
pub use service::{DirectoryService, Outcome};
pub use store::{AccountStore, InMemoryAccountStore, InMemoryPartnerStore, PartnerStore};
