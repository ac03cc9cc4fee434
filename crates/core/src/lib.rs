//! `tripgate-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the portal-wide error taxonomy, and the
//! aggregate traits the account/partner state machines are built on.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{PortalError, PortalResult};
pub use id::{AccountId, PartnerId};
