//! `tripgate-auth` — role-based access control and account lifecycle core.
//!
//! This crate is intentionally decoupled from HTTP, storage and the identity
//! provider. It contains the closed role catalog, the pure authorization
//! policy engine, and the account/partner state machines with their
//! fail-closed transition guards.

pub mod account;
pub mod capability;
pub mod partner;
pub mod policy;
pub mod roles;

pub use account::{Account, AccountCommand, AccountEvent, AccountStatus, Department};
pub use capability::{capabilities_of, display_info, grants, Capability, RoleInfo};
pub use partner::{
    validate_token, Partner, PartnerCommand, PartnerEvent, PartnerReference, PartnerStatus,
    SetPasswordToken, TokenError,
};
pub use policy::{
    can_assign_role, can_manage, can_manage_fetched, check_manage, eligible_for_portal,
    eligible_in_context, Actor, Denial, ManagementAction, Portal, PortalContext, Target,
};
pub use roles::Role;
