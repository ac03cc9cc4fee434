//! Capability identifiers and the static role registry.
//!
//! Capabilities are modeled as opaque strings (e.g. "bookings.manage"). The
//! special wildcard capability `"*"` means "allow all" without hardcoding the
//! full catalog into tokens or stored documents.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Capability identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wildcard capability granted only to the super-admin role.
pub const WILDCARD: &str = "*";

/// The concrete capability catalog of the portal.
pub const MANAGE_ACCOUNTS: &str = "accounts.manage";
pub const REVIEW_PARTNERS: &str = "partners.review";
pub const VIEW_BOOKINGS: &str = "bookings.view";
pub const MANAGE_BOOKINGS: &str = "bookings.manage";
pub const EDIT_CONTENT: &str = "content.edit";
pub const VIEW_REPORTS: &str = "reports.view";
pub const EDIT_PROFILE: &str = "profile.edit";

/// Display metadata for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleInfo {
    pub label: &'static str,
    pub rank: u8,
}

/// Display metadata lookup; pure function of static data, no error paths.
pub fn display_info(role: Role) -> RoleInfo {
    let label = match role {
        Role::SuperAdmin => "Super Administrator",
        Role::DelegatedSuperAdmin => "Delegated Super Administrator",
        Role::Admin => "Administrator",
        Role::AdminCustom => "Custom Administrator",
        Role::Employee => "Employee",
        Role::Customer => "Customer",
    };
    RoleInfo {
        label,
        rank: role.rank(),
    }
}

/// Capability set conferred by a role.
///
/// `custom` is consulted only for [`Role::AdminCustom`], whose capabilities
/// are exactly the set chosen at assignment time; it is ignored for every
/// other role. Super-admin implicitly holds every capability via the
/// wildcard.
pub fn capabilities_of(role: Role, custom: &BTreeSet<Capability>) -> BTreeSet<Capability> {
    let names: &[&'static str] = match role {
        Role::SuperAdmin => &[WILDCARD],
        Role::DelegatedSuperAdmin => &[
            MANAGE_ACCOUNTS,
            REVIEW_PARTNERS,
            VIEW_BOOKINGS,
            MANAGE_BOOKINGS,
            EDIT_CONTENT,
            VIEW_REPORTS,
            EDIT_PROFILE,
        ],
        Role::Admin => &[
            REVIEW_PARTNERS,
            VIEW_BOOKINGS,
            MANAGE_BOOKINGS,
            EDIT_CONTENT,
            VIEW_REPORTS,
            EDIT_PROFILE,
        ],
        Role::AdminCustom => return custom.clone(),
        Role::Employee => &[VIEW_BOOKINGS, VIEW_REPORTS, EDIT_PROFILE],
        Role::Customer => &[EDIT_PROFILE],
    };
    names.iter().map(|n| Capability::new(*n)).collect()
}

/// Whether a capability set grants the given capability.
pub fn grants(capabilities: &BTreeSet<Capability>, required: &str) -> bool {
    capabilities
        .iter()
        .any(|c| c.is_wildcard() || c.as_str() == required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_holds_everything_via_wildcard() {
        let caps = capabilities_of(Role::SuperAdmin, &BTreeSet::new());
        assert!(grants(&caps, MANAGE_ACCOUNTS));
        assert!(grants(&caps, "some.future.capability"));
    }

    #[test]
    fn custom_admin_gets_exactly_the_chosen_set() {
        let chosen: BTreeSet<_> = [Capability::new(REVIEW_PARTNERS)].into_iter().collect();
        let caps = capabilities_of(Role::AdminCustom, &chosen);
        assert_eq!(caps, chosen);
        assert!(grants(&caps, REVIEW_PARTNERS));
        assert!(!grants(&caps, MANAGE_BOOKINGS));
    }

    #[test]
    fn custom_set_ignored_for_fixed_roles() {
        let chosen: BTreeSet<_> = [Capability::new(MANAGE_ACCOUNTS)].into_iter().collect();
        let caps = capabilities_of(Role::Customer, &chosen);
        assert!(!grants(&caps, MANAGE_ACCOUNTS));
        assert!(grants(&caps, EDIT_PROFILE));
    }

    #[test]
    fn display_info_rank_tracks_role_rank() {
        assert_eq!(display_info(Role::Admin).rank, Role::Admin.rank());
        assert_eq!(display_info(Role::SuperAdmin).label, "Super Administrator");
    }
}
