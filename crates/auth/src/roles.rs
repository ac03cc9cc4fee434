//! Closed role catalog.
//!
//! Roles are a closed, mutually exclusive set; every account holds exactly one
//! at any time. The catalog is ranked by privilege so guards can compose on
//! rank instead of matching on role names.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account role.
///
/// Ordered by privilege, highest first. `AdminCustom` is the one parametric
/// role: its capabilities are an explicit, non-empty set chosen at assignment
/// time rather than a fixed catalog entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SuperAdmin,
    DelegatedSuperAdmin,
    Admin,
    AdminCustom,
    Employee,
    Customer,
}

impl Role {
    /// Privilege rank, higher is more privileged.
    pub fn rank(self) -> u8 {
        match self {
            Role::SuperAdmin => 6,
            Role::DelegatedSuperAdmin => 5,
            Role::Admin => 4,
            Role::AdminCustom => 3,
            Role::Employee => 2,
            Role::Customer => 1,
        }
    }

    /// Stable wire tag (matches the stored role strings).
    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super-admin",
            Role::DelegatedSuperAdmin => "delegated-super-admin",
            Role::Admin => "admin",
            Role::AdminCustom => "admin-custom",
            Role::Employee => "employee",
            Role::Customer => "customer",
        }
    }

    /// Roles that may ever be granted through role assignment.
    ///
    /// `SuperAdmin` is deliberately absent: it is only ever held by the
    /// primary account created at system bootstrap.
    pub fn assignable() -> &'static [Role] {
        &[
            Role::DelegatedSuperAdmin,
            Role::Admin,
            Role::AdminCustom,
            Role::Employee,
            Role::Customer,
        ]
    }

    /// True for the staff-side roles that are barred from the customer portal.
    pub fn is_restricted(self) -> bool {
        !matches!(self, Role::Customer)
    }

    /// True for roles that carry management powers over other principals.
    pub fn is_admin_class(self) -> bool {
        matches!(
            self,
            Role::SuperAdmin | Role::DelegatedSuperAdmin | Role::Admin | Role::AdminCustom
        )
    }

    /// True for roles whose assignment requires portal-management staff.
    pub fn is_elevated(self) -> bool {
        matches!(
            self,
            Role::SuperAdmin | Role::DelegatedSuperAdmin | Role::Admin | Role::AdminCustom
        )
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super-admin" => Ok(Role::SuperAdmin),
            "delegated-super-admin" => Ok(Role::DelegatedSuperAdmin),
            "admin" => Ok(Role::Admin),
            "admin-custom" => Ok(Role::AdminCustom),
            "employee" => Ok(Role::Employee),
            "customer" => Ok(Role::Customer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
