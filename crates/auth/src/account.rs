//! Account document model and lifecycle state machine.
//!
//! The account aggregate is the single shared mutable resource of the portal
//! core. Its `handle` methods are the fail-closed guards: every transition
//! consults the policy engine before emitting any event, so an unauthorized
//! attempt is rejected before a persistence write is ever issued.

use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tripgate_core::{Aggregate, AggregateRoot, AccountId, PortalError, PortalResult};

use crate::capability::Capability;
use crate::policy::{can_assign_role, check_manage, Actor, ManagementAction, Target};
use crate::roles::Role;

// ─────────────────────────────────────────────────────────────────────────────
// Status / Department
// ─────────────────────────────────────────────────────────────────────────────

/// Account status; governs whether a session may be established at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Department classification for employee accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Department(Cow<'static, str>);

impl Department {
    /// The one department whose members are eligible for elevated roles.
    pub const PORTAL_MANAGEMENT: &'static str = "portal-management";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn portal_management() -> Self {
        Self::new(Self::PORTAL_MANAGEMENT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_portal_management(&self) -> bool {
        self.as_str() == Self::PORTAL_MANAGEMENT
    }
}

impl core::fmt::Display for Department {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

/// An account document.
///
/// # Invariants
/// - At most one account system-wide has `is_primary = true` (enforced by the
///   store at insert time).
/// - `is_primary = true` implies `role = SuperAdmin`, permanently; no
///   transition may change the primary's role.
/// - `role = AdminCustom` implies a non-empty `custom_permissions` set
///   (enforced at write time).
/// - Elevated roles require an employee in the portal-management department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_primary: bool,
    pub status: AccountStatus,
    pub is_employee: bool,
    pub department: Option<Department>,
    pub custom_permissions: BTreeSet<Capability>,
    /// Stored document revision; bumped by the store on every committed write.
    pub version: u64,
}

impl Account {
    /// A customer account, created on first successful external sign-in.
    pub fn customer(id: AccountId, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: display_name.into(),
            role: Role::Customer,
            is_primary: false,
            status: AccountStatus::Active,
            is_employee: false,
            department: None,
            custom_permissions: BTreeSet::new(),
            version: 0,
        }
    }

    /// A staff account, created through the management portal.
    pub fn employee(
        id: AccountId,
        email: impl Into<String>,
        display_name: impl Into<String>,
        department: Department,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: display_name.into(),
            role: Role::Employee,
            is_primary: false,
            status: AccountStatus::Active,
            is_employee: true,
            department: Some(department),
            custom_permissions: BTreeSet::new(),
            version: 0,
        }
    }

    /// The founding super-administrator, created once at system bootstrap.
    pub fn bootstrap_primary(
        id: AccountId,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: display_name.into(),
            role: Role::SuperAdmin,
            is_primary: true,
            status: AccountStatus::Active,
            is_employee: true,
            department: Some(Department::portal_management()),
            custom_permissions: BTreeSet::new(),
            version: 0,
        }
    }

    /// Write-time invariant check. Called before any insert or update.
    pub fn validate(&self) -> PortalResult<()> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(PortalError::validation("invalid email format"));
        }
        if self.display_name.trim().is_empty() {
            return Err(PortalError::validation("display name cannot be empty"));
        }
        if self.is_primary && self.role != Role::SuperAdmin {
            return Err(PortalError::validation(
                "the primary account must hold the super-admin role",
            ));
        }
        if self.role == Role::AdminCustom && self.custom_permissions.is_empty() {
            return Err(PortalError::validation(
                "a custom admin requires a non-empty permission set",
            ));
        }
        Ok(())
    }

    /// Policy-engine view of this account as a target.
    pub fn as_target(&self) -> Target {
        Target {
            id: self.id,
            role: self.role,
            is_primary: self.is_primary,
        }
    }

    /// Policy-engine view of this account as an actor.
    pub fn as_actor(&self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
            is_primary: self.is_primary,
        }
    }

    fn ensure_elevated_role_eligibility(&self, role: Role) -> PortalResult<()> {
        if !role.is_elevated() {
            return Ok(());
        }
        let in_portal_management = self.is_employee
            && self
                .department
                .as_ref()
                .is_some_and(Department::is_portal_management);
        if !in_portal_management {
            return Err(PortalError::validation(
                "elevated roles require a portal-management employee",
            ));
        }
        Ok(())
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Deactivate an account (`active → inactive`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deactivate {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Reactivate an account (`inactive → active`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reactivate {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Change an account's role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRole {
    pub actor: Actor,
    pub new_role: Role,
    /// Consulted only when `new_role` is [`Role::AdminCustom`].
    pub custom_permissions: BTreeSet<Capability>,
    pub occurred_at: DateTime<Utc>,
}

/// Edit mutable profile fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditProfile {
    pub actor: Actor,
    pub email: String,
    pub display_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Remove an elevated account.
///
/// Elevated accounts are never hard-deleted; removal demotes the account to
/// the unprivileged customer role, preserving history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remove {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// All account commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountCommand {
    Deactivate(Deactivate),
    Reactivate(Reactivate),
    ChangeRole(ChangeRole),
    EditProfile(EditProfile),
    Remove(Remove),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// All account events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountEvent {
    Deactivated {
        actor_id: AccountId,
        occurred_at: DateTime<Utc>,
    },
    Reactivated {
        actor_id: AccountId,
        occurred_at: DateTime<Utc>,
    },
    RoleChanged {
        actor_id: AccountId,
        new_role: Role,
        custom_permissions: BTreeSet<Capability>,
        occurred_at: DateTime<Utc>,
    },
    ProfileEdited {
        email: String,
        display_name: String,
        occurred_at: DateTime<Utc>,
    },
    Removed {
        actor_id: AccountId,
        occurred_at: DateTime<Utc>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = PortalError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::Deactivated { .. } => self.status = AccountStatus::Inactive,
            AccountEvent::Reactivated { .. } => self.status = AccountStatus::Active,
            AccountEvent::RoleChanged {
                new_role,
                custom_permissions,
                ..
            } => {
                self.role = *new_role;
                self.custom_permissions = custom_permissions.clone();
            }
            AccountEvent::ProfileEdited {
                email,
                display_name,
                ..
            } => {
                self.email = email.clone();
                self.display_name = display_name.clone();
            }
            AccountEvent::Removed { .. } => {
                self.role = Role::Customer;
                self.custom_permissions.clear();
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
            AccountCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
            AccountCommand::ChangeRole(cmd) => self.handle_change_role(cmd),
            AccountCommand::EditProfile(cmd) => self.handle_edit_profile(cmd),
            AccountCommand::Remove(cmd) => self.handle_remove(cmd),
        }
    }
}

impl Account {
    fn handle_deactivate(&self, cmd: &Deactivate) -> PortalResult<Vec<AccountEvent>> {
        check_manage(&cmd.actor, &self.as_target(), ManagementAction::Deactivate)?;

        if self.status == AccountStatus::Inactive {
            return Err(PortalError::validation("account is already inactive"));
        }

        Ok(vec![AccountEvent::Deactivated {
            actor_id: cmd.actor.id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reactivate(&self, cmd: &Reactivate) -> PortalResult<Vec<AccountEvent>> {
        check_manage(&cmd.actor, &self.as_target(), ManagementAction::Reactivate)?;

        if self.status == AccountStatus::Active {
            return Err(PortalError::validation("account is already active"));
        }

        Ok(vec![AccountEvent::Reactivated {
            actor_id: cmd.actor.id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_role(&self, cmd: &ChangeRole) -> PortalResult<Vec<AccountEvent>> {
        check_manage(&cmd.actor, &self.as_target(), ManagementAction::ChangeRole)?;

        if !can_assign_role(&cmd.actor, cmd.new_role) {
            return Err(PortalError::denied(format!(
                "role '{}' cannot be assigned by this actor",
                cmd.new_role
            )));
        }

        self.ensure_elevated_role_eligibility(cmd.new_role)?;

        if cmd.new_role == Role::AdminCustom && cmd.custom_permissions.is_empty() {
            return Err(PortalError::validation(
                "a custom admin requires a non-empty permission set",
            ));
        }

        let custom_permissions = if cmd.new_role == Role::AdminCustom {
            cmd.custom_permissions.clone()
        } else {
            BTreeSet::new()
        };

        Ok(vec![AccountEvent::RoleChanged {
            actor_id: cmd.actor.id,
            new_role: cmd.new_role,
            custom_permissions,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_edit_profile(&self, cmd: &EditProfile) -> PortalResult<Vec<AccountEvent>> {
        check_manage(&cmd.actor, &self.as_target(), ManagementAction::EditProfile)?;

        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(PortalError::validation("invalid email format"));
        }
        if cmd.display_name.trim().is_empty() {
            return Err(PortalError::validation("display name cannot be empty"));
        }

        Ok(vec![AccountEvent::ProfileEdited {
            email: cmd.email.trim().to_lowercase(),
            display_name: cmd.display_name.trim().to_string(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove(&self, cmd: &Remove) -> PortalResult<Vec<AccountEvent>> {
        check_manage(&cmd.actor, &self.as_target(), ManagementAction::Remove)?;

        if self.role == Role::Customer {
            return Err(PortalError::validation("account holds no role to remove"));
        }

        Ok(vec![AccountEvent::Removed {
            actor_id: cmd.actor.id,
            occurred_at: cmd.occurred_at,
        }])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
