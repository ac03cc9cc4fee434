//! Authorization policy engine.
//!
//! Pure, IO-free predicates over an explicit actor/target context. Nothing
//! here reads ambient session state; callers pass in snapshots of both
//! principals so every decision is independently testable.
//!
//! All predicates are deny-by-default: missing or partial data short-circuits
//! to a denial, never to an allow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tripgate_core::{AccountId, PortalError, PortalResult};

use crate::roles::Role;

// ─────────────────────────────────────────────────────────────────────────────
// Actor / Target snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// The acting principal, as relevant to authorization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: AccountId,
    pub role: Role,
    pub is_primary: bool,
}

/// The principal being acted upon.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: AccountId,
    pub role: Role,
    pub is_primary: bool,
}

/// A management action an actor may attempt on a target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManagementAction {
    EditProfile,
    Deactivate,
    Reactivate,
    ChangeRole,
    /// Permanent removal of an elevated account, modeled as demotion.
    Remove,
}

// ─────────────────────────────────────────────────────────────────────────────
// Denial reasons
// ─────────────────────────────────────────────────────────────────────────────

/// Why a management action was denied.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Denial {
    /// The primary super-admin is fully protected from all other actors.
    #[error("the primary administrator account cannot be modified")]
    PrimaryProtected,

    /// Self-deactivation and self-role-change are always denied.
    #[error("this action cannot be performed on your own account")]
    SelfActionForbidden,

    /// Only the primary may touch a super-admin record.
    #[error("super-admin accounts can only be managed by the primary administrator")]
    SuperAdminTarget,

    /// Removing a delegated super-admin requires the primary.
    #[error("removing a delegated super-admin requires the primary administrator")]
    RemovalRequiresPrimary,

    /// The actor's role does not outrank the target.
    #[error("insufficient privileges for this account")]
    RankTooLow,

    /// The target record was missing or incomplete; fail closed.
    #[error("target account unavailable")]
    MissingTarget,
}

impl From<Denial> for PortalError {
    fn from(denial: Denial) -> Self {
        PortalError::denied(denial.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Management predicate
// ─────────────────────────────────────────────────────────────────────────────

/// Core management predicate: may `actor` perform `action` on `target`?
///
/// Rules are evaluated in order, first match wins:
/// 1. A primary target is protected from every other actor.
/// 2. Self: profile edits are allowed, everything else is denied regardless
///    of rank.
/// 3. The primary may perform any management action on any other principal.
/// 4. Super-admin targets are only ever touchable by the primary (this also
///    protects any hypothetical secondary super-admin).
/// 5. Super-admins and delegated super-admins manage principals ranked below
///    delegated super-admin. Removal of a delegated super-admin is reserved
///    for the primary alone.
/// 6. Everything else is denied.
pub fn can_manage(actor: &Actor, target: &Target, action: ManagementAction) -> Result<(), Denial> {
    // Rule 1: primary protection.
    if target.is_primary && !actor.is_primary {
        return Err(Denial::PrimaryProtected);
    }

    // Rule 2: self-action.
    if actor.id == target.id {
        return match action {
            ManagementAction::EditProfile => Ok(()),
            _ => Err(Denial::SelfActionForbidden),
        };
    }

    // Rule 3: the primary may do anything to anyone else.
    if actor.is_primary {
        return Ok(());
    }

    // Rule 4: non-primary actors never touch a super-admin record.
    if target.role == Role::SuperAdmin {
        return Err(Denial::SuperAdminTarget);
    }

    // Rule 5: super/delegated manage the ranks below delegated.
    if matches!(actor.role, Role::SuperAdmin | Role::DelegatedSuperAdmin) {
        if target.role == Role::DelegatedSuperAdmin {
            return match action {
                ManagementAction::Remove => Err(Denial::RemovalRequiresPrimary),
                _ => Err(Denial::RankTooLow),
            };
        }
        return Ok(());
    }

    // Rule 6: default deny.
    Err(Denial::RankTooLow)
}

/// [`can_manage`] over a target that may not have been found.
///
/// A missing target denies rather than allowing, per the fail-closed rule.
pub fn can_manage_fetched(
    actor: &Actor,
    target: Option<&Target>,
    action: ManagementAction,
) -> Result<(), Denial> {
    match target {
        Some(target) => can_manage(actor, target, action),
        None => Err(Denial::MissingTarget),
    }
}

/// [`can_manage`] lifted into the portal error taxonomy, with the denial
/// logged for audit.
pub fn check_manage(
    actor: &Actor,
    target: &Target,
    action: ManagementAction,
) -> PortalResult<()> {
    can_manage(actor, target, action).map_err(|denial| {
        tracing::debug!(
            actor = %actor.id,
            target = %target.id,
            ?action,
            %denial,
            "management action denied"
        );
        denial.into()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Role assignment
// ─────────────────────────────────────────────────────────────────────────────

/// May `actor` assign `role` to some target?
///
/// `SuperAdmin` is never assignable by anyone through this action; it is only
/// ever held by the primary account created at system bootstrap.
pub fn can_assign_role(actor: &Actor, role: Role) -> bool {
    if role == Role::SuperAdmin {
        return false;
    }

    if actor.is_primary || actor.role == Role::SuperAdmin {
        return matches!(
            role,
            Role::DelegatedSuperAdmin | Role::Admin | Role::AdminCustom
        );
    }

    if actor.role == Role::DelegatedSuperAdmin {
        // Cannot mint peer or superior delegated admins.
        return matches!(role, Role::Admin | Role::AdminCustom);
    }

    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Portal eligibility
// ─────────────────────────────────────────────────────────────────────────────

/// A distinct web surface gated by role eligibility.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Portal {
    Customer,
    Partner,
    Management,
}

/// The current navigation context a session is observed in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PortalContext {
    pub portal: Portal,
    /// True while the navigation context is itself a management entry point
    /// (login/landing routes). Eligibility is bypassed there so an admin's
    /// own login flow does not redirect-loop.
    pub management_entry: bool,
}

impl PortalContext {
    pub fn new(portal: Portal) -> Self {
        Self {
            portal,
            management_entry: false,
        }
    }

    pub fn management_entry(portal: Portal) -> Self {
        Self {
            portal,
            management_entry: true,
        }
    }
}

/// May an account with `role` hold a session on `portal`?
///
/// Staff-side roles (anything other than `Customer`) are barred from the
/// customer portal; `Customer` is barred from the management surface. The
/// partner portal is reserved for the partner principal namespace, so no
/// account role is eligible there.
pub fn eligible_for_portal(role: Role, portal: Portal) -> bool {
    match portal {
        Portal::Customer => !role.is_restricted(),
        Portal::Management => role != Role::Customer,
        Portal::Partner => false,
    }
}

/// [`eligible_for_portal`] with the management-entry bypass applied.
pub fn eligible_in_context(role: Role, context: PortalContext) -> bool {
    if context.management_entry {
        return true;
    }
    eligible_for_portal(role, context.portal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, is_primary: bool) -> Actor {
        Actor {
            id: AccountId::new(),
            role,
            is_primary,
        }
    }

    fn target(role: Role, is_primary: bool) -> Target {
        Target {
            id: AccountId::new(),
            role,
            is_primary,
        }
    }

    fn as_target(a: &Actor) -> Target {
        Target {
            id: a.id,
            role: a.role,
            is_primary: a.is_primary,
        }
    }

    #[test]
    fn primary_target_protected_from_everyone_else() {
        let primary = target(Role::SuperAdmin, true);
        for role in [
            Role::SuperAdmin,
            Role::DelegatedSuperAdmin,
            Role::Admin,
            Role::Customer,
        ] {
            let a = actor(role, false);
            for action in [
                ManagementAction::EditProfile,
                ManagementAction::Deactivate,
                ManagementAction::ChangeRole,
                ManagementAction::Remove,
            ] {
                assert_eq!(
                    can_manage(&a, &primary, action),
                    Err(Denial::PrimaryProtected)
                );
            }
        }
    }

    #[test]
    fn self_edit_allowed_but_self_deactivate_and_role_change_denied() {
        for (role, is_primary) in [
            (Role::SuperAdmin, true),
            (Role::DelegatedSuperAdmin, false),
            (Role::Customer, false),
        ] {
            let a = actor(role, is_primary);
            let t = as_target(&a);
            assert_eq!(can_manage(&a, &t, ManagementAction::EditProfile), Ok(()));
            assert_eq!(
                can_manage(&a, &t, ManagementAction::Deactivate),
                Err(Denial::SelfActionForbidden)
            );
            assert_eq!(
                can_manage(&a, &t, ManagementAction::ChangeRole),
                Err(Denial::SelfActionForbidden)
            );
        }
    }

    #[test]
    fn primary_manages_anyone_else() {
        let a = actor(Role::SuperAdmin, true);
        for role in [
            Role::SuperAdmin,
            Role::DelegatedSuperAdmin,
            Role::Admin,
            Role::Employee,
            Role::Customer,
        ] {
            let t = target(role, false);
            assert_eq!(can_manage(&a, &t, ManagementAction::Remove), Ok(()));
            assert_eq!(can_manage(&a, &t, ManagementAction::Deactivate), Ok(()));
        }
    }

    #[test]
    fn only_primary_touches_super_admin_records() {
        let t = target(Role::SuperAdmin, false);
        let peer = actor(Role::SuperAdmin, false);
        assert_eq!(
            can_manage(&peer, &t, ManagementAction::Deactivate),
            Err(Denial::SuperAdminTarget)
        );
        let delegated = actor(Role::DelegatedSuperAdmin, false);
        assert_eq!(
            can_manage(&delegated, &t, ManagementAction::EditProfile),
            Err(Denial::SuperAdminTarget)
        );
    }

    #[test]
    fn delegated_removal_requires_primary() {
        let t = target(Role::DelegatedSuperAdmin, false);

        let primary = actor(Role::SuperAdmin, true);
        assert_eq!(can_manage(&primary, &t, ManagementAction::Remove), Ok(()));

        let secondary_super = actor(Role::SuperAdmin, false);
        assert_eq!(
            can_manage(&secondary_super, &t, ManagementAction::Remove),
            Err(Denial::RemovalRequiresPrimary)
        );

        let peer = actor(Role::DelegatedSuperAdmin, false);
        assert_eq!(
            can_manage(&peer, &t, ManagementAction::Remove),
            Err(Denial::RemovalRequiresPrimary)
        );
    }

    #[test]
    fn delegated_manages_ranks_below_delegated() {
        let a = actor(Role::DelegatedSuperAdmin, false);
        for role in [Role::Admin, Role::AdminCustom, Role::Employee, Role::Customer] {
            let t = target(role, false);
            assert_eq!(can_manage(&a, &t, ManagementAction::Deactivate), Ok(()));
        }
    }

    #[test]
    fn unprivileged_roles_manage_nothing() {
        for role in [Role::Admin, Role::AdminCustom, Role::Employee, Role::Customer] {
            let a = actor(role, false);
            let t = target(Role::Customer, false);
            assert_eq!(
                can_manage(&a, &t, ManagementAction::Deactivate),
                Err(Denial::RankTooLow)
            );
        }
    }

    #[test]
    fn missing_target_fails_closed() {
        let a = actor(Role::SuperAdmin, true);
        assert_eq!(
            can_manage_fetched(&a, None, ManagementAction::Deactivate),
            Err(Denial::MissingTarget)
        );
    }

    #[test]
    fn super_admin_is_never_assignable() {
        for (role, is_primary) in [
            (Role::SuperAdmin, true),
            (Role::SuperAdmin, false),
            (Role::DelegatedSuperAdmin, false),
            (Role::Admin, false),
            (Role::Customer, false),
        ] {
            assert!(!can_assign_role(&actor(role, is_primary), Role::SuperAdmin));
        }
    }

    #[test]
    fn assignment_powers_by_rank() {
        let primary = actor(Role::SuperAdmin, true);
        assert!(can_assign_role(&primary, Role::DelegatedSuperAdmin));
        assert!(can_assign_role(&primary, Role::Admin));
        assert!(can_assign_role(&primary, Role::AdminCustom));

        let delegated = actor(Role::DelegatedSuperAdmin, false);
        assert!(!can_assign_role(&delegated, Role::DelegatedSuperAdmin));
        assert!(can_assign_role(&delegated, Role::Admin));
        assert!(can_assign_role(&delegated, Role::AdminCustom));

        let admin = actor(Role::Admin, false);
        assert!(!can_assign_role(&admin, Role::Admin));
        assert!(!can_assign_role(&admin, Role::Employee));
    }

    #[test]
    fn customer_portal_rejects_staff_roles() {
        for role in [
            Role::SuperAdmin,
            Role::DelegatedSuperAdmin,
            Role::Admin,
            Role::AdminCustom,
            Role::Employee,
        ] {
            assert!(!eligible_for_portal(role, Portal::Customer));
        }
        assert!(eligible_for_portal(Role::Customer, Portal::Customer));
    }

    #[test]
    fn management_portal_rejects_customers() {
        assert!(!eligible_for_portal(Role::Customer, Portal::Management));
        assert!(eligible_for_portal(Role::Employee, Portal::Management));
        assert!(eligible_for_portal(Role::Admin, Portal::Management));
    }

    #[test]
    fn management_entry_bypasses_eligibility() {
        let ctx = PortalContext::management_entry(Portal::Customer);
        assert!(eligible_in_context(Role::Admin, ctx));

        let ctx = PortalContext::new(Portal::Customer);
        assert!(!eligible_in_context(Role::Admin, ctx));
    }
}
