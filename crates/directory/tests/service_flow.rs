//! End-to-end flows through the directory service: partner review, account
//! management, optimistic concurrency, and notification independence.

use chrono::Utc;

use tripgate_auth::{
    Account, AccountStatus, Actor, Capability, Department, PartnerStatus, Role,
};
use tripgate_core::{AccountId, ExpectedVersion, PortalError};
use tripgate_directory::{
    AccountStore, DirectoryService, FailingNotifier, InMemoryAccountStore, InMemoryPartnerStore,
    PartnerStore, RecordingNotifier,
};

type Service<N> = DirectoryService<InMemoryAccountStore, InMemoryPartnerStore, N>;

fn service() -> Service<RecordingNotifier> {
    DirectoryService::new(
        InMemoryAccountStore::new(),
        InMemoryPartnerStore::new(),
        RecordingNotifier::new(),
    )
}

fn primary_actor() -> Actor {
    Actor {
        id: AccountId::new(),
        role: Role::SuperAdmin,
        is_primary: true,
    }
}

fn admin_actor() -> Actor {
    Actor {
        id: AccountId::new(),
        role: Role::Admin,
        is_primary: false,
    }
}

fn delegated_actor() -> Actor {
    Actor {
        id: AccountId::new(),
        role: Role::DelegatedSuperAdmin,
        is_primary: false,
    }
}

fn seed_staff<N: tripgate_directory::Notifier>(svc: &Service<N>, role: Role) -> Account {
    let mut account = Account::employee(
        AccountId::new(),
        "staff@tripgate.example",
        "Staff Member",
        Department::portal_management(),
    );
    account.role = role;
    if role == Role::AdminCustom {
        account.custom_permissions = [Capability::new("partners.review")].into_iter().collect();
    }
    svc.accounts().insert(account.clone()).unwrap();
    account
}

// ─────────────────────────────────────────────────────────────────────────────
// Partner flows
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn full_partner_onboarding_flow() -> anyhow::Result<()> {
    let svc = service();
    let now = Utc::now();

    let registered = svc.register_partner("Atlas Tours", "ops@atlastours.example", now)?;
    assert_eq!(registered.value.status, PartnerStatus::Pending);

    // Pending partners cannot sign in, before any credential check.
    let err = svc.partner_sign_in_gate(registered.value.id).unwrap_err();
    assert!(matches!(err, PortalError::AccountIneligible(_)));

    let approved = svc.approve_partner(&admin_actor(), registered.value.id, now)?;
    assert_eq!(approved.value.status, PartnerStatus::Approved);
    let reference = approved.value.reference.clone().unwrap();
    assert!(reference.as_str().starts_with("TGP-"));

    // Approved but no credential yet: still gated.
    assert!(svc.partner_sign_in_gate(approved.value.id).is_err());

    let token = svc.issue_set_password_token(approved.value.id, now)?;
    svc.complete_password_setup(&token.value, now)?;

    assert!(svc.partner_sign_in_gate(approved.value.id).is_ok());
    Ok(())
}

#[test]
fn rejection_requires_reason_and_persists_it() {
    let svc = service();
    let now = Utc::now();
    let partner = svc
        .register_partner("Vista Travel", "hello@vista.example", now)
        .unwrap()
        .value;

    let err = svc
        .reject_partner(&admin_actor(), partner.id, "  ", now)
        .unwrap_err();
    assert!(matches!(err, PortalError::ValidationFailed(_)));
    assert_eq!(
        svc.partners().get(partner.id).unwrap().unwrap().status,
        PartnerStatus::Pending
    );

    let rejected = svc
        .reject_partner(&admin_actor(), partner.id, "incomplete documents", now)
        .unwrap();
    assert_eq!(rejected.value.status, PartnerStatus::Rejected);
    assert_eq!(
        rejected.value.rejection_reason.as_deref(),
        Some("incomplete documents")
    );
}

#[test]
fn approval_survives_notification_failure() {
    let svc = DirectoryService::new(
        InMemoryAccountStore::new(),
        InMemoryPartnerStore::new(),
        FailingNotifier,
    );
    let now = Utc::now();
    let partner = svc
        .register_partner("Nomad Trails", "team@nomadtrails.example", now)
        .unwrap()
        .value;

    let outcome = svc.approve_partner(&admin_actor(), partner.id, now).unwrap();

    // The email failed, but the approval is committed.
    assert!(!outcome.notification.clone().unwrap().is_sent());
    assert_eq!(
        svc.partners().get(partner.id).unwrap().unwrap().status,
        PartnerStatus::Approved
    );
}

#[test]
fn approval_emails_carry_the_reference() {
    let svc = service();
    let now = Utc::now();
    let partner = svc
        .register_partner("Summit Escapes", "go@summit.example", now)
        .unwrap()
        .value;

    let outcome = svc.approve_partner(&admin_actor(), partner.id, now).unwrap();
    assert!(outcome.notification.unwrap().is_sent());

    let sent = svc.notifier().sent();
    let approval = sent.last().unwrap();
    assert_eq!(approval.template, "partner-approved");
    assert_eq!(
        approval.params.get("reference").map(String::as_str),
        outcome.value.reference.as_ref().map(|r| r.as_str())
    );
}

#[test]
fn custom_admin_reviews_partners_only_with_the_capability() {
    let svc = service();
    let now = Utc::now();

    // A stored custom admin whose permission set grants partner review.
    let granted = seed_staff(&svc, Role::AdminCustom);
    let partner = svc
        .register_partner("Harbor Breaks", "stay@harbor.example", now)
        .unwrap()
        .value;
    let approved = svc
        .approve_partner(&granted.as_actor(), partner.id, now)
        .unwrap();
    assert_eq!(approved.value.status, PartnerStatus::Approved);

    // A custom admin without the review capability is denied.
    let mut ungranted = Account::employee(
        AccountId::new(),
        "content@tripgate.example",
        "Content Admin",
        Department::portal_management(),
    );
    ungranted.role = Role::AdminCustom;
    ungranted.custom_permissions = [Capability::new("content.edit")].into_iter().collect();
    svc.accounts().insert(ungranted.clone()).unwrap();

    let other = svc
        .register_partner("Dune Trips", "book@dune.example", now)
        .unwrap()
        .value;
    let err = svc
        .approve_partner(&ungranted.as_actor(), other.id, now)
        .unwrap_err();
    assert!(matches!(err, PortalError::AuthorizationDenied(_)));
}

#[test]
fn customer_actor_cannot_decide_applications() {
    let svc = service();
    let now = Utc::now();
    let partner = svc
        .register_partner("Polar Paths", "info@polar.example", now)
        .unwrap()
        .value;

    let customer = Actor {
        id: AccountId::new(),
        role: Role::Customer,
        is_primary: false,
    };
    let err = svc.approve_partner(&customer, partner.id, now).unwrap_err();
    assert!(matches!(err, PortalError::AuthorizationDenied(_)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Account flows
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn deactivate_and_reactivate_round_trip() {
    let svc = service();
    let now = Utc::now();
    let target = seed_staff(&svc, Role::Employee);
    let actor = delegated_actor();

    let deactivated = svc.deactivate_account(&actor, target.id, now).unwrap();
    assert_eq!(deactivated.value.status, AccountStatus::Inactive);
    assert_eq!(deactivated.revision, 1);

    let reactivated = svc.reactivate_account(&actor, target.id, now).unwrap();
    assert_eq!(reactivated.value.status, AccountStatus::Active);
    assert_eq!(reactivated.revision, 2);
}

#[test]
fn unauthorized_deactivation_writes_nothing() {
    let svc = service();
    let now = Utc::now();
    let target = seed_staff(&svc, Role::Employee);

    let low_rank = Actor {
        id: AccountId::new(),
        role: Role::Employee,
        is_primary: false,
    };
    let err = svc.deactivate_account(&low_rank, target.id, now).unwrap_err();
    assert!(matches!(err, PortalError::AuthorizationDenied(_)));

    let stored = svc.accounts().get(target.id).unwrap().unwrap();
    assert_eq!(stored.status, AccountStatus::Active);
    assert_eq!(stored.version, 0);
}

#[test]
fn concurrent_managers_surface_a_conflict() {
    let svc = service();
    let now = Utc::now();
    let target = seed_staff(&svc, Role::Employee);

    // Manager one commits a deactivation (revision 0 -> 1).
    svc.deactivate_account(&delegated_actor(), target.id, now).unwrap();

    // Manager two operates on the same original snapshot; the service
    // reloads, so its write applies cleanly on the new revision.
    let reactivated = svc
        .reactivate_account(&primary_actor(), target.id, now)
        .unwrap();
    assert_eq!(reactivated.revision, 2);

    // A raw stale write against the store is what the CAS rejects.
    let mut stale = target.clone();
    stale.version = 1;
    let err = svc
        .accounts()
        .compare_and_swap(stale, ExpectedVersion::Exact(0))
        .unwrap_err();
    assert!(matches!(err, PortalError::Conflict(_)));
}

#[test]
fn role_assignment_respects_assignment_powers() {
    let svc = service();
    let now = Utc::now();
    let target = seed_staff(&svc, Role::Employee);

    // A delegated super-admin cannot mint a peer.
    let delegated = Actor {
        id: AccountId::new(),
        role: Role::DelegatedSuperAdmin,
        is_primary: false,
    };
    let err = svc
        .assign_role(&delegated, target.id, Role::DelegatedSuperAdmin, Vec::new(), now)
        .unwrap_err();
    assert!(matches!(err, PortalError::AuthorizationDenied(_)));

    // But it can mint an admin.
    let admin = svc
        .assign_role(&delegated, target.id, Role::Admin, Vec::new(), now)
        .unwrap();
    assert_eq!(admin.value.role, Role::Admin);
}

#[test]
fn custom_admin_assignment_requires_permissions() {
    let svc = service();
    let now = Utc::now();
    let target = seed_staff(&svc, Role::Employee);

    let err = svc
        .assign_role(&primary_actor(), target.id, Role::AdminCustom, Vec::new(), now)
        .unwrap_err();
    assert!(matches!(err, PortalError::ValidationFailed(_)));

    let ok = svc
        .assign_role(
            &primary_actor(),
            target.id,
            Role::AdminCustom,
            [Capability::new("partners.review")],
            now,
        )
        .unwrap();
    assert_eq!(ok.value.role, Role::AdminCustom);
}

#[test]
fn removal_demotes_elevated_accounts() {
    let svc = service();
    let now = Utc::now();
    let target = seed_staff(&svc, Role::DelegatedSuperAdmin);

    // A non-primary super-admin may not remove a delegated super-admin.
    let secondary = Actor {
        id: AccountId::new(),
        role: Role::SuperAdmin,
        is_primary: false,
    };
    let err = svc.remove_account(&secondary, target.id, now).unwrap_err();
    assert!(matches!(err, PortalError::AuthorizationDenied(_)));

    // The primary may; the record survives as an unprivileged account.
    let removed = svc.remove_account(&primary_actor(), target.id, now).unwrap();
    assert_eq!(removed.value.role, Role::Customer);
    assert!(svc.accounts().get(target.id).unwrap().is_some());
}

#[test]
fn employee_creation_is_admin_only() {
    let svc = service();

    let err = svc
        .create_employee(
            &Actor {
                id: AccountId::new(),
                role: Role::Customer,
                is_primary: false,
            },
            "new@tripgate.example",
            "New Hire",
            Department::new("finance"),
        )
        .unwrap_err();
    assert!(matches!(err, PortalError::AuthorizationDenied(_)));

    let created = svc
        .create_employee(
            &admin_actor(),
            "new@tripgate.example",
            "New Hire",
            Department::new("finance"),
        )
        .unwrap();
    assert_eq!(created.value.role, Role::Employee);
    assert!(created.notification.unwrap().is_sent());
}

#[test]
fn set_password_token_is_time_limited() {
    let svc = service();
    let now = Utc::now();
    let partner = svc
        .register_partner("Delta Voyages", "crew@delta.example", now)
        .unwrap()
        .value;
    svc.approve_partner(&admin_actor(), partner.id, now).unwrap();

    let token = svc.issue_set_password_token(partner.id, now).unwrap().value;

    let too_late = now + chrono::Duration::hours(72);
    let err = svc.complete_password_setup(&token, too_late).unwrap_err();
    assert!(matches!(err, PortalError::AuthenticationFailed(_)));

    // The credential is still unset.
    assert!(!svc.partners().get(partner.id).unwrap().unwrap().credential_set);
}
