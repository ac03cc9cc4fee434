//! Management operations over accounts and partner applications.
//!
//! Each operation follows the same pipeline: authorize against the policy
//! engine, validate, run the aggregate transition (the fail-closed guard),
//! commit through compare-and-swap, then attempt any accompanying
//! notification. The notification outcome rides on a separate channel and
//! never affects whether the primary transition succeeded.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use tripgate_auth::{
    account::{ChangeRole, Deactivate, EditProfile, Reactivate, Remove},
    partner::validate_token,
    Account, AccountCommand, Actor, Capability, Department, Partner, PartnerCommand,
    PartnerReference, Role, SetPasswordToken,
};
use tripgate_core::{
    Aggregate, AccountId, ExpectedVersion, PartnerId, PortalError, PortalResult,
};

use crate::notify::{Notification, Notifier, NotifyOutcome};
use crate::store::{AccountStore, PartnerStore};

/// How many reference candidates an approval will try before giving up.
const REFERENCE_ATTEMPTS: usize = 5;

/// Result of a management operation.
///
/// The primary transition's value and committed revision, plus the outcome of
/// any accompanying notification. A `Failed` notification does not make the
/// operation a failure.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub revision: u64,
    pub notification: Option<NotifyOutcome>,
}

/// The management service for the admin portal.
pub struct DirectoryService<A, P, N> {
    accounts: A,
    partners: P,
    notifier: N,
}

impl<A, P, N> DirectoryService<A, P, N>
where
    A: AccountStore,
    P: PartnerStore,
    N: Notifier,
{
    pub fn new(accounts: A, partners: P, notifier: N) -> Self {
        Self {
            accounts,
            partners,
            notifier,
        }
    }

    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    pub fn partners(&self) -> &P {
        &self.partners
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    fn dispatch(&self, notification: Notification) -> NotifyOutcome {
        let outcome = self.notifier.send(notification.clone());
        if let NotifyOutcome::Failed(reason) = &outcome {
            tracing::warn!(
                template = notification.template,
                recipient = %notification.recipient,
                reason,
                "notification dispatch failed"
            );
        }
        outcome
    }

    /// Load, transition and commit an account document.
    fn run_account_command(
        &self,
        id: AccountId,
        command: AccountCommand,
    ) -> PortalResult<(Account, u64)> {
        let mut account = self.accounts.get(id)?.ok_or(PortalError::NotFound)?;
        let original = account.version;

        let events = account.handle(&command)?;
        for event in &events {
            account.apply(event);
        }
        account.validate()?;

        let revision = self
            .accounts
            .compare_and_swap(account.clone(), ExpectedVersion::Exact(original))?;
        Ok((account, revision))
    }

    /// The actor's stored capability set, for capability-gated decisions.
    ///
    /// Only custom admins carry one; every other role is decided on the role
    /// alone. An actor without a stored account resolves to the empty set and
    /// fails closed downstream.
    fn actor_capabilities(&self, actor: &Actor) -> PortalResult<BTreeSet<Capability>> {
        if actor.role != Role::AdminCustom {
            return Ok(BTreeSet::new());
        }
        Ok(self
            .accounts
            .get(actor.id)?
            .map(|account| account.custom_permissions)
            .unwrap_or_default())
    }

    /// Load, transition and commit a partner document.
    fn run_partner_command(
        &self,
        id: PartnerId,
        command: PartnerCommand,
    ) -> PortalResult<(Partner, u64)> {
        let mut partner = self.partners.get(id)?.ok_or(PortalError::NotFound)?;
        let original = partner.version;

        let events = partner.handle(&command)?;
        for event in &events {
            partner.apply(event);
        }

        let revision = self
            .partners
            .compare_and_swap(partner.clone(), ExpectedVersion::Exact(original))?;
        Ok((partner, revision))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a staff account.
    pub fn create_employee(
        &self,
        actor: &Actor,
        email: &str,
        display_name: &str,
        department: Department,
    ) -> PortalResult<Outcome<Account>> {
        if !(actor.is_primary || actor.role.is_admin_class() && actor.role != Role::AdminCustom) {
            return Err(PortalError::denied(
                "staff accounts are created by administrators",
            ));
        }

        let account = Account::employee(AccountId::new(), email, display_name, department);
        account.validate()?;
        self.accounts.insert(account.clone())?;

        let notification = self.dispatch(
            Notification::new("employee-welcome", account.email.as_str())
                .param("display_name", account.display_name.as_str()),
        );

        Ok(Outcome {
            revision: account.version,
            value: account,
            notification: Some(notification),
        })
    }

    /// Assign a role to an account.
    pub fn assign_role(
        &self,
        actor: &Actor,
        target: AccountId,
        new_role: Role,
        custom_permissions: impl IntoIterator<Item = Capability>,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Account>> {
        let (account, revision) = self.run_account_command(
            target,
            AccountCommand::ChangeRole(ChangeRole {
                actor: *actor,
                new_role,
                custom_permissions: custom_permissions.into_iter().collect(),
                occurred_at: now,
            }),
        )?;
        Ok(Outcome {
            value: account,
            revision,
            notification: None,
        })
    }

    /// Deactivate an account (`active → inactive`).
    ///
    /// Any live session held by the target is invalidated by the next
    /// reconciliation cycle that observes the new state.
    pub fn deactivate_account(
        &self,
        actor: &Actor,
        target: AccountId,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Account>> {
        let (account, revision) = self.run_account_command(
            target,
            AccountCommand::Deactivate(Deactivate {
                actor: *actor,
                occurred_at: now,
            }),
        )?;
        Ok(Outcome {
            value: account,
            revision,
            notification: None,
        })
    }

    /// Reactivate an account (`inactive → active`).
    pub fn reactivate_account(
        &self,
        actor: &Actor,
        target: AccountId,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Account>> {
        let (account, revision) = self.run_account_command(
            target,
            AccountCommand::Reactivate(Reactivate {
                actor: *actor,
                occurred_at: now,
            }),
        )?;
        Ok(Outcome {
            value: account,
            revision,
            notification: None,
        })
    }

    /// Edit an account's mutable profile fields (self or managed).
    pub fn edit_profile(
        &self,
        actor: &Actor,
        target: AccountId,
        email: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Account>> {
        let (account, revision) = self.run_account_command(
            target,
            AccountCommand::EditProfile(EditProfile {
                actor: *actor,
                email: email.to_string(),
                display_name: display_name.to_string(),
                occurred_at: now,
            }),
        )?;
        Ok(Outcome {
            value: account,
            revision,
            notification: None,
        })
    }

    /// Remove an elevated account, demoting it to the unprivileged role.
    pub fn remove_account(
        &self,
        actor: &Actor,
        target: AccountId,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Account>> {
        let (account, revision) = self.run_account_command(
            target,
            AccountCommand::Remove(Remove {
                actor: *actor,
                occurred_at: now,
            }),
        )?;
        Ok(Outcome {
            value: account,
            revision,
            notification: None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Partners
    // ─────────────────────────────────────────────────────────────────────────

    /// Accept a self-registered partner application (starts `pending`).
    pub fn register_partner(
        &self,
        company_name: &str,
        contact_email: &str,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Partner>> {
        let partner = Partner::register(PartnerId::new(), company_name, contact_email, now)?;
        self.partners.insert(partner.clone())?;

        let notification = self.dispatch(
            Notification::new("partner-application-received", partner.contact_email.as_str())
                .param("company_name", partner.company_name.as_str()),
        );

        Ok(Outcome {
            revision: partner.version,
            value: partner,
            notification: Some(notification),
        })
    }

    /// Approve a pending application, allocating a unique partner reference.
    pub fn approve_partner(
        &self,
        actor: &Actor,
        id: PartnerId,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Partner>> {
        let reference = self.allocate_reference(now)?;

        let (partner, revision) = self.run_partner_command(
            id,
            PartnerCommand::Approve {
                actor: *actor,
                actor_capabilities: self.actor_capabilities(actor)?,
                reference: reference.clone(),
                occurred_at: now,
            },
        )?;

        let notification = self.dispatch(
            Notification::new("partner-approved", partner.contact_email.as_str())
                .param("company_name", partner.company_name.as_str())
                .param("reference", reference.as_str()),
        );

        Ok(Outcome {
            value: partner,
            revision,
            notification: Some(notification),
        })
    }

    fn allocate_reference(&self, now: DateTime<Utc>) -> PortalResult<PartnerReference> {
        for _ in 0..REFERENCE_ATTEMPTS {
            let candidate = PartnerReference::generate(now);
            if !self.partners.reference_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(PortalError::conflict(
            "could not allocate a unique partner reference",
        ))
    }

    /// Reject a pending application with a mandatory reason.
    pub fn reject_partner(
        &self,
        actor: &Actor,
        id: PartnerId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Partner>> {
        let (partner, revision) = self.run_partner_command(
            id,
            PartnerCommand::Reject {
                actor: *actor,
                actor_capabilities: self.actor_capabilities(actor)?,
                reason: reason.to_string(),
                occurred_at: now,
            },
        )?;

        let reason = partner
            .rejection_reason
            .clone()
            .unwrap_or_else(|| reason.trim().to_string());
        let notification = self.dispatch(
            Notification::new("partner-rejected", partner.contact_email.as_str())
                .param("company_name", partner.company_name.as_str())
                .param("reason", reason),
        );

        Ok(Outcome {
            value: partner,
            revision,
            notification: Some(notification),
        })
    }

    /// Suspend an approved partner.
    pub fn suspend_partner(
        &self,
        actor: &Actor,
        id: PartnerId,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Partner>> {
        let (partner, revision) = self.run_partner_command(
            id,
            PartnerCommand::Suspend {
                actor: *actor,
                actor_capabilities: self.actor_capabilities(actor)?,
                occurred_at: now,
            },
        )?;

        let notification = self.dispatch(
            Notification::new("partner-suspended", partner.contact_email.as_str())
                .param("company_name", partner.company_name.as_str()),
        );

        Ok(Outcome {
            value: partner,
            revision,
            notification: Some(notification),
        })
    }

    /// Issue the time-limited set-password token for an approved partner.
    pub fn issue_set_password_token(
        &self,
        id: PartnerId,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<SetPasswordToken>> {
        let partner = self.partners.get(id)?.ok_or(PortalError::NotFound)?;
        if partner.status != tripgate_auth::PartnerStatus::Approved {
            return Err(PortalError::validation(
                "set-password tokens are issued to approved partners only",
            ));
        }

        let token = SetPasswordToken::issue(id, now);
        let notification = self.dispatch(
            Notification::new("partner-set-password", partner.contact_email.as_str())
                .param("token", token.token.to_string()),
        );

        Ok(Outcome {
            revision: partner.version,
            value: token,
            notification: Some(notification),
        })
    }

    /// Complete the out-of-band set-password step.
    pub fn complete_password_setup(
        &self,
        token: &SetPasswordToken,
        now: DateTime<Utc>,
    ) -> PortalResult<Outcome<Partner>> {
        validate_token(token, now)
            .map_err(|e| PortalError::authentication(e.to_string()))?;

        let (partner, revision) = self.run_partner_command(
            token.partner_id,
            PartnerCommand::SetCredential { occurred_at: now },
        )?;

        Ok(Outcome {
            value: partner,
            revision,
            notification: None,
        })
    }

    /// Partner sign-in eligibility, checked before any credential
    /// verification.
    pub fn partner_sign_in_gate(&self, id: PartnerId) -> PortalResult<()> {
        let partner = self.partners.get(id)?.ok_or(PortalError::NotFound)?;
        partner.login_gate()
    }
}
