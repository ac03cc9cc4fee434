//! Partner application lifecycle.
//!
//! Partners live in their own principal namespace. An application starts
//! `pending`, is decided by an admin-class reviewer (`approved` or `rejected`
//! with a mandatory reason), and an approved partner can later be
//! `suspended`. Only `approved` partners with a credential set may
//! authenticate, and that gate runs before any credential check.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use tripgate_core::{Aggregate, AggregateRoot, PartnerId, PortalError, PortalResult};

use crate::capability::{grants, Capability, REVIEW_PARTNERS};
use crate::policy::Actor;
use crate::roles::Role;

// ─────────────────────────────────────────────────────────────────────────────
// Status / Reference
// ─────────────────────────────────────────────────────────────────────────────

/// Partner application status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PartnerStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl core::fmt::Display for PartnerStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PartnerStatus::Pending => write!(f, "pending"),
            PartnerStatus::Approved => write!(f, "approved"),
            PartnerStatus::Rejected => write!(f, "rejected"),
            PartnerStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// Partner-facing identifier, allocated at approval.
///
/// Derived from the approval time plus a collision-resistant suffix. Not
/// globally sequential; the directory service checks a candidate against
/// existing records before finalizing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerReference(String);

impl PartnerReference {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let hex = Uuid::now_v7().simple().to_string();
        // The tail of a v7 UUID carries the random bits.
        let suffix = &hex[hex.len() - 6..];
        Self(format!("TGP-{}-{}", at.format("%Y%m%d%H%M%S"), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PartnerReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Set-password token
// ─────────────────────────────────────────────────────────────────────────────

/// Time-limited token handed to an approved partner for the out-of-band
/// "set password" step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPasswordToken {
    pub partner_id: PartnerId,
    pub token: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SetPasswordToken {
    /// Default validity window for a freshly issued token.
    pub const VALIDITY_HOURS: i64 = 48;

    pub fn issue(partner_id: PartnerId, now: DateTime<Utc>) -> Self {
        Self {
            partner_id,
            token: Uuid::now_v7(),
            issued_at: now,
            expires_at: now + Duration::hours(Self::VALIDITY_HOURS),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate a set-password token's time window.
pub fn validate_token(token: &SetPasswordToken, now: DateTime<Utc>) -> Result<(), TokenError> {
    if token.expires_at <= token.issued_at {
        return Err(TokenError::InvalidTimeWindow);
    }
    if now < token.issued_at {
        return Err(TokenError::NotYetValid);
    }
    if now >= token.expires_at {
        return Err(TokenError::Expired);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Partner
// ─────────────────────────────────────────────────────────────────────────────

/// A partner application document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub company_name: String,
    pub contact_email: String,
    pub status: PartnerStatus,
    /// Set at approval, never before.
    pub reference: Option<PartnerReference>,
    /// Persisted at rejection and later surfaced to the partner.
    pub rejection_reason: Option<String>,
    /// True once the out-of-band set-password step has completed.
    pub credential_set: bool,
    pub applied_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Stored document revision; bumped by the store on every committed write.
    pub version: u64,
}

impl Partner {
    /// A self-registered application, starting at `pending`.
    pub fn register(
        id: PartnerId,
        company_name: impl Into<String>,
        contact_email: impl Into<String>,
        applied_at: DateTime<Utc>,
    ) -> PortalResult<Self> {
        let company_name = company_name.into();
        let contact_email = contact_email.into();
        if company_name.trim().is_empty() {
            return Err(PortalError::validation("company name cannot be empty"));
        }
        if contact_email.trim().is_empty() || !contact_email.contains('@') {
            return Err(PortalError::validation("invalid contact email"));
        }
        Ok(Self {
            id,
            company_name: company_name.trim().to_string(),
            contact_email: contact_email.trim().to_lowercase(),
            status: PartnerStatus::Pending,
            reference: None,
            rejection_reason: None,
            credential_set: false,
            applied_at,
            decided_at: None,
            version: 0,
        })
    }

    /// Sign-in gate, evaluated before any credential check.
    ///
    /// A partner cannot authenticate while the application is undecided,
    /// rejected or suspended, or while no credential has been set.
    pub fn login_gate(&self) -> PortalResult<()> {
        match self.status {
            PartnerStatus::Pending => Err(PortalError::ineligible(
                "your partner application is awaiting approval",
            )),
            PartnerStatus::Rejected => {
                let reason = self
                    .rejection_reason
                    .as_deref()
                    .unwrap_or("no reason recorded");
                Err(PortalError::ineligible(format!(
                    "your partner application was rejected: {reason}"
                )))
            }
            PartnerStatus::Suspended => {
                Err(PortalError::ineligible("your partner account is suspended"))
            }
            PartnerStatus::Approved if !self.credential_set => Err(PortalError::ineligible(
                "your partner account password has not been set",
            )),
            PartnerStatus::Approved => Ok(()),
        }
    }

    /// Reviewer check for partner decisions.
    ///
    /// Fixed admin-class roles review unconditionally; a custom admin reviews
    /// only if its capability set grants the review capability.
    pub fn ensure_reviewer(actor: &Actor, capabilities: &BTreeSet<Capability>) -> PortalResult<()> {
        let allowed = match actor.role {
            Role::SuperAdmin | Role::DelegatedSuperAdmin | Role::Admin => true,
            Role::AdminCustom => grants(capabilities, REVIEW_PARTNERS),
            _ => false,
        };
        if allowed || actor.is_primary {
            Ok(())
        } else {
            Err(PortalError::denied(
                "partner applications are decided by administrators",
            ))
        }
    }
}

impl AggregateRoot for Partner {
    type Id = PartnerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands / Events
// ─────────────────────────────────────────────────────────────────────────────

/// All partner commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PartnerCommand {
    Approve {
        actor: Actor,
        /// The actor's capability set; consulted only for custom admins.
        actor_capabilities: BTreeSet<Capability>,
        reference: PartnerReference,
        occurred_at: DateTime<Utc>,
    },
    Reject {
        actor: Actor,
        actor_capabilities: BTreeSet<Capability>,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Suspend {
        actor: Actor,
        actor_capabilities: BTreeSet<Capability>,
        occurred_at: DateTime<Utc>,
    },
    SetCredential {
        occurred_at: DateTime<Utc>,
    },
}

/// All partner events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PartnerEvent {
    Approved {
        actor_id: tripgate_core::AccountId,
        reference: PartnerReference,
        occurred_at: DateTime<Utc>,
    },
    Rejected {
        actor_id: tripgate_core::AccountId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Suspended {
        actor_id: tripgate_core::AccountId,
        occurred_at: DateTime<Utc>,
    },
    CredentialSet {
        occurred_at: DateTime<Utc>,
    },
}

impl Aggregate for Partner {
    type Command = PartnerCommand;
    type Event = PartnerEvent;
    type Error = PortalError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartnerEvent::Approved {
                reference,
                occurred_at,
                ..
            } => {
                self.status = PartnerStatus::Approved;
                self.reference = Some(reference.clone());
                self.decided_at = Some(*occurred_at);
            }
            PartnerEvent::Rejected {
                reason,
                occurred_at,
                ..
            } => {
                self.status = PartnerStatus::Rejected;
                self.rejection_reason = Some(reason.clone());
                self.decided_at = Some(*occurred_at);
            }
            PartnerEvent::Suspended { .. } => {
                self.status = PartnerStatus::Suspended;
            }
            PartnerEvent::CredentialSet { .. } => {
                self.credential_set = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartnerCommand::Approve {
                actor,
                actor_capabilities,
                reference,
                occurred_at,
            } => {
                Self::ensure_reviewer(actor, actor_capabilities)?;
                if self.status != PartnerStatus::Pending {
                    return Err(PortalError::validation(format!(
                        "cannot approve a {} application",
                        self.status
                    )));
                }
                Ok(vec![PartnerEvent::Approved {
                    actor_id: actor.id,
                    reference: reference.clone(),
                    occurred_at: *occurred_at,
                }])
            }
            PartnerCommand::Reject {
                actor,
                actor_capabilities,
                reason,
                occurred_at,
            } => {
                Self::ensure_reviewer(actor, actor_capabilities)?;
                if self.status != PartnerStatus::Pending {
                    return Err(PortalError::validation(format!(
                        "cannot reject a {} application",
                        self.status
                    )));
                }
                if reason.trim().is_empty() {
                    return Err(PortalError::validation(
                        "a rejection requires a non-empty reason",
                    ));
                }
                Ok(vec![PartnerEvent::Rejected {
                    actor_id: actor.id,
                    reason: reason.trim().to_string(),
                    occurred_at: *occurred_at,
                }])
            }
            PartnerCommand::Suspend {
                actor,
                actor_capabilities,
                occurred_at,
            } => {
                Self::ensure_reviewer(actor, actor_capabilities)?;
                if self.status != PartnerStatus::Approved {
                    return Err(PortalError::validation(format!(
                        "only an approved partner can be suspended (current: {})",
                        self.status
                    )));
                }
                Ok(vec![PartnerEvent::Suspended {
                    actor_id: actor.id,
                    occurred_at: *occurred_at,
                }])
            }
            PartnerCommand::SetCredential { occurred_at } => {
                if self.status != PartnerStatus::Approved {
                    return Err(PortalError::validation(
                        "credentials can only be set for an approved partner",
                    ));
                }
                Ok(vec![PartnerEvent::CredentialSet {
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
