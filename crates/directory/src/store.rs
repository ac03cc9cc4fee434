//! Document store boundaries for accounts and partners.
//!
//! The production deployment backs these with a managed document database;
//! the in-memory implementations here serve tests and local development.
//! Writes go through compare-and-swap so a lost update between two concurrent
//! managers surfaces as a conflict instead of silently reverting.

use std::collections::HashMap;
use std::sync::Mutex;

use tripgate_auth::{Account, Partner, PartnerReference};
use tripgate_core::{AccountId, ExpectedVersion, PartnerId, PortalError, PortalResult};

// ─────────────────────────────────────────────────────────────────────────────
// Account store
// ─────────────────────────────────────────────────────────────────────────────

/// Persistence boundary for account documents.
pub trait AccountStore: Send + Sync {
    fn get(&self, id: AccountId) -> PortalResult<Option<Account>>;

    fn list(&self) -> PortalResult<Vec<Account>>;

    /// Insert a new account document.
    ///
    /// Enforces the system-wide invariant that at most one account is
    /// primary, and rejects duplicate identifiers.
    fn insert(&self, account: Account) -> PortalResult<()>;

    /// Persist an updated account if the stored revision matches `expected`.
    ///
    /// Returns the committed revision.
    fn compare_and_swap(&self, account: Account, expected: ExpectedVersion) -> PortalResult<u64>;
}

/// In-memory account store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    docs: Mutex<HashMap<AccountId, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> PortalError {
    PortalError::store("store lock poisoned")
}

impl AccountStore for InMemoryAccountStore {
    fn get(&self, id: AccountId) -> PortalResult<Option<Account>> {
        let docs = self.docs.lock().map_err(|_| poisoned())?;
        Ok(docs.get(&id).cloned())
    }

    fn list(&self) -> PortalResult<Vec<Account>> {
        let docs = self.docs.lock().map_err(|_| poisoned())?;
        Ok(docs.values().cloned().collect())
    }

    fn insert(&self, account: Account) -> PortalResult<()> {
        let mut docs = self.docs.lock().map_err(|_| poisoned())?;
        if docs.contains_key(&account.id) {
            return Err(PortalError::conflict("account already exists"));
        }
        if account.is_primary && docs.values().any(|a| a.is_primary) {
            return Err(PortalError::validation(
                "a primary account already exists; only one is allowed",
            ));
        }
        docs.insert(account.id, account);
        Ok(())
    }

    fn compare_and_swap(&self, account: Account, expected: ExpectedVersion) -> PortalResult<u64> {
        let mut docs = self.docs.lock().map_err(|_| poisoned())?;
        let stored = docs.get(&account.id).ok_or(PortalError::NotFound)?;
        expected.check(stored.version)?;
        let revision = account.version;
        docs.insert(account.id, account);
        Ok(revision)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Partner store
// ─────────────────────────────────────────────────────────────────────────────

/// Persistence boundary for partner application documents.
pub trait PartnerStore: Send + Sync {
    fn get(&self, id: PartnerId) -> PortalResult<Option<Partner>>;

    fn list(&self) -> PortalResult<Vec<Partner>>;

    fn insert(&self, partner: Partner) -> PortalResult<()>;

    fn compare_and_swap(&self, partner: Partner, expected: ExpectedVersion) -> PortalResult<u64>;

    /// Whether any existing partner already carries this reference.
    ///
    /// Consulted before an approval finalizes a freshly generated reference.
    fn reference_exists(&self, reference: &PartnerReference) -> PortalResult<bool>;
}

/// In-memory partner store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPartnerStore {
    docs: Mutex<HashMap<PartnerId, Partner>>,
}

impl InMemoryPartnerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PartnerStore for InMemoryPartnerStore {
    fn get(&self, id: PartnerId) -> PortalResult<Option<Partner>> {
        let docs = self.docs.lock().map_err(|_| poisoned())?;
        Ok(docs.get(&id).cloned())
    }

    fn list(&self) -> PortalResult<Vec<Partner>> {
        let docs = self.docs.lock().map_err(|_| poisoned())?;
        Ok(docs.values().cloned().collect())
    }

    fn insert(&self, partner: Partner) -> PortalResult<()> {
        let mut docs = self.docs.lock().map_err(|_| poisoned())?;
        if docs.contains_key(&partner.id) {
            return Err(PortalError::conflict("partner already exists"));
        }
        docs.insert(partner.id, partner);
        Ok(())
    }

    fn compare_and_swap(&self, partner: Partner, expected: ExpectedVersion) -> PortalResult<u64> {
        let mut docs = self.docs.lock().map_err(|_| poisoned())?;
        let stored = docs.get(&partner.id).ok_or(PortalError::NotFound)?;
        expected.check(stored.version)?;
        let revision = partner.version;
        docs.insert(partner.id, partner);
        Ok(revision)
    }

    fn reference_exists(&self, reference: &PartnerReference) -> PortalResult<bool> {
        let docs = self.docs.lock().map_err(|_| poisoned())?;
        Ok(docs
            .values()
            .any(|p| p.reference.as_ref() == Some(reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_enforces_single_primary() {
        let store = InMemoryAccountStore::new();
        let first = Account::bootstrap_primary(AccountId::new(), "a@x.example", "A");
        let second = Account::bootstrap_primary(AccountId::new(), "b@x.example", "B");

        store.insert(first).unwrap();
        let err = store.insert(second).unwrap_err();
        assert!(matches!(err, PortalError::ValidationFailed(_)));
    }

    #[test]
    fn cas_rejects_stale_writers() {
        let store = InMemoryAccountStore::new();
        let account = Account::customer(AccountId::new(), "c@x.example", "C");
        store.insert(account.clone()).unwrap();

        // First writer commits revision 1.
        let mut fresh = account.clone();
        fresh.version = 1;
        store
            .compare_and_swap(fresh, ExpectedVersion::Exact(0))
            .unwrap();

        // Second writer still expects revision 0.
        let mut stale = account.clone();
        stale.version = 1;
        let err = store
            .compare_and_swap(stale, ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
    }
}
