//! Account-snapshot change feed abstraction.
//!
//! The backing document store pushes a fresh snapshot whenever the observed
//! account document changes. The feed makes minimal assumptions:
//!
//! - **Transport-agnostic**: in-memory channels here, a managed change feed in
//!   production.
//! - **At-least-once**: a snapshot may be delivered more than once; the
//!   reconciler is idempotent.
//! - **No freshness guarantee**: snapshots can arrive out of real-time order
//!   relative to writes this client just issued; consumers compare revisions.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::{mpsc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tripgate_auth::Account;
use tripgate_core::AccountId;

/// One observed state of an account document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account: Account,
    /// Document revision at the store when this snapshot was taken.
    pub revision: u64,
    pub observed_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn of(account: Account, observed_at: DateTime<Utc>) -> Self {
        let revision = account.version;
        Self {
            account,
            revision,
            observed_at,
        }
    }
}

/// A live subscription to one account's snapshot stream.
///
/// Dropping the subscription unsubscribes; the feed prunes dead receivers on
/// the next publish.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Change-feed contract for account documents.
pub trait SnapshotFeed: Send + Sync {
    /// Subscribe to every future snapshot of the given account.
    fn subscribe(&self, account_id: AccountId) -> Subscription<AccountSnapshot>;
}

/// In-memory snapshot feed for tests/dev.
///
/// - No IO / no async
/// - Best-effort fan-out per account
/// - At-least-once acceptable (the reconciler is idempotent)
#[derive(Debug, Default)]
pub struct InMemorySnapshotFeed {
    subscribers: Mutex<HashMap<AccountId, Vec<mpsc::Sender<AccountSnapshot>>>>,
}

impl InMemorySnapshotFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a snapshot to every live subscriber of its account.
    pub fn publish(&self, snapshot: AccountSnapshot) {
        if let Ok(mut subs) = self.subscribers.lock() {
            if let Some(senders) = subs.get_mut(&snapshot.account.id) {
                // Drop any dead subscribers while publishing.
                senders.retain(|tx| tx.send(snapshot.clone()).is_ok());
            }
        }
    }
}

impl SnapshotFeed for InMemorySnapshotFeed {
    fn subscribe(&self, account_id: AccountId) -> Subscription<AccountSnapshot> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.entry(account_id).or_default().push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::customer(AccountId::new(), "traveler@example.com", "Traveler")
    }

    #[test]
    fn subscribers_receive_only_their_account() {
        let feed = InMemorySnapshotFeed::new();
        let a = account();
        let b = account();

        let sub_a = feed.subscribe(a.id);
        let sub_b = feed.subscribe(b.id);

        feed.publish(AccountSnapshot::of(a.clone(), Utc::now()));

        assert!(sub_a.try_recv().is_ok());
        assert!(sub_b.try_recv().is_err());
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let feed = InMemorySnapshotFeed::new();
        let a = account();

        let sub = feed.subscribe(a.id);
        drop(sub);

        // Publishing after the drop must not panic and prunes the sender.
        feed.publish(AccountSnapshot::of(a.clone(), Utc::now()));
        let subs = feed.subscribers.lock().unwrap();
        assert!(subs.get(&a.id).map(Vec::is_empty).unwrap_or(true));
    }
}
