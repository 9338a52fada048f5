//! Atomic ledger backend.
//!
//! All balance arithmetic lives behind this trait. Implementations must make
//! `spend` a single atomic check-and-decrement; it is the only serialization
//! point between concurrent attempts against the same organization.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::types::ledger::{LedgerEntry, SpendOutcome, Transaction, Wallet};

#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Fetch an organization's wallet.
    async fn find_wallet(&self, organization_id: Uuid) -> LedgerResult<Option<Wallet>>;

    /// Create a zero-balance wallet.
    ///
    /// Fails with `LedgerError::Storage` if a wallet already exists, e.g. when
    /// a concurrent create won the race. Callers retry the fetch, not the create.
    async fn create_wallet(&self, organization_id: Uuid) -> LedgerResult<Wallet>;

    /// Atomically debit `entry.amount` if the balance covers it.
    ///
    /// Appends exactly one debit transaction when applied, nothing otherwise.
    async fn spend(&self, entry: &LedgerEntry) -> LedgerResult<SpendOutcome>;

    /// Atomically credit `entry.amount`.
    ///
    /// Never fails on balance grounds. When `entry.reference` is set and a
    /// credit with the same reference already exists for the wallet, returns
    /// that transaction without writing anything.
    async fn add(&self, entry: &LedgerEntry) -> LedgerResult<Transaction>;

    /// All transactions for an organization's wallet, oldest first.
    async fn transactions(&self, organization_id: Uuid) -> LedgerResult<Vec<Transaction>>;
}
