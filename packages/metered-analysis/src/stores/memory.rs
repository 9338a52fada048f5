//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{CatalogError, LedgerError, LedgerResult, StoreResult};
use crate::traits::{catalog::CostBackend, ledger::LedgerBackend, result_store::ResultStore};
use crate::types::{
    analysis::{AnalysisResult, CachedResult},
    cost::CostEntry,
    ledger::{LedgerEntry, SpendOutcome, Transaction, TransactionKind, Wallet},
};

#[derive(Default)]
struct Account {
    wallet: Option<Wallet>,
    transactions: Vec<Transaction>,
}

/// In-memory ledger, cost table and result store.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart. Each ledger mutation holds a single mutex
/// for its check-and-write, which stands in for the atomic server-side
/// procedure of a real backend.
pub struct MemoryStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
    costs: RwLock<HashMap<String, CostEntry>>,
    results: RwLock<Vec<CachedResult>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            costs: RwLock::new(HashMap::new()),
            results: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace a cost entry.
    pub fn set_cost(&self, entry: CostEntry) {
        self.costs
            .write()
            .unwrap()
            .insert(entry.action_key.clone(), entry);
    }

    /// Remove a cost entry.
    pub fn remove_cost(&self, action_key: &str) {
        self.costs.write().unwrap().remove(action_key);
    }

    /// Get the number of stored results.
    pub fn result_count(&self) -> usize {
        self.results.read().unwrap().len()
    }

    /// Get the number of wallets.
    pub fn wallet_count(&self) -> usize {
        self.accounts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.wallet.is_some())
            .count()
    }
}

fn record(wallet: &Wallet, kind: TransactionKind, entry: &LedgerEntry, now: DateTime<Utc>) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        wallet_id: wallet.id,
        kind,
        amount: entry.amount,
        description: entry.description.clone(),
        user_id: entry.user_id,
        reference: entry.reference.clone(),
        created_at: now,
    }
}

#[async_trait]
impl LedgerBackend for MemoryStore {
    async fn find_wallet(&self, organization_id: Uuid) -> LedgerResult<Option<Wallet>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(&organization_id)
            .and_then(|a| a.wallet.clone()))
    }

    async fn create_wallet(&self, organization_id: Uuid) -> LedgerResult<Wallet> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.entry(organization_id).or_default();
        if account.wallet.is_some() {
            return Err(LedgerError::storage(format!(
                "wallet already exists for organization {organization_id}"
            )));
        }
        let wallet = Wallet::new(organization_id);
        account.wallet = Some(wallet.clone());
        Ok(wallet)
    }

    async fn spend(&self, entry: &LedgerEntry) -> LedgerResult<SpendOutcome> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&entry.organization_id)
            .filter(|a| a.wallet.is_some())
            .ok_or_else(|| {
                LedgerError::storage(format!("no wallet for organization {}", entry.organization_id))
            })?;
        let Some(wallet) = account.wallet.as_mut() else {
            return Err(LedgerError::storage("wallet vanished"));
        };

        if wallet.balance < entry.amount {
            return Ok(SpendOutcome::Insufficient {
                balance: wallet.balance,
            });
        }

        let now = Utc::now();
        let old_balance = wallet.balance;
        wallet.balance -= entry.amount;
        wallet.updated_at = now;
        let new_balance = wallet.balance;
        let transaction = record(wallet, TransactionKind::Debit, entry, now);
        account.transactions.push(transaction.clone());

        Ok(SpendOutcome::Applied {
            old_balance,
            new_balance,
            transaction,
        })
    }

    async fn add(&self, entry: &LedgerEntry) -> LedgerResult<Transaction> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.entry(entry.organization_id).or_default();

        if let Some(reference) = entry.reference.as_deref() {
            if let Some(existing) = account
                .transactions
                .iter()
                .find(|t| t.kind == TransactionKind::Credit && t.reference.as_deref() == Some(reference))
            {
                return Ok(existing.clone());
            }
        }

        let now = Utc::now();
        let wallet = account
            .wallet
            .get_or_insert_with(|| Wallet::new(entry.organization_id));
        wallet.balance = wallet
            .balance
            .checked_add(entry.amount)
            .ok_or_else(|| LedgerError::storage("balance overflow"))?;
        wallet.updated_at = now;
        let transaction = record(wallet, TransactionKind::Credit, entry, now);
        account.transactions.push(transaction.clone());

        Ok(transaction)
    }

    async fn transactions(&self, organization_id: Uuid) -> LedgerResult<Vec<Transaction>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(&organization_id)
            .map(|a| a.transactions.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CostBackend for MemoryStore {
    async fn list_active_costs(&self) -> Result<Vec<CostEntry>, CatalogError> {
        Ok(self
            .costs
            .read()
            .unwrap()
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert(
        &self,
        fingerprint: &str,
        result: &AnalysisResult,
        created_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.results.write().unwrap().push(CachedResult {
            fingerprint: fingerprint.to_string(),
            result: result.clone(),
            created_at,
        });
        Ok(())
    }

    async fn query_by_fingerprint(
        &self,
        fingerprint: &str,
        not_before: DateTime<Utc>,
    ) -> StoreResult<Option<CachedResult>> {
        Ok(self
            .results
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.fingerprint == fingerprint && r.created_at >= not_before)
            .max_by_key(|r| r.created_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(org: Uuid, amount: i64) -> LedgerEntry {
        LedgerEntry {
            organization_id: org,
            amount,
            description: "test".into(),
            user_id: Uuid::nil(),
            reference: None,
        }
    }

    #[tokio::test]
    async fn second_create_loses_the_race() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();

        store.create_wallet(org).await.unwrap();
        let err = store.create_wallet(org).await.unwrap_err();

        assert!(matches!(err, LedgerError::Storage(_)));
        assert_eq!(store.wallet_count(), 1);
    }

    #[tokio::test]
    async fn spend_reports_old_and_new_balance() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        store.create_wallet(org).await.unwrap();
        store.add(&entry(org, 1000)).await.unwrap();

        match store.spend(&entry(org, 300)).await.unwrap() {
            SpendOutcome::Applied {
                old_balance,
                new_balance,
                ..
            } => {
                assert_eq!(old_balance, 1000);
                assert_eq!(new_balance, 700);
            }
            other => panic!("expected applied, got {other:?}"),
        }

        assert_eq!(
            store.spend(&entry(org, 701)).await.unwrap(),
            SpendOutcome::Insufficient { balance: 700 }
        );
    }

    #[tokio::test]
    async fn overflowing_credit_is_rejected_and_store_stays_usable() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        store.add(&entry(org, i64::MAX)).await.unwrap();

        let err = store.add(&entry(org, 1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));

        let wallet = store.find_wallet(org).await.unwrap().unwrap();
        assert_eq!(wallet.balance, i64::MAX);
        assert_eq!(store.transactions(org).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inactive_costs_are_not_listed() {
        let store = MemoryStore::new();
        store.set_cost(CostEntry::new("document_analysis", 500));
        store.set_cost(CostEntry::new("export", 50).inactive());

        let costs = store.list_active_costs().await.unwrap();
        assert_eq!(costs.len(), 1);
        assert_eq!(costs[0].action_key, "document_analysis");
    }

    #[tokio::test]
    async fn query_returns_newest_fresh_result() {
        let store = MemoryStore::new();
        let old = AnalysisResult::from_payload(serde_json::json!({
            "matchScore": 10, "findings": [], "sources": []
        }))
        .unwrap();
        let new = AnalysisResult::from_payload(serde_json::json!({
            "matchScore": 90, "findings": [], "sources": []
        }))
        .unwrap();
        let now = Utc::now();

        store.insert("fp", &old, now - chrono::Duration::hours(2)).await.unwrap();
        store.insert("fp", &new, now - chrono::Duration::hours(1)).await.unwrap();

        let hit = store
            .query_by_fingerprint("fp", now - chrono::Duration::days(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.result.match_score, 90);

        let miss = store.query_by_fingerprint("fp", now).await.unwrap();
        assert!(miss.is_none());
    }
}
