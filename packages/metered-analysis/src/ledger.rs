//! Service-level credit ledger.
//!
//! Wraps a [`LedgerBackend`] and enforces the non-negative-balance contract
//! without ever computing a balance itself: every mutation is delegated to
//! the backend's atomic procedures.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::traits::ledger::LedgerBackend;
use crate::types::ledger::{LedgerEntry, SpendOutcome, Transaction, Wallet};

/// Credit ledger for organizations.
#[derive(Clone)]
pub struct CreditLedger {
    backend: Arc<dyn LedgerBackend>,
}

impl CreditLedger {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self { backend }
    }

    /// Fetch the organization's wallet, creating an empty one on first access.
    ///
    /// If the create loses a race the error is `LedgerError::Storage`; retry
    /// this call (which fetches first), not the create.
    pub async fn get_or_create_wallet(&self, organization_id: Uuid) -> LedgerResult<Wallet> {
        if let Some(wallet) = self.backend.find_wallet(organization_id).await? {
            return Ok(wallet);
        }

        let wallet = self.backend.create_wallet(organization_id).await?;
        info!(organization_id = %organization_id, wallet_id = %wallet.id, "Created wallet");
        Ok(wallet)
    }

    /// Get-or-create that absorbs a lost create race by fetching again.
    async fn ensure_wallet(&self, organization_id: Uuid) -> LedgerResult<Wallet> {
        match self.get_or_create_wallet(organization_id).await {
            Ok(wallet) => Ok(wallet),
            Err(LedgerError::Storage(err)) => {
                debug!(organization_id = %organization_id, error = %err, "Wallet create raced, refetching");
                self.backend
                    .find_wallet(organization_id)
                    .await?
                    .ok_or(LedgerError::Storage(err))
            }
            Err(other) => Err(other),
        }
    }

    /// Current balance. Read-only; never authoritative for a later spend.
    pub async fn get_balance(&self, organization_id: Uuid) -> LedgerResult<i64> {
        Ok(self.get_or_create_wallet(organization_id).await?.balance)
    }

    /// Non-authoritative hint that `amount` is currently affordable.
    ///
    /// Used to short-circuit obviously doomed requests before expensive work.
    /// A concurrent spend may still make the real debit fail.
    pub async fn has_sufficient_credit(
        &self,
        organization_id: Uuid,
        amount: i64,
    ) -> LedgerResult<bool> {
        Ok(self.get_balance(organization_id).await? >= amount)
    }

    /// Atomically debit the wallet.
    #[instrument(skip(self, description))]
    pub async fn spend(
        &self,
        organization_id: Uuid,
        amount: i64,
        description: &str,
        user_id: Uuid,
    ) -> LedgerResult<Transaction> {
        self.spend_with_reference(organization_id, amount, description, user_id, None)
            .await
    }

    /// Atomically debit the wallet, tagging the transaction with a reference.
    pub async fn spend_with_reference(
        &self,
        organization_id: Uuid,
        amount: i64,
        description: &str,
        user_id: Uuid,
        reference: Option<String>,
    ) -> LedgerResult<Transaction> {
        check_amount(amount)?;
        self.ensure_wallet(organization_id).await?;

        let entry = LedgerEntry {
            organization_id,
            amount,
            description: description.to_string(),
            user_id,
            reference,
        };

        match self.backend.spend(&entry).await? {
            SpendOutcome::Applied {
                old_balance,
                new_balance,
                transaction,
            } => {
                debug!(old_balance, new_balance, "Debit applied");
                Ok(transaction)
            }
            SpendOutcome::Insufficient { balance } => {
                debug!(balance, required = amount, "Debit rejected");
                Err(LedgerError::InsufficientCredit {
                    balance,
                    required: amount,
                })
            }
        }
    }

    /// Atomically credit the wallet. Used for top-ups and refunds.
    #[instrument(skip(self, description))]
    pub async fn add(
        &self,
        organization_id: Uuid,
        amount: i64,
        description: &str,
        user_id: Uuid,
    ) -> LedgerResult<Transaction> {
        self.add_with_reference(organization_id, amount, description, user_id, None)
            .await
    }

    /// Atomically credit the wallet with a reference.
    ///
    /// A second credit with the same reference returns the first transaction
    /// unchanged.
    pub async fn add_with_reference(
        &self,
        organization_id: Uuid,
        amount: i64,
        description: &str,
        user_id: Uuid,
        reference: Option<String>,
    ) -> LedgerResult<Transaction> {
        check_amount(amount)?;
        self.ensure_wallet(organization_id).await?;

        let entry = LedgerEntry {
            organization_id,
            amount,
            description: description.to_string(),
            user_id,
            reference,
        };
        self.backend.add(&entry).await
    }

    /// Audit trail for an organization, oldest first.
    pub async fn transactions(&self, organization_id: Uuid) -> LedgerResult<Vec<Transaction>> {
        self.backend.transactions(organization_id).await
    }
}

fn check_amount(amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}
