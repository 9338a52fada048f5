//! Ledger types - wallets and their append-only transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization's prepaid credit balance.
///
/// One per organization, created lazily on first access. The balance is
/// only ever written by the backend's atomic spend/add procedures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Smallest credit unit; never negative.
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// A fresh zero-balance wallet for an organization.
    pub fn new(organization_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            balance: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Debit,
    Credit,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "debit" => Some(Self::Debit),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: TransactionKind,
    /// Always positive; direction comes from `kind`.
    pub amount: i64,
    /// Records the cause, e.g. "Document Analysis" or "Refund - Analysis Failed".
    pub description: String,
    /// Actor who caused the mutation.
    pub user_id: Uuid,
    /// Correlation tag such as `attempt:<uuid>`. Credits with a reference
    /// are unique per wallet.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Balance delta this entry represents.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionKind::Debit => -self.amount,
            TransactionKind::Credit => self.amount,
        }
    }
}

/// Parameters for a ledger mutation, as handed to the backend.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub organization_id: Uuid,
    pub amount: i64,
    pub description: String,
    pub user_id: Uuid,
    pub reference: Option<String>,
}

/// Result of the backend's atomic spend procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendOutcome {
    /// Debit recorded.
    Applied {
        old_balance: i64,
        new_balance: i64,
        transaction: Transaction,
    },
    /// Balance too low; nothing was written.
    Insufficient { balance: i64 },
}

/// Sum of signed transaction amounts. Equals the wallet balance at all times.
pub fn reconcile(transactions: &[Transaction]) -> i64 {
    transactions.iter().map(Transaction::signed_amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(kind: TransactionKind, amount: i64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            wallet_id: Uuid::nil(),
            kind,
            amount,
            description: "test".into(),
            user_id: Uuid::nil(),
            reference: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reconcile_sums_credits_minus_debits() {
        let txs = vec![
            tx(TransactionKind::Credit, 1000),
            tx(TransactionKind::Debit, 500),
            tx(TransactionKind::Credit, 500),
        ];
        assert_eq!(reconcile(&txs), 1000);
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [TransactionKind::Debit, TransactionKind::Credit] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::parse("refund"), None);
    }
}
