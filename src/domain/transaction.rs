use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

/// Transaction ids are assigned by the store and increase monotonically,
/// so they double as the ledger's total order.
pub type TransactionId = i64;

/// What a transaction record did to its account's balance.
/// A transfer produces two linked records: a TransferOut on the source
/// account and a TransferIn on the destination, sharing one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::TransferIn => "transfer_in",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionKind::Deposit),
            "withdrawal" => Some(TransactionKind::Withdrawal),
            "transfer_out" => Some(TransactionKind::TransferOut),
            "transfer_in" => Some(TransactionKind::TransferIn),
            _ => None,
        }
    }

    /// True if this kind increases the account balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Deposit | TransactionKind::TransferIn)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single recorded movement against one account. Records are immutable
/// once written; corrections are new records, never edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    /// Always positive; the kind carries the direction.
    pub amount_cents: Cents,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// The amount as it affects the account balance: positive for credits,
    /// negative for debits.
    pub fn signed_amount(&self) -> Cents {
        if self.kind.is_credit() {
            self.amount_cents
        } else {
            -self.amount_cents
        }
    }
}
