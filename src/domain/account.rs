use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

/// Accounts are identified by a caller-chosen user id, immutable once
/// registered.
pub type AccountId = String;

/// A customer account. The balance is mutated only by the ledger service;
/// everything else is profile data fixed at registration (except the
/// password hash, which can be reset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// PHC-format password hash (scheme, salt, and digest in one string).
    /// Opaque to everything except the auth module.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    /// Invariant: never negative.
    pub balance_cents: Cents,
    pub created_at: DateTime<Utc>,
    /// Accounts are never physically deleted, only closed.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new account with a zero balance.
    pub fn new(
        id: impl Into<AccountId>,
        password_hash: impl Into<String>,
        full_name: impl Into<String>,
        date_of_birth: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            password_hash: password_hash.into(),
            full_name: full_name.into(),
            date_of_birth,
            balance_cents: 0,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// An administrator credential. Admins hold no balance of their own; they
/// exercise the same ledger operations on behalf of a target account.
#[derive(Debug, Clone)]
pub struct Admin {
    pub id: AccountId,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dob() -> NaiveDate {
        NaiveDate::from_ymd_opt(1990, 4, 1).unwrap()
    }

    #[test]
    fn test_new_account_starts_empty_and_open() {
        let account = Account::new("alice", "$argon2id$stub", "Alice Rossi", dob());
        assert_eq!(account.balance_cents, 0);
        assert!(!account.is_closed());
    }

    #[test]
    fn test_closed_account_is_detected() {
        let mut account = Account::new("bob", "$argon2id$stub", "Bob Bianchi", dob());
        account.closed_at = Some(Utc::now());
        assert!(account.is_closed());
    }
}
