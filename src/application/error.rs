use thiserror::Error;

use crate::domain::Cents;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Admin already exists: {0}")]
    AdminAlreadyExists(String),

    #[error("Account is closed: {0}")]
    AccountClosed(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(
        "Insufficient funds in account {account_id}: balance {balance}, required {required}"
    )]
    InsufficientFunds {
        account_id: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
