use anyhow::Context;
use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::auth;
use crate::domain::{
    Account, Admin, Cents, IntegrityReport, TransactionKind, TransactionRecord, format_cents,
    reconcile_balances,
};
use crate::storage::Repository;

use super::LedgerError;

/// The ledger engine. Every mutating operation runs as one unit of work:
/// the balance change and its log records commit together or not at all,
/// and no caller can observe a half-applied state.
///
/// This is the primary interface for any client (CLI, API, tests).
pub struct LedgerService {
    repo: Repository,
}

/// The two linked halves of one transfer event.
pub struct TransferReceipt {
    pub outgoing: TransactionRecord,
    pub incoming: TransactionRecord,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Registration & credentials
    // ========================

    /// Register a new account with a zero balance. The password hash is
    /// produced by the caller (see [`auth::hash_password`]); the engine
    /// never sees raw secrets at registration time.
    pub async fn register(
        &self,
        id: &str,
        password_hash: &str,
        full_name: &str,
        date_of_birth: NaiveDate,
    ) -> Result<Account, LedgerError> {
        let mut tx = self.repo.begin().await?;

        if Repository::get_account_tx(&mut tx, id).await?.is_some() {
            return Err(LedgerError::AccountAlreadyExists(id.to_string()));
        }

        let account = Account::new(id, password_hash, full_name, date_of_birth);
        Repository::insert_account(&mut tx, &account).await?;
        tx.commit().await.context("Failed to commit transaction")?;

        info!(account = id, "registered account");
        Ok(account)
    }

    /// Create an admin credential.
    pub async fn create_admin(
        &self,
        id: &str,
        password_hash: &str,
    ) -> Result<Admin, LedgerError> {
        let mut tx = self.repo.begin().await?;

        if Repository::get_admin_tx(&mut tx, id).await?.is_some() {
            return Err(LedgerError::AdminAlreadyExists(id.to_string()));
        }

        let admin = Admin {
            id: id.to_string(),
            password_hash: password_hash.to_string(),
        };
        Repository::insert_admin(&mut tx, &admin).await?;
        tx.commit().await.context("Failed to commit transaction")?;

        info!(admin = id, "created admin");
        Ok(admin)
    }

    /// Verify a customer's credential. Fails closed: unknown ids and
    /// undecodable stored hashes verify as false, so the caller learns
    /// nothing beyond yes/no.
    pub async fn verify_credential(&self, id: &str, raw_secret: &str) -> Result<bool, LedgerError> {
        let Some(account) = self.repo.get_account(id).await? else {
            return Ok(false);
        };
        Ok(auth::verify_password(raw_secret, &account.password_hash))
    }

    /// Verify an admin credential, same fail-closed semantics.
    pub async fn verify_admin(&self, id: &str, raw_secret: &str) -> Result<bool, LedgerError> {
        let Some(admin) = self.repo.get_admin(id).await? else {
            return Ok(false);
        };
        Ok(auth::verify_password(raw_secret, &admin.password_hash))
    }

    /// Replace an account's password hash.
    pub async fn reset_password(
        &self,
        id: &str,
        new_password_hash: &str,
    ) -> Result<(), LedgerError> {
        if !self.repo.update_password(id, new_password_hash).await? {
            return Err(LedgerError::AccountNotFound(id.to_string()));
        }
        info!(account = id, "password reset");
        Ok(())
    }

    /// Soft-close an account. Its history and balance stay readable, but
    /// it can no longer take part in deposits, withdrawals, or transfers.
    pub async fn close_account(&self, id: &str) -> Result<(), LedgerError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;

        // The UPDATE itself is guarded on `closed_at IS NULL`, so of two
        // racing closes only one can match the row.
        if !self.repo.close_account(id).await? {
            return Err(LedgerError::AccountClosed(id.to_string()));
        }
        info!(account = id, "closed account");
        Ok(())
    }

    // ========================
    // Ledger operations
    // ========================

    /// Deposit into an account: balance += amount plus one Deposit record,
    /// committed as one unit of work.
    pub async fn deposit(
        &self,
        id: &str,
        amount_cents: Cents,
    ) -> Result<TransactionRecord, LedgerError> {
        Self::require_positive(amount_cents)?;

        let mut tx = self.repo.begin().await?;
        Self::require_open(&mut tx, id).await?;

        Repository::apply_delta(&mut tx, id, amount_cents).await?;
        let record = Repository::append_transaction(
            &mut tx,
            id,
            TransactionKind::Deposit,
            amount_cents,
            Utc::now(),
        )
        .await?;
        tx.commit().await.context("Failed to commit transaction")?;

        info!(
            account = id,
            amount = %format_cents(amount_cents),
            "deposit recorded"
        );
        Ok(record)
    }

    /// Withdraw from an account. The funds check and the balance update
    /// happen inside the same exclusive unit of work, so two concurrent
    /// withdrawals can never both spend the same balance.
    pub async fn withdraw(
        &self,
        id: &str,
        amount_cents: Cents,
    ) -> Result<TransactionRecord, LedgerError> {
        Self::require_positive(amount_cents)?;

        let mut tx = self.repo.begin().await?;
        let account = Self::require_open(&mut tx, id).await?;

        if account.balance_cents < amount_cents {
            return Err(LedgerError::InsufficientFunds {
                account_id: id.to_string(),
                balance: account.balance_cents,
                required: amount_cents,
            });
        }

        Repository::apply_delta(&mut tx, id, -amount_cents).await?;
        let record = Repository::append_transaction(
            &mut tx,
            id,
            TransactionKind::Withdrawal,
            amount_cents,
            Utc::now(),
        )
        .await?;
        tx.commit().await.context("Failed to commit transaction")?;

        info!(
            account = id,
            amount = %format_cents(amount_cents),
            "withdrawal recorded"
        );
        Ok(record)
    }

    /// Transfer between two accounts: debit the source, credit the
    /// destination, and append the TransferOut/TransferIn pair with one
    /// shared timestamp, all committed as one unit of work.
    ///
    /// A self-transfer is allowed: the balance is unchanged but both
    /// linked records are still written, subject to the same funds check.
    pub async fn transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount_cents: Cents,
    ) -> Result<TransferReceipt, LedgerError> {
        Self::require_positive(amount_cents)?;

        let mut tx = self.repo.begin().await?;
        let from = Self::require_open(&mut tx, from_id).await?;
        if from_id != to_id {
            Self::require_open(&mut tx, to_id).await?;
        }

        if from.balance_cents < amount_cents {
            return Err(LedgerError::InsufficientFunds {
                account_id: from_id.to_string(),
                balance: from.balance_cents,
                required: amount_cents,
            });
        }

        if from_id != to_id {
            // Apply the two balance updates in identifier order so every
            // transfer touches accounts in the same order.
            let mut legs = [(from_id, -amount_cents), (to_id, amount_cents)];
            legs.sort();
            for (id, delta) in legs {
                Repository::apply_delta(&mut tx, id, delta).await?;
            }
        }

        // Both halves of the transfer share a single timestamp: they are
        // one causal event.
        let timestamp = Utc::now();
        let outgoing = Repository::append_transaction(
            &mut tx,
            from_id,
            TransactionKind::TransferOut,
            amount_cents,
            timestamp,
        )
        .await?;
        let incoming = Repository::append_transaction(
            &mut tx,
            to_id,
            TransactionKind::TransferIn,
            amount_cents,
            timestamp,
        )
        .await?;
        tx.commit().await.context("Failed to commit transaction")?;

        info!(
            from = from_id,
            to = to_id,
            amount = %format_cents(amount_cents),
            "transfer recorded"
        );
        Ok(TransferReceipt { outgoing, incoming })
    }

    /// Current balance for an account.
    pub async fn check_balance(&self, id: &str) -> Result<Cents, LedgerError> {
        let account = self.get_account(id).await?;
        Ok(account.balance_cents)
    }

    /// An account's transaction history, most recent first.
    pub async fn history(
        &self,
        id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        // Existence check first so an unknown account is an error, not an
        // empty history.
        self.get_account(id).await?;
        debug!(account = id, "history queried");
        Ok(self.repo.history(id, limit).await?)
    }

    /// Get an account by id.
    pub async fn get_account(&self, id: &str) -> Result<Account, LedgerError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// List all accounts.
    pub async fn list_accounts(&self, include_closed: bool) -> Result<Vec<Account>, LedgerError> {
        Ok(self.repo.list_accounts(include_closed).await?)
    }

    // ========================
    // Integrity
    // ========================

    /// Reconcile stored balances against the transaction log and check
    /// the log itself for gaps, bad amounts, and orphaned records.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let stats = self.repo.get_integrity_stats().await?;
        let stored = self.repo.stored_balances().await?;
        let computed = self.repo.computed_balances().await?;

        let mismatches = reconcile_balances(&stored, &computed);

        Ok(IntegrityReport {
            account_count: stats.account_count,
            transaction_count: stats.transaction_count,
            has_sequence_gaps: stats.has_sequence_gaps,
            invalid_amounts: stats.invalid_amounts,
            orphaned_records: stats.orphaned_records,
            mismatches,
        })
    }

    // ========================
    // Helpers
    // ========================

    fn require_positive(amount_cents: Cents) -> Result<(), LedgerError> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "amount must be positive, got {}",
                format_cents(amount_cents)
            )));
        }
        Ok(())
    }

    /// Fetch an account inside an open unit of work, rejecting unknown
    /// and closed accounts.
    async fn require_open(conn: &mut SqliteConnection, id: &str) -> Result<Account, LedgerError> {
        let account = Repository::get_account_tx(conn, id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;
        if account.is_closed() {
            return Err(LedgerError::AccountClosed(id.to_string()));
        }
        Ok(account)
    }
}
