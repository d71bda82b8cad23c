use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::domain::{Account, AccountId, Admin, Cents, TransactionKind, TransactionRecord};

use super::MIGRATION_001_INITIAL;

/// Raw counters for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub transaction_count: i64,
    pub has_sequence_gaps: bool,
    pub invalid_amounts: i64,
    pub orphaned_records: i64,
}

/// Repository for persisting and querying accounts, admins, and the
/// transaction log.
///
/// The pool is capped at a single connection, so a transaction holds the
/// only connection for its whole lifetime: mutating units of work are
/// serialized against each other and against reads, and a dropped
/// transaction rolls back with nothing observable.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Begin a unit of work. Everything executed through the returned
    /// transaction commits together or not at all.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account inside an open unit of work.
    pub async fn insert_account(conn: &mut SqliteConnection, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, password_hash, full_name, date_of_birth, balance_cents, created_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.password_hash)
        .bind(&account.full_name)
        .bind(account.date_of_birth.to_string())
        .bind(account.balance_cents)
        .bind(account.created_at.to_rfc3339())
        .bind(account.closed_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *conn)
        .await
        .context("Failed to insert account")?;
        Ok(())
    }

    /// Get an account by id.
    pub async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, password_hash, full_name, date_of_birth, balance_cents, created_at, closed_at
            FROM accounts
            WHERE user_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Get an account by id inside an open unit of work.
    pub async fn get_account_tx(conn: &mut SqliteConnection, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, password_hash, full_name, date_of_birth, balance_cents, created_at, closed_at
            FROM accounts
            WHERE user_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch account")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// List all accounts (optionally including closed ones).
    pub async fn list_accounts(&self, include_closed: bool) -> Result<Vec<Account>> {
        let query = if include_closed {
            "SELECT user_id, password_hash, full_name, date_of_birth, balance_cents, created_at, closed_at FROM accounts ORDER BY user_id"
        } else {
            "SELECT user_id, password_hash, full_name, date_of_birth, balance_cents, created_at, closed_at FROM accounts WHERE closed_at IS NULL ORDER BY user_id"
        };

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Apply a balance delta inside an open unit of work.
    ///
    /// The update is conditional on the resulting balance staying
    /// non-negative. The service checks preconditions under the same unit
    /// of work, so an unmatched row here means the store and the service
    /// disagree and the whole unit must be abandoned.
    pub async fn apply_delta(conn: &mut SqliteConnection, id: &str, delta: Cents) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE user_id = ? AND balance_cents + ? >= 0
            "#,
        )
        .bind(delta)
        .bind(id)
        .bind(delta)
        .execute(&mut *conn)
        .await
        .context("Failed to apply balance delta")?;

        anyhow::ensure!(
            result.rows_affected() == 1,
            "balance delta of {delta} cents matched no row for account {id}"
        );
        Ok(())
    }

    /// Mark an account as closed. Returns false if it was already closed
    /// or does not exist.
    pub async fn close_account(&self, id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE accounts SET closed_at = ? WHERE user_id = ? AND closed_at IS NULL",
        )
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to close account")?;
        Ok(result.rows_affected() == 1)
    }

    /// Replace an account's password hash. Returns false if the account
    /// does not exist.
    pub async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET password_hash = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;
        Ok(result.rows_affected() == 1)
    }

    // ========================
    // Admin operations
    // ========================

    /// Insert a new admin inside an open unit of work.
    pub async fn insert_admin(conn: &mut SqliteConnection, admin: &Admin) -> Result<()> {
        sqlx::query("INSERT INTO admins (user_id, password_hash) VALUES (?, ?)")
            .bind(&admin.id)
            .bind(&admin.password_hash)
            .execute(&mut *conn)
            .await
            .context("Failed to insert admin")?;
        Ok(())
    }

    /// Get an admin by id.
    pub async fn get_admin(&self, id: &str) -> Result<Option<Admin>> {
        let row = sqlx::query("SELECT user_id, password_hash FROM admins WHERE user_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch admin")?;

        Ok(row.map(|row| Admin {
            id: row.get("user_id"),
            password_hash: row.get("password_hash"),
        }))
    }

    /// Get an admin by id inside an open unit of work.
    pub async fn get_admin_tx(conn: &mut SqliteConnection, id: &str) -> Result<Option<Admin>> {
        let row = sqlx::query("SELECT user_id, password_hash FROM admins WHERE user_id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch admin")?;

        Ok(row.map(|row| Admin {
            id: row.get("user_id"),
            password_hash: row.get("password_hash"),
        }))
    }

    // ========================
    // Transaction log operations
    // ========================

    /// Append a record to the transaction log inside an open unit of work.
    /// The id is assigned by the store and increases monotonically; past
    /// entries are never touched.
    pub async fn append_transaction(
        conn: &mut SqliteConnection,
        account_id: &str,
        kind: TransactionKind,
        amount_cents: Cents,
        timestamp: DateTime<Utc>,
    ) -> Result<TransactionRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (user_id, kind, amount_cents, timestamp)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(kind.as_str())
        .bind(amount_cents)
        .bind(timestamp.to_rfc3339())
        .fetch_one(&mut *conn)
        .await
        .context("Failed to append transaction record")?;

        Ok(TransactionRecord {
            id: row.get("id"),
            account_id: account_id.to_string(),
            kind,
            amount_cents,
            timestamp,
        })
    }

    /// List an account's records, most recent first.
    pub async fn history(&self, id: &str, limit: Option<usize>) -> Result<Vec<TransactionRecord>> {
        let mut query = String::from(
            "SELECT id, user_id, kind, amount_cents, timestamp FROM transactions WHERE user_id = ? ORDER BY id DESC",
        );
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let rows = sqlx::query(&query)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch account history")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Stored balance per account, for reconciliation.
    pub async fn stored_balances(&self) -> Result<Vec<(AccountId, Cents)>> {
        let rows = sqlx::query("SELECT user_id, balance_cents FROM accounts ORDER BY user_id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch stored balances")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("user_id"), row.get("balance_cents")))
            .collect())
    }

    /// Balance per account replayed from the log with SQL aggregation.
    pub async fn computed_balances(
        &self,
    ) -> Result<std::collections::HashMap<AccountId, Cents>> {
        let rows = sqlx::query(
            r#"
            SELECT
                user_id,
                SUM(CASE WHEN kind IN ('deposit', 'transfer_in')
                    THEN amount_cents ELSE -amount_cents END) as balance
            FROM transactions
            GROUP BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute balances from the log")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("user_id"), row.get("balance")))
            .collect())
    }

    /// Raw counters for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let sequence_check = sqlx::query(
            r#"
            SELECT
                MIN(id) as min_id,
                MAX(id) as max_id,
                COUNT(*) as count
            FROM transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let min_id: Option<i64> = sequence_check.get("min_id");
        let max_id: Option<i64> = sequence_check.get("max_id");
        let transaction_count: i64 = sequence_check.get("count");

        let has_sequence_gaps = match (min_id, max_id) {
            (Some(min), Some(max)) => (max - min + 1) != transaction_count,
            _ => false,
        };

        let invalid_amounts: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE amount_cents <= 0")
                .fetch_one(&self.pool)
                .await?
                .get("count");

        let orphaned_records: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM transactions t
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.user_id = t.user_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(IntegrityStats {
            account_count,
            transaction_count,
            has_sequence_gaps,
            invalid_amounts,
            orphaned_records,
        })
    }

    // ========================
    // Row mapping
    // ========================

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let dob_str: String = row.get("date_of_birth");
        let created_at_str: String = row.get("created_at");
        let closed_at_str: Option<String> = row.get("closed_at");

        Ok(Account {
            id: row.get("user_id"),
            password_hash: row.get("password_hash"),
            full_name: row.get("full_name"),
            date_of_birth: NaiveDate::parse_from_str(&dob_str, "%Y-%m-%d")
                .context("Invalid date_of_birth")?,
            balance_cents: row.get("balance_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            closed_at: closed_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid closed_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionRecord> {
        let kind_str: String = row.get("kind");
        let timestamp_str: String = row.get("timestamp");

        Ok(TransactionRecord {
            id: row.get("id"),
            account_id: row.get("user_id"),
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            amount_cents: row.get("amount_cents"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
        })
    }
}
