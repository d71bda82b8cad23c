// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use sportello::application::LedgerService;
use tempfile::TempDir;

/// A syntactically hash-shaped placeholder. The ledger treats password
/// hashes as opaque text, so tests that are not about authentication can
/// skip the real (and deliberately slow) Argon2 work.
pub const TEST_HASH: &str = "$argon2id$test$placeholder";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// A fixed date of birth for test accounts
pub fn dob() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 15).unwrap()
}

/// Register an account with placeholder credentials
pub async fn register(service: &LedgerService, id: &str) -> Result<()> {
    service
        .register(id, TEST_HASH, &format!("{id} (test)"), dob())
        .await?;
    Ok(())
}

/// Test fixture: standard account setup
pub struct StandardAccounts;

impl StandardAccounts {
    /// Create the usual pair: alice and bob
    pub async fn create_pair(service: &LedgerService) -> Result<()> {
        register(service, "alice").await?;
        register(service, "bob").await?;
        Ok(())
    }

    /// Create alice and bob, and fund alice
    pub async fn create_funded_pair(service: &LedgerService, cents: i64) -> Result<()> {
        Self::create_pair(service).await?;
        service.deposit("alice", cents).await?;
        Ok(())
    }
}
