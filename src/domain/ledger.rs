use std::collections::HashMap;

use serde::Serialize;

use super::{AccountId, Cents, TransactionRecord};

/// Replay an account's balance from its transaction records.
/// Balance = signed sum of all records, starting from zero.
pub fn balance_from_records(account_id: &str, records: &[TransactionRecord]) -> Cents {
    records
        .iter()
        .filter(|r| r.account_id == account_id)
        .map(TransactionRecord::signed_amount)
        .sum()
}

/// Replay balances for every account that appears in the log.
pub fn balances_from_records(records: &[TransactionRecord]) -> HashMap<AccountId, Cents> {
    let mut balances: HashMap<AccountId, Cents> = HashMap::new();
    for record in records {
        *balances.entry(record.account_id.clone()).or_insert(0) += record.signed_amount();
    }
    balances
}

/// A stored balance that does not match the replayed transaction log.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceMismatch {
    pub account_id: AccountId,
    pub stored_cents: Cents,
    pub computed_cents: Cents,
}

/// Result of reconciling stored balances against the transaction log.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub transaction_count: i64,
    /// Gaps in the record id sequence mean records were lost or deleted.
    pub has_sequence_gaps: bool,
    /// Records with non-positive amounts (should be impossible).
    pub invalid_amounts: i64,
    /// Records referencing an account id that does not exist.
    pub orphaned_records: i64,
    /// Accounts whose stored balance disagrees with their record history.
    pub mismatches: Vec<BalanceMismatch>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        !self.has_sequence_gaps
            && self.invalid_amounts == 0
            && self.orphaned_records == 0
            && self.mismatches.is_empty()
    }
}

/// Compare stored balances against balances replayed from the log.
/// Accounts with no records reconcile against zero.
pub fn reconcile_balances(
    stored: &[(AccountId, Cents)],
    computed: &HashMap<AccountId, Cents>,
) -> Vec<BalanceMismatch> {
    stored
        .iter()
        .filter_map(|(account_id, stored_cents)| {
            let computed_cents = computed.get(account_id).copied().unwrap_or(0);
            if *stored_cents != computed_cents {
                Some(BalanceMismatch {
                    account_id: account_id.clone(),
                    stored_cents: *stored_cents,
                    computed_cents,
                })
            } else {
                None
            }
        })
        .collect()
}
