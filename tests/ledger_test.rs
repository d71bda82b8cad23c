mod common;

use anyhow::Result;
use common::{StandardAccounts, register, test_service};
use sportello::application::LedgerError;
use sportello::domain::{TransactionKind, balance_from_records};

#[tokio::test]
async fn test_withdraw_updates_balance_and_log() -> Result<()> {
    let (service, _temp) = test_service().await?;
    register(&service, "alice").await?;
    service.deposit("alice", 10000).await?;

    let record = service.withdraw("alice", 3000).await?;

    assert_eq!(record.kind, TransactionKind::Withdrawal);
    assert_eq!(record.amount_cents, 3000);
    assert_eq!(service.check_balance("alice").await?, 7000);

    let history = service.history("alice", None).await?;
    let withdrawals: Vec<_> = history
        .iter()
        .filter(|r| r.kind == TransactionKind::Withdrawal)
        .collect();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].amount_cents, 3000);

    Ok(())
}

#[tokio::test]
async fn test_deposit_then_transfer_scenario() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create_pair(&service).await?;

    service.deposit("alice", 5000).await?;
    let bob_before = service.check_balance("bob").await?;
    service.transfer("alice", "bob", 2000).await?;

    assert_eq!(service.check_balance("alice").await?, 3000);
    assert_eq!(service.check_balance("bob").await?, bob_before + 2000);

    let alice_history = service.history("alice", None).await?;
    let kinds: Vec<_> = alice_history.iter().map(|r| r.kind).collect();
    // Most recent first
    assert_eq!(
        kinds,
        vec![TransactionKind::TransferOut, TransactionKind::Deposit]
    );

    let bob_history = service.history("bob", None).await?;
    assert_eq!(bob_history.len(), 1);
    assert_eq!(bob_history[0].kind, TransactionKind::TransferIn);
    assert_eq!(bob_history[0].amount_cents, 2000);

    Ok(())
}

#[tokio::test]
async fn test_overdraft_is_rejected_and_leaves_no_trace() -> Result<()> {
    let (service, _temp) = test_service().await?;
    register(&service, "alice").await?;
    service.deposit("alice", 7000).await?;
    let log_before = service.history("alice", None).await?.len();

    let result = service.withdraw("alice", 100000).await;

    assert!(matches!(
        result,
        Err(LedgerError::InsufficientFunds {
            balance: 7000,
            required: 100000,
            ..
        })
    ));
    assert_eq!(service.check_balance("alice").await?, 7000);
    assert_eq!(service.history("alice", None).await?.len(), log_before);

    Ok(())
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create_pair(&service).await?;

    assert!(matches!(
        service.deposit("alice", 0).await,
        Err(LedgerError::InvalidAmount(_))
    ));
    assert!(matches!(
        service.withdraw("alice", -500).await,
        Err(LedgerError::InvalidAmount(_))
    ));
    assert!(matches!(
        service.transfer("alice", "bob", 0).await,
        Err(LedgerError::InvalidAmount(_))
    ));

    assert_eq!(service.history("alice", None).await?.len(), 0);

    Ok(())
}

#[tokio::test]
async fn test_unknown_accounts_are_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    register(&service, "alice").await?;
    service.deposit("alice", 1000).await?;

    assert!(matches!(
        service.deposit("nobody", 1000).await,
        Err(LedgerError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.check_balance("nobody").await,
        Err(LedgerError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.history("nobody", None).await,
        Err(LedgerError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.transfer("alice", "nobody", 500).await,
        Err(LedgerError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.transfer("nobody", "alice", 500).await,
        Err(LedgerError::AccountNotFound(_))
    ));

    // The failed transfers must not have touched alice
    assert_eq!(service.check_balance("alice").await?, 1000);
    assert_eq!(service.history("alice", None).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_transfer_writes_both_linked_records() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create_funded_pair(&service, 10000).await?;

    let receipt = service.transfer("alice", "bob", 4000).await?;

    assert_eq!(receipt.outgoing.kind, TransactionKind::TransferOut);
    assert_eq!(receipt.outgoing.account_id, "alice");
    assert_eq!(receipt.incoming.kind, TransactionKind::TransferIn);
    assert_eq!(receipt.incoming.account_id, "bob");
    assert_eq!(receipt.outgoing.amount_cents, receipt.incoming.amount_cents);
    assert_eq!(receipt.outgoing.timestamp, receipt.incoming.timestamp);

    Ok(())
}

#[tokio::test]
async fn test_failed_transfer_writes_neither_record() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create_funded_pair(&service, 1000).await?;

    let result = service.transfer("alice", "bob", 5000).await;
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientFunds { .. })
    ));

    let alice_history = service.history("alice", None).await?;
    assert!(
        alice_history
            .iter()
            .all(|r| r.kind != TransactionKind::TransferOut)
    );
    assert_eq!(service.history("bob", None).await?.len(), 0);
    assert_eq!(service.check_balance("alice").await?, 1000);
    assert_eq!(service.check_balance("bob").await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_self_transfer_keeps_balance_but_logs_both_legs() -> Result<()> {
    let (service, _temp) = test_service().await?;
    register(&service, "alice").await?;
    service.deposit("alice", 5000).await?;

    let receipt = service.transfer("alice", "alice", 2000).await?;

    assert_eq!(service.check_balance("alice").await?, 5000);
    assert_eq!(receipt.outgoing.account_id, "alice");
    assert_eq!(receipt.incoming.account_id, "alice");
    assert_eq!(receipt.outgoing.timestamp, receipt.incoming.timestamp);

    let history = service.history("alice", None).await?;
    assert_eq!(history.len(), 3); // deposit + both transfer legs

    // The funds check still applies to a self-transfer
    assert!(matches!(
        service.transfer("alice", "alice", 99999).await,
        Err(LedgerError::InsufficientFunds { .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_history_is_reverse_chronological_without_gaps() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create_pair(&service).await?;

    service.deposit("alice", 10000).await?;
    service.withdraw("alice", 1000).await?;
    service.transfer("alice", "bob", 2000).await?;
    service.deposit("alice", 500).await?;

    let history = service.history("alice", None).await?;
    let kinds: Vec<_> = history.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Deposit,
            TransactionKind::TransferOut,
            TransactionKind::Withdrawal,
            TransactionKind::Deposit,
        ]
    );

    // Ids strictly decrease: no duplicates, and timestamps never go
    // forward as we walk back in time.
    for pair in history.windows(2) {
        assert!(pair[0].id > pair[1].id);
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }

    // Limit caps the result from the most recent end
    let limited = service.history("alice", Some(2)).await?;
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, history[0].id);

    Ok(())
}

#[tokio::test]
async fn test_balance_reconciles_with_history_after_any_sequence() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create_pair(&service).await?;

    service.deposit("alice", 12345).await?;
    service.withdraw("alice", 2345).await?;
    service.transfer("alice", "bob", 4000).await?;
    service.deposit("bob", 100).await?;
    service.transfer("bob", "alice", 1500).await?;
    let _ = service.withdraw("alice", 99999999).await; // rejected, no effect

    for id in ["alice", "bob"] {
        let balance = service.check_balance(id).await?;
        let history = service.history(id, None).await?;
        assert_eq!(
            balance,
            balance_from_records(id, &history),
            "stored balance for {id} must equal the signed sum of its records"
        );
        assert!(balance >= 0);
    }

    Ok(())
}
