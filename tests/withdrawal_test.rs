mod common;

use common::{admin, balance, dec, fund, register, setup};
use invest_ledger::domain::{
    Actor, DomainEvent, PaymentMethod, Role, TransactionStatus, TransactionType,
};
use invest_ledger::error::LedgerError;
use invest_ledger::ports::TransactionFilter;
use invest_ledger::use_cases::WithdrawalInput;
use invest_ledger::AppState;
use uuid::Uuid;

fn withdrawal(user_id: Uuid, amount: &str) -> WithdrawalInput {
    WithdrawalInput {
        user_id,
        amount: dec(amount),
        payment_method: PaymentMethod::BankTransfer,
        payment_details: Some(serde_json::json!({ "iban": "DE89370400440532013000" })),
        reference: None,
    }
}

async fn funded_user(state: &AppState, amount: &str) -> Uuid {
    let user = register(state, "Walt", None).await;
    fund(state, user.id, amount).await;
    user.id
}

#[tokio::test]
async fn test_below_minimum_is_rejected_without_trace() {
    let (state, _store) = setup();
    let user_id = funded_user(&state, "100").await;

    let err = state
        .withdrawals
        .execute(withdrawal(user_id, "9.99"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::BelowMinimum { .. }));
    assert_eq!(balance(&state, user_id).await, dec("100"));

    let withdrawals = state
        .ledger
        .list(&TransactionFilter::for_user(user_id).of_type(TransactionType::Withdrawal))
        .await
        .unwrap();
    assert!(withdrawals.is_empty());
}

#[tokio::test]
async fn test_request_debits_full_amount_and_records_fee() {
    let (state, _store) = setup();
    let user_id = funded_user(&state, "150").await;
    let mut events = state.events.subscribe();

    let output = state
        .withdrawals
        .execute(withdrawal(user_id, "100"))
        .await
        .unwrap();
    assert_eq!(output.fees, dec("2.00"));
    assert_eq!(output.net_amount, dec("98.00"));
    assert_eq!(output.balance, dec("50"));
    assert!(!output.replayed);
    assert_eq!(balance(&state, user_id).await, dec("50"));

    let tx = state.ledger.get(output.transaction_id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.payment_method, PaymentMethod::BankTransfer);
    assert_eq!(
        tx.metadata["payment_details"]["iban"],
        "DE89370400440532013000"
    );

    match events.recv().await.unwrap() {
        DomainEvent::WithdrawalRequested { amount, fees, .. } => {
            assert_eq!(amount, dec("100"));
            assert_eq!(fees, dec("2.00"));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_insufficient_balance_keeps_wallet() {
    let (state, _store) = setup();
    let user_id = funded_user(&state, "40").await;

    let err = state
        .withdrawals
        .execute(withdrawal(user_id, "50"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    assert_eq!(balance(&state, user_id).await, dec("40"));
}

#[tokio::test]
async fn test_third_request_of_the_day_is_refused() {
    let (state, _store) = setup();
    let user_id = funded_user(&state, "500").await;

    let first = state
        .withdrawals
        .execute(withdrawal(user_id, "20"))
        .await
        .unwrap();
    state
        .withdrawals
        .execute(withdrawal(user_id, "20"))
        .await
        .unwrap();

    // Settled requests still count toward the day.
    state
        .ledger
        .settle(first.transaction_id, TransactionStatus::Failed, &admin(), None)
        .await
        .unwrap();

    let err = state
        .withdrawals
        .execute(withdrawal(user_id, "20"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DailyLimitExceeded { limit: 2 }));
    assert_eq!(balance(&state, user_id).await, dec("480"));
}

#[tokio::test]
async fn test_failed_settlement_refunds_once() {
    let (state, _store) = setup();
    let user_id = funded_user(&state, "100").await;
    let output = state
        .withdrawals
        .execute(withdrawal(user_id, "60"))
        .await
        .unwrap();
    assert_eq!(balance(&state, user_id).await, dec("40"));

    let settled = state
        .ledger
        .settle(
            output.transaction_id,
            TransactionStatus::Failed,
            &admin(),
            Some("bank rejected".to_string()),
        )
        .await
        .unwrap();
    assert!(settled.applied);
    assert_eq!(settled.transaction.status, TransactionStatus::Failed);
    assert_eq!(settled.transaction.admin_notes.as_deref(), Some("bank rejected"));
    let refund = settled.refund.unwrap();
    assert_eq!(refund.tx_type, TransactionType::Refund);
    assert_eq!(refund.amount, dec("60"));
    assert_eq!(refund.reference, format!("RFD{}", output.reference));
    assert_eq!(balance(&state, user_id).await, dec("100"));

    let again = state
        .ledger
        .settle(output.transaction_id, TransactionStatus::Cancelled, &admin(), None)
        .await
        .unwrap();
    assert!(!again.applied);
    assert_eq!(again.transaction.status, TransactionStatus::Failed);
    assert_eq!(balance(&state, user_id).await, dec("100"));

    let refunds = state
        .ledger
        .list(&TransactionFilter::for_user(user_id).of_type(TransactionType::Refund))
        .await
        .unwrap();
    assert_eq!(refunds.len(), 1);
}

#[tokio::test]
async fn test_cancel_refunds_and_complete_does_not() {
    let (state, _store) = setup();
    let user_id = funded_user(&state, "100").await;

    let cancelled = state
        .withdrawals
        .execute(withdrawal(user_id, "30"))
        .await
        .unwrap();
    state
        .ledger
        .settle(cancelled.transaction_id, TransactionStatus::Cancelled, &admin(), None)
        .await
        .unwrap();
    assert_eq!(balance(&state, user_id).await, dec("100"));

    let paid = state
        .withdrawals
        .execute(withdrawal(user_id, "30"))
        .await
        .unwrap();
    let outcome = state
        .ledger
        .settle(paid.transaction_id, TransactionStatus::Completed, &admin(), None)
        .await
        .unwrap();
    assert!(outcome.refund.is_none());
    assert_eq!(balance(&state, user_id).await, dec("70"));
}

#[tokio::test]
async fn test_replayed_reference_debits_once() {
    let (state, _store) = setup();
    let user_id = funded_user(&state, "100").await;

    let mut input = withdrawal(user_id, "25");
    input.reference = Some("wd-2026-001".to_string());
    let first = state.withdrawals.execute(input).await.unwrap();

    let mut input = withdrawal(user_id, "25");
    input.reference = Some("wd-2026-001".to_string());
    let second = state.withdrawals.execute(input).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.transaction_id, second.transaction_id);
    assert_eq!(balance(&state, user_id).await, dec("75"));

    // A replay does not use up the daily allowance.
    state
        .withdrawals
        .execute(withdrawal(user_id, "25"))
        .await
        .unwrap();
    assert_eq!(balance(&state, user_id).await, dec("50"));
}

#[tokio::test]
async fn test_settle_requires_admin() {
    let (state, _store) = setup();
    let user_id = funded_user(&state, "100").await;
    let output = state
        .withdrawals
        .execute(withdrawal(user_id, "20"))
        .await
        .unwrap();

    let user = Actor::new(user_id, Role::User);
    let err = state
        .ledger
        .settle(output.transaction_id, TransactionStatus::Failed, &user, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
    assert_eq!(balance(&state, user_id).await, dec("80"));
}
