mod common;

use common::{add_plan, balance, dec, fund, register, setup};
use futures::future::join_all;
use invest_ledger::domain::{PaymentMethod, TransactionType};
use invest_ledger::error::LedgerError;
use invest_ledger::ports::TransactionFilter;
use invest_ledger::services::{CreateInvestment, NewTransaction};
use invest_ledger::use_cases::WithdrawalInput;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let (state, _store) = setup();
    let user = register(&state, "Race", None).await;
    fund(&state, user.id, "100").await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let ledger = state.ledger.clone();
            let user_id = user.id;
            tokio::spawn(async move {
                ledger
                    .post(NewTransaction::new(user_id, TransactionType::Fee, dec("10")))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(matches!(e, LedgerError::InsufficientBalance { .. })),
        }
    }
    assert_eq!(succeeded, 10);
    assert_eq!(balance(&state, user.id).await, dec("0"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_respect_daily_limit() {
    let (state, _store) = setup();
    let user = register(&state, "Burst", None).await;
    fund(&state, user.id, "1000").await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let withdrawals = state.withdrawals.clone();
            let user_id = user.id;
            tokio::spawn(async move {
                withdrawals
                    .execute(WithdrawalInput {
                        user_id,
                        amount: dec("50"),
                        payment_method: PaymentMethod::Crypto,
                        payment_details: None,
                        reference: None,
                    })
                    .await
            })
        })
        .collect();

    let results: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 2);
    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(result, LedgerError::DailyLimitExceeded { .. }));
    }
    assert_eq!(balance(&state, user.id).await, dec("900"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_reference_records_once() {
    let (state, _store) = setup();
    let user = register(&state, "Echo", None).await;
    fund(&state, user.id, "100").await;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let ledger = state.ledger.clone();
            let user_id = user.id;
            tokio::spawn(async move {
                ledger
                    .post(
                        NewTransaction::new(user_id, TransactionType::Fee, dec("5"))
                            .with_reference(Some("FEE-ONCE".to_string())),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        let tx = handle.await.unwrap().unwrap();
        assert_eq!(tx.reference, "FEE-ONCE");
    }
    assert_eq!(balance(&state, user.id).await, dec("95"));
    let fees = state
        .ledger
        .list(&TransactionFilter::for_user(user.id).of_type(TransactionType::Fee))
        .await
        .unwrap();
    assert_eq!(fees.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_pay_once() {
    let (state, store) = setup();
    let plan = add_plan(&store, "10", "10000", 30, "30");
    let referrer = register(&state, "Greedy", None).await;
    let investor = register(&state, "Friend", Some(referrer.id)).await;
    fund(&state, investor.id, "1000").await;
    state
        .investments
        .create(CreateInvestment {
            user_id: investor.id,
            plan_id: plan.id,
            amount: dec("1000"),
            notes: None,
            reference: None,
        })
        .await
        .unwrap();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let commissions = state.commissions.clone();
            let user_id = referrer.id;
            tokio::spawn(async move { commissions.claim(user_id).await })
        })
        .collect();

    let mut paid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                paid += 1;
                assert_eq!(outcome.amount, dec("70"));
            }
            Err(e) => assert!(matches!(e, LedgerError::NothingToClaim)),
        }
    }
    assert_eq!(paid, 1);
    assert_eq!(balance(&state, referrer.id).await, dec("70"));
}
