//! 원장 통합 테스트
//!
//! 인메모리 저장소 위에서 입금 → 출금 → 대시보드 흐름 전체를 검증합니다.

use std::sync::Arc;

use coinedge::ledger::deposits::NewDeposit;
use coinedge::ledger::model::{NewUser, TransactionType, WithdrawalStatus};
use coinedge::ledger::{
    BalanceDirection, DepositRecorder, LedgerError, UserLedger, WithdrawalProcessor,
};
use coinedge::store::MemoryDocumentStore;

const WALLET: &str = "0xFF5885E5d7b9dA18485440AB73F16d5410627798";

struct TestApp {
    users: Arc<UserLedger>,
    withdrawals: WithdrawalProcessor,
    deposits: DepositRecorder,
}

async fn setup() -> (TestApp, String) {
    let store: Arc<MemoryDocumentStore> = Arc::new(MemoryDocumentStore::new());
    let users = Arc::new(UserLedger::new(store.clone()));
    let app = TestApp {
        withdrawals: WithdrawalProcessor::new(store.clone(), users.clone()),
        deposits: DepositRecorder::new(store, users.clone()),
        users,
    };
    let user = app
        .users
        .create_user(NewUser {
            name: "앨리스".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: Some("$2b$12$hash".to_string()),
            provider: "email".to_string(),
            firebase_uid: None,
            profile_picture: None,
            is_email_verified: false,
        })
        .await
        .unwrap();
    (app, user.id)
}

/// 시나리오: 잔고 100 → 출금 40 (pending, 잔고 60) → failed (잔고 100,
/// transactionId 없음) → failed 반복 (잔고 100 유지, 중복 환불 없음)
#[tokio::test]
async fn test_withdrawal_failure_scenario() {
    let (app, user_id) = setup().await;
    app.users
        .update_balance(&user_id, 100.0, BalanceDirection::Add)
        .await
        .unwrap();

    let withdrawal = app.withdrawals.create(&user_id, 40.0, WALLET).await.unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(app.users.get_user(&user_id).await.unwrap().balance, 60.0);

    let updated = app
        .withdrawals
        .update_status(&withdrawal.id, "failed", None)
        .await
        .unwrap();
    assert_eq!(updated.status, WithdrawalStatus::Failed);
    assert!(updated.transaction_id.is_none());
    assert_eq!(app.users.get_user(&user_id).await.unwrap().balance, 100.0);

    // 반복 호출은 잔고를 다시 올리지 않음
    app.withdrawals
        .update_status(&withdrawal.id, "failed", None)
        .await
        .unwrap();
    assert_eq!(app.users.get_user(&user_id).await.unwrap().balance, 100.0);
}

/// 시나리오: 잔고 0에 50 USDT 입금 → 잔고 50, totalDeposits 50,
/// deposit 거래 1건
#[tokio::test]
async fn test_deposit_scenario() {
    let (app, user_id) = setup().await;

    app.deposits
        .record(
            &user_id,
            NewDeposit {
                amount: 50.0,
                crypto: "USDT".to_string(),
                tx_hash: None,
                wallet_address: None,
            },
        )
        .await
        .unwrap();

    let user = app.users.get_user(&user_id).await.unwrap();
    assert_eq!(user.balance, 50.0);
    assert_eq!(user.total_deposits, 50.0);

    let transactions = app.users.transactions(&user_id, None).await.unwrap();
    let deposits: Vec<_> = transactions
        .iter()
        .filter(|t| t.kind == TransactionType::Deposit)
        .collect();
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].amount, 50.0);
}

/// InsufficientFunds는 정확히 a > 잔고일 때만 발생
#[tokio::test]
async fn test_insufficient_funds_boundary() {
    let (app, user_id) = setup().await;
    app.users
        .update_balance(&user_id, 75.0, BalanceDirection::Add)
        .await
        .unwrap();

    // 잔고 초과 차감은 거부, 잔고는 그대로
    let err = app
        .users
        .update_balance(&user_id, 75.5, BalanceDirection::Subtract)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds));
    assert_eq!(app.users.get_user(&user_id).await.unwrap().balance, 75.0);

    // 잔고와 같은 금액은 허용 (0까지)
    let balance = app
        .users
        .update_balance(&user_id, 75.0, BalanceDirection::Subtract)
        .await
        .unwrap();
    assert_eq!(balance, 0.0);
}

/// 입금과 출금 정산을 거친 뒤에도 대시보드 불변식 유지
#[tokio::test]
async fn test_dashboard_after_full_flow() {
    let (app, user_id) = setup().await;

    app.deposits
        .record(
            &user_id,
            NewDeposit {
                amount: 200.0,
                crypto: "BTC".to_string(),
                tx_hash: Some("0xaaa".to_string()),
                wallet_address: None,
            },
        )
        .await
        .unwrap();

    let withdrawal = app.withdrawals.create(&user_id, 80.0, WALLET).await.unwrap();
    app.withdrawals
        .update_status(&withdrawal.id, "processing", None)
        .await
        .unwrap();
    app.withdrawals
        .update_status(&withdrawal.id, "completed", Some("0xbbb".to_string()))
        .await
        .unwrap();

    app.users
        .update_today_report(&user_id, 15.0, 3.1)
        .await
        .unwrap();

    let data = app.users.dashboard_data(&user_id).await.unwrap();
    assert_eq!(data.account_balance, 120.0);
    assert_eq!(data.total_deposits, 200.0);
    assert_eq!(data.total_withdrawals, 80.0);
    assert_eq!(data.balance_report, data.account_balance + data.today_pnl);

    // 정산된 출금은 거래 내역에도 남음
    let transactions = app.users.transactions(&user_id, None).await.unwrap();
    assert!(transactions
        .iter()
        .any(|t| t.kind == TransactionType::Withdrawal && t.amount == 80.0));

    let history = app.withdrawals.history(&user_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, WithdrawalStatus::Completed);
    assert_eq!(history[0].transaction_id.as_deref(), Some("0xbbb"));
}

/// cancelled 전이도 pending에서는 환불, 그 외에는 환불 없음
#[tokio::test]
async fn test_cancelled_refund_rules() {
    let (app, user_id) = setup().await;
    app.users
        .update_balance(&user_id, 100.0, BalanceDirection::Add)
        .await
        .unwrap();

    // pending → cancelled: 환불
    let first = app.withdrawals.create(&user_id, 30.0, WALLET).await.unwrap();
    app.withdrawals
        .update_status(&first.id, "cancelled", None)
        .await
        .unwrap();
    assert_eq!(app.users.get_user(&user_id).await.unwrap().balance, 100.0);

    // pending → processing → failed: 환불 없음
    let second = app.withdrawals.create(&user_id, 30.0, WALLET).await.unwrap();
    app.withdrawals
        .update_status(&second.id, "processing", None)
        .await
        .unwrap();
    app.withdrawals
        .update_status(&second.id, "failed", None)
        .await
        .unwrap();
    assert_eq!(app.users.get_user(&user_id).await.unwrap().balance, 70.0);
}

/// 거래 내역은 최신순으로, limit을 준수
#[tokio::test]
async fn test_transaction_history_ordering() {
    let (app, user_id) = setup().await;

    for amount in [10.0, 20.0, 30.0] {
        app.deposits
            .record(
                &user_id,
                NewDeposit {
                    amount,
                    crypto: "USDT".to_string(),
                    tx_hash: None,
                    wallet_address: None,
                },
            )
            .await
            .unwrap();
    }

    let recent = app.users.transactions(&user_id, Some(2)).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].amount, 30.0);
    assert_eq!(recent[1].amount, 20.0);
}
