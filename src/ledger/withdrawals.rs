//! 출금 상태 머신
//!
//! 출금 요청 생성 시 잔고를 즉시 차감하고, pending에서 failed/cancelled로
//! 전이될 때 정확히 한 번 환불합니다. 환불 중복을 막기 위해 상태 전이는
//! `status == "pending"` guard의 조건부 쓰기로 수행합니다.

use std::sync::Arc;

use chrono::Utc;
use log::info;
use serde_json::json;

use crate::ledger::error::LedgerError;
use crate::ledger::model::{
    NewTransaction, TransactionType, WithdrawalRecord, WithdrawalStatus,
};
use crate::ledger::users::{BalanceDirection, UserLedger};
use crate::store::{to_fields, DocumentStore, Fields, Query, SortDir};

const WITHDRAWALS: &str = "withdrawals";

/// ERC20 주소 길이 ("0x" 포함 42자)
const WALLET_ADDRESS_LEN: usize = 42;

/// 출금 처리기
pub struct WithdrawalProcessor {
    store: Arc<dyn DocumentStore>,
    users: Arc<UserLedger>,
}

impl WithdrawalProcessor {
    pub fn new(store: Arc<dyn DocumentStore>, users: Arc<UserLedger>) -> Self {
        Self { store, users }
    }

    /// 출금 요청 생성
    ///
    /// 요청 시점에 잔고를 차감합니다. 잔고가 부족하면 아무것도 기록하지
    /// 않고 InsufficientFunds를 반환합니다.
    pub async fn create(
        &self,
        user_id: &str,
        amount: f64,
        wallet_address: &str,
    ) -> Result<WithdrawalRecord, LedgerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::Validation(
                "금액은 0보다 큰 숫자여야 합니다".to_string(),
            ));
        }
        if !wallet_address.starts_with("0x") || wallet_address.len() != WALLET_ADDRESS_LEN {
            return Err(LedgerError::Validation(
                "지갑 주소 형식이 올바르지 않습니다 (ERC20 주소 필요)".to_string(),
            ));
        }

        // 잔고 차감이 먼저. 실패하면 출금 문서를 남기지 않음
        self.users
            .update_balance(user_id, amount, BalanceDirection::Subtract)
            .await?;

        let now = Utc::now();
        let mut record = WithdrawalRecord {
            id: String::new(),
            user_id: user_id.to_string(),
            amount,
            wallet_address: wallet_address.to_string(),
            status: WithdrawalStatus::Pending,
            transaction_id: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
        };
        record.id = self.store.add(WITHDRAWALS, to_fields(&record)?).await?;

        info!("✅ 출금 요청 생성: {} ({} USDT)", record.id, amount);

        Ok(record)
    }

    /// 출금 단건 조회
    pub async fn get(&self, withdrawal_id: &str) -> Result<WithdrawalRecord, LedgerError> {
        self.store
            .get(WITHDRAWALS, withdrawal_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound("출금 요청".to_string()))?
            .decode()
            .map_err(LedgerError::from)
    }

    /// 사용자 출금 내역 (최신순)
    pub async fn history(&self, user_id: &str) -> Result<Vec<WithdrawalRecord>, LedgerError> {
        let docs = self
            .store
            .query(
                WITHDRAWALS,
                Query::new()
                    .where_eq("userId", user_id)
                    .order_by("createdAt", SortDir::Desc),
            )
            .await?;
        docs.iter()
            .map(|doc| doc.decode().map_err(LedgerError::from))
            .collect()
    }

    /// 출금 상태 전이 (관리자 동작)
    ///
    /// - 다섯 가지 상태 외의 입력은 InvalidStatus
    /// - completed / failed 진입 시 processedAt 기록
    /// - pending → failed/cancelled 전이에서만 잔고 환불 (정확히 한 번)
    /// - completed 진입 시 출금 거래를 기록 (정산 시점 집계)
    pub async fn update_status(
        &self,
        withdrawal_id: &str,
        new_status: &str,
        transaction_id: Option<String>,
    ) -> Result<WithdrawalRecord, LedgerError> {
        let status = WithdrawalStatus::parse(new_status)
            .ok_or_else(|| LedgerError::InvalidStatus(new_status.to_string()))?;
        let current = self.get(withdrawal_id).await?;

        let now = Utc::now();
        let mut fields = Fields::new();
        fields.insert("status".to_string(), json!(status));
        fields.insert("updatedAt".to_string(), json!(now));
        if let Some(tx) = &transaction_id {
            fields.insert("transactionId".to_string(), json!(tx));
        }
        if matches!(status, WithdrawalStatus::Completed | WithdrawalStatus::Failed) {
            fields.insert("processedAt".to_string(), json!(now));
        }

        match status {
            WithdrawalStatus::Failed | WithdrawalStatus::Cancelled => {
                // pending일 때만 환불이 일어나도록 전이를 CAS로 수행
                let swapped = self
                    .store
                    .update_if(
                        WITHDRAWALS,
                        withdrawal_id,
                        "status",
                        &json!("pending"),
                        fields.clone(),
                    )
                    .await?;
                if swapped {
                    self.users
                        .update_balance(&current.user_id, current.amount, BalanceDirection::Add)
                        .await?;
                    info!(
                        "출금 {} {} 처리, 잔고 환불: {}",
                        withdrawal_id, status, current.amount
                    );
                } else {
                    self.store.update(WITHDRAWALS, withdrawal_id, fields).await?;
                }
            }
            WithdrawalStatus::Completed => {
                self.store.update(WITHDRAWALS, withdrawal_id, fields).await?;
                if current.status != WithdrawalStatus::Completed {
                    self.users
                        .record_transaction(
                            &current.user_id,
                            NewTransaction {
                                kind: TransactionType::Withdrawal,
                                amount: current.amount,
                                status: Some("completed".to_string()),
                                description: Some(format!(
                                    "Withdrawal to {}",
                                    current.wallet_address
                                )),
                                crypto: None,
                                wallet_address: Some(current.wallet_address.clone()),
                            },
                        )
                        .await?;
                }
            }
            _ => {
                self.store.update(WITHDRAWALS, withdrawal_id, fields).await?;
            }
        }

        info!("✅ 출금 상태 변경: {} → {}", withdrawal_id, status);

        self.get(withdrawal_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::model::NewUser;
    use crate::store::MemoryDocumentStore;

    async fn setup() -> (Arc<UserLedger>, WithdrawalProcessor, String) {
        let store: Arc<MemoryDocumentStore> = Arc::new(MemoryDocumentStore::new());
        let users = Arc::new(UserLedger::new(store.clone()));
        let processor = WithdrawalProcessor::new(store, users.clone());
        let user = users
            .create_user(NewUser {
                name: "테스트".to_string(),
                email: "w@b.c".to_string(),
                password_hash: None,
                provider: "email".to_string(),
                firebase_uid: None,
                profile_picture: None,
                is_email_verified: false,
            })
            .await
            .unwrap();
        users
            .update_balance(&user.id, 100.0, BalanceDirection::Add)
            .await
            .unwrap();
        (users, processor, user.id)
    }

    const WALLET: &str = "0xFF5885E5d7b9dA18485440AB73F16d5410627798";

    #[tokio::test]
    async fn test_create_debits_balance() {
        let (users, processor, user_id) = setup().await;

        let withdrawal = processor.create(&user_id, 40.0, WALLET).await.unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
        assert!(withdrawal.transaction_id.is_none());
        assert!(withdrawal.processed_at.is_none());

        let balance = users.get_user(&user_id).await.unwrap().balance;
        assert_eq!(balance, 60.0);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (users, processor, user_id) = setup().await;

        assert!(matches!(
            processor.create(&user_id, 0.0, WALLET).await.unwrap_err(),
            LedgerError::Validation(_)
        ));
        assert!(matches!(
            processor.create(&user_id, 10.0, "잘못된주소").await.unwrap_err(),
            LedgerError::Validation(_)
        ));
        assert!(matches!(
            processor.create(&user_id, 500.0, WALLET).await.unwrap_err(),
            LedgerError::InsufficientFunds
        ));

        // 실패한 생성은 잔고를 건드리지 않음
        let balance = users.get_user(&user_id).await.unwrap().balance;
        assert_eq!(balance, 100.0);
        assert!(processor.history(&user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refunds_exactly_once() {
        let (users, processor, user_id) = setup().await;
        let withdrawal = processor.create(&user_id, 40.0, WALLET).await.unwrap();
        assert_eq!(users.get_user(&user_id).await.unwrap().balance, 60.0);

        // failed 전이 → 환불
        let updated = processor
            .update_status(&withdrawal.id, "failed", None)
            .await
            .unwrap();
        assert_eq!(updated.status, WithdrawalStatus::Failed);
        assert!(updated.transaction_id.is_none());
        assert!(updated.processed_at.is_some());
        assert_eq!(users.get_user(&user_id).await.unwrap().balance, 100.0);

        // 같은 전이를 반복해도 두 번째 환불은 없음
        processor
            .update_status(&withdrawal.id, "failed", None)
            .await
            .unwrap();
        assert_eq!(users.get_user(&user_id).await.unwrap().balance, 100.0);
    }

    #[tokio::test]
    async fn test_cancel_after_processing_does_not_refund() {
        let (users, processor, user_id) = setup().await;
        let withdrawal = processor.create(&user_id, 40.0, WALLET).await.unwrap();

        processor
            .update_status(&withdrawal.id, "processing", None)
            .await
            .unwrap();
        processor
            .update_status(&withdrawal.id, "cancelled", None)
            .await
            .unwrap();

        // 환불은 pending에서의 전이에만 적용
        assert_eq!(users.get_user(&user_id).await.unwrap().balance, 60.0);
    }

    #[tokio::test]
    async fn test_completed_records_withdrawal_transaction() {
        let (users, processor, user_id) = setup().await;
        let withdrawal = processor.create(&user_id, 40.0, WALLET).await.unwrap();

        let updated = processor
            .update_status(&withdrawal.id, "completed", Some("0xabc".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.status, WithdrawalStatus::Completed);
        assert_eq!(updated.transaction_id.as_deref(), Some("0xabc"));
        assert!(updated.processed_at.is_some());

        let user = users.get_user(&user_id).await.unwrap();
        assert_eq!(user.balance, 60.0);
        assert_eq!(user.total_withdrawals, 40.0);

        let transactions = users.transactions(&user_id, None).await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionType::Withdrawal);
        assert_eq!(transactions[0].amount, 40.0);

        // completed 반복 호출은 거래를 중복 기록하지 않음
        processor
            .update_status(&withdrawal.id, "completed", None)
            .await
            .unwrap();
        let user = users.get_user(&user_id).await.unwrap();
        assert_eq!(user.total_withdrawals, 40.0);
    }

    #[tokio::test]
    async fn test_invalid_status_and_unknown_id() {
        let (_, processor, user_id) = setup().await;
        let withdrawal = processor.create(&user_id, 10.0, WALLET).await.unwrap();

        let err = processor
            .update_status(&withdrawal.id, "refunded", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStatus(_)));

        let err = processor
            .update_status("없는출금", "completed", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
