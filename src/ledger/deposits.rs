//! 입금 기록
//!
//! 외부 확인 주체(블록체인 워처 등)가 정산 완료로 신고한 입금을
//! 기록하고 잔고에 반영합니다. pending/확인 대기 단계는 없습니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use log::info;

use crate::ledger::error::LedgerError;
use crate::ledger::model::{DepositRecord, NewTransaction, TransactionType};
use crate::ledger::users::{BalanceDirection, UserLedger};
use crate::store::{to_fields, DocumentStore, Query, SortDir};

const DEPOSITS: &str = "deposits";

/// 입금 기록 입력
#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub amount: f64,
    pub crypto: String,
    pub tx_hash: Option<String>,
    pub wallet_address: Option<String>,
}

/// 입금 기록기
pub struct DepositRecorder {
    store: Arc<dyn DocumentStore>,
    users: Arc<UserLedger>,
}

impl DepositRecorder {
    pub fn new(store: Arc<dyn DocumentStore>, users: Arc<UserLedger>) -> Self {
        Self { store, users }
    }

    /// 정산 완료된 입금 기록 + 잔고 반영 + 거래 기록
    pub async fn record(
        &self,
        user_id: &str,
        input: NewDeposit,
    ) -> Result<DepositRecord, LedgerError> {
        if input.crypto.trim().is_empty() {
            return Err(LedgerError::Validation(
                "amount와 crypto는 필수 입력입니다".to_string(),
            ));
        }
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(LedgerError::Validation(
                "유효하지 않은 금액입니다".to_string(),
            ));
        }

        // 사용자 확인을 먼저 해서 고아 입금 문서를 남기지 않음
        self.users.get_user(user_id).await?;

        let mut record = DepositRecord {
            id: String::new(),
            user_id: user_id.to_string(),
            amount: input.amount,
            crypto: input.crypto.clone(),
            tx_hash: input.tx_hash,
            wallet_address: input.wallet_address.clone(),
            status: "completed".to_string(),
            created_at: Utc::now(),
        };
        record.id = self.store.add(DEPOSITS, to_fields(&record)?).await?;

        self.users
            .update_balance(user_id, input.amount, BalanceDirection::Add)
            .await?;

        self.users
            .record_transaction(
                user_id,
                NewTransaction {
                    kind: TransactionType::Deposit,
                    amount: input.amount,
                    status: Some("completed".to_string()),
                    description: Some(format!("Deposit via {}", input.crypto)),
                    crypto: Some(input.crypto),
                    wallet_address: input.wallet_address,
                },
            )
            .await?;

        info!(
            "✅ 입금 기록 완료: {} ({} {})",
            record.id, record.amount, record.crypto
        );

        Ok(record)
    }

    /// 사용자 입금 내역 (최신순)
    pub async fn history(&self, user_id: &str) -> Result<Vec<DepositRecord>, LedgerError> {
        let docs = self
            .store
            .query(
                DEPOSITS,
                Query::new()
                    .where_eq("userId", user_id)
                    .order_by("createdAt", SortDir::Desc),
            )
            .await?;
        docs.iter()
            .map(|doc| doc.decode().map_err(LedgerError::from))
            .collect()
    }

    /// 암호화폐별 입금 주소 (운영 환경에서는 사용자별 발급)
    pub fn addresses() -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([
            ("ETH", "0xFF5885E5d7b9dA18485440AB73F16d5410627798"),
            ("BTC", "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"),
            ("USDT_ERC20", "0xFF5885E5d7b9dA18485440AB73F16d5410627798"),
            ("USDT_TRC20", "TYASr5UV6HEcXatwdFQfmLVUqQQQMUxHLS"),
        ])
    }
}
