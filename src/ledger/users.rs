//! 사용자 원장
//!
//! 잔고 변경, 거래 기록, 대시보드 집계와 사용자 문서 관리를 담당합니다.
//! 잔고 쓰기는 조건부 업데이트(CAS) 재시도 루프로 수행되어 동시 요청에서도
//! 갱신 유실이 발생하지 않습니다. 누적 카운터는 저장소의 원자적 증가를
//! 사용합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::json;

use crate::ledger::error::LedgerError;
use crate::ledger::model::{
    ContactRecord, DashboardData, Holding, NewTransaction, NewUser, TransactionRecord,
    TransactionType, UserRecord,
};
use crate::store::{to_fields, DocumentStore, Fields, Query, SortDir};

pub(crate) const USERS: &str = "users";
const TRANSACTIONS: &str = "transactions";
const CONTACTS: &str = "contacts";

/// 잔고 CAS 재시도 한도
const BALANCE_CAS_RETRIES: u32 = 5;

/// 거래 내역 조회 기본 건수
const DEFAULT_TRANSACTION_LIMIT: i64 = 50;

/// 잔고 변경 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceDirection {
    Add,
    Subtract,
}

/// 사용자 원장
pub struct UserLedger {
    store: Arc<dyn DocumentStore>,
}

impl UserLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 사용자 문서의 기본 필드 집합
    ///
    /// 누락 필드 보정(ensure_user_fields)에도 쓰이므로 null 기본값
    /// (profilePicture, firebaseUid, resetToken 등)은 포함하지 않습니다.
    /// merge-patch에서 null은 제거를 의미하기 때문에 "없음 == null"로
    /// 취급합니다.
    pub fn default_fields() -> Fields {
        let mut fields = Fields::new();
        fields.insert("balance".to_string(), json!(0));
        fields.insert("totalDeposits".to_string(), json!(0));
        fields.insert("totalWithdrawals".to_string(), json!(0));
        fields.insert("totalTrades".to_string(), json!(0));
        fields.insert("todayPnL".to_string(), json!(0));
        fields.insert("todayGain".to_string(), json!(0));
        fields.insert("holdings".to_string(), json!([]));
        fields.insert("isEmailVerified".to_string(), json!(false));
        fields.insert("provider".to_string(), json!("email"));
        fields
    }

    // ============ 사용자 관리 ============

    /// 신규 사용자 생성. 이메일 중복이면 Duplicate
    pub async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, LedgerError> {
        let email = new_user.email.trim().to_lowercase();
        if self.get_user_by_email(&email).await?.is_some() {
            return Err(LedgerError::Duplicate);
        }

        let now = Utc::now();
        let mut fields = Self::default_fields();
        fields.insert("email".to_string(), json!(email));
        fields.insert("name".to_string(), json!(new_user.name));
        fields.insert("provider".to_string(), json!(new_user.provider));
        fields.insert(
            "isEmailVerified".to_string(),
            json!(new_user.is_email_verified),
        );
        if let Some(hash) = &new_user.password_hash {
            fields.insert("password".to_string(), json!(hash));
        }
        if let Some(uid) = &new_user.firebase_uid {
            fields.insert("firebaseUid".to_string(), json!(uid));
        }
        if let Some(picture) = &new_user.profile_picture {
            fields.insert("profilePicture".to_string(), json!(picture));
        }
        fields.insert("createdAt".to_string(), json!(now));
        fields.insert("updatedAt".to_string(), json!(now));

        let id = self.store.add(USERS, fields).await?;
        info!("✅ 사용자 생성 완료: {} ({})", id, email);

        self.get_user(&id).await
    }

    /// id로 사용자 조회. 없으면 NotFound
    pub async fn get_user(&self, user_id: &str) -> Result<UserRecord, LedgerError> {
        self.find_user(user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound("사용자".to_string()))
    }

    /// id로 사용자 조회 (Option 반환)
    pub async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, LedgerError> {
        match self.store.get(USERS, user_id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// 이메일(자연 키)로 사용자 조회
    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, LedgerError> {
        let normalized = email.trim().to_lowercase();
        let docs = self
            .store
            .query(USERS, Query::new().where_eq("email", normalized).limit(1))
            .await?;
        match docs.first() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// OAuth uid로 사용자 조회
    pub async fn get_user_by_firebase_uid(
        &self,
        firebase_uid: &str,
    ) -> Result<Option<UserRecord>, LedgerError> {
        let docs = self
            .store
            .query(
                USERS,
                Query::new().where_eq("firebaseUid", firebase_uid).limit(1),
            )
            .await?;
        match docs.first() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// 전체 사용자 id 목록 (마이그레이션용)
    pub async fn all_user_ids(&self) -> Result<Vec<String>, LedgerError> {
        let docs = self.store.query(USERS, Query::new()).await?;
        Ok(docs.into_iter().map(|doc| doc.id).collect())
    }

    /// 누락 필드를 기본값으로 보정. 보정한 필드명 목록 반환
    ///
    /// 모든 필드가 이미 있으면 아무 쓰기도 하지 않습니다 (멱등).
    pub async fn ensure_user_fields(&self, user_id: &str) -> Result<Vec<String>, LedgerError> {
        let doc = self
            .store
            .get(USERS, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound("사용자".to_string()))?;
        let data = doc
            .data
            .as_object()
            .cloned()
            .unwrap_or_default();

        let mut updates = Fields::new();
        for (key, default) in Self::default_fields() {
            if !data.contains_key(&key) {
                updates.insert(key, default);
            }
        }

        let updated: Vec<String> = updates.keys().cloned().collect();
        if !updates.is_empty() {
            updates.insert("updatedAt".to_string(), json!(Utc::now()));
            self.store.update(USERS, user_id, updates).await?;
            info!("누락 필드 보정: {} {:?}", user_id, updated);
        }

        Ok(updated)
    }

    // ============ 잔고 & 거래 ============

    /// 잔고 변경. 차감으로 잔고가 음수가 되면 InsufficientFunds
    ///
    /// 읽은 잔고를 guard로 하는 조건부 쓰기를 재시도하므로 동시 호출이
    /// 서로의 갱신을 덮어쓰지 않습니다.
    pub async fn update_balance(
        &self,
        user_id: &str,
        amount: f64,
        direction: BalanceDirection,
    ) -> Result<f64, LedgerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::Validation(
                "금액은 0보다 커야 합니다".to_string(),
            ));
        }

        for attempt in 1..=BALANCE_CAS_RETRIES {
            let user = self.get_user(user_id).await?;
            let current = user.balance;
            let new_balance = match direction {
                BalanceDirection::Add => current + amount,
                BalanceDirection::Subtract => current - amount,
            };

            if new_balance < 0.0 {
                return Err(LedgerError::InsufficientFunds);
            }

            let mut fields = Fields::new();
            fields.insert("balance".to_string(), json!(new_balance));
            fields.insert("updatedAt".to_string(), json!(Utc::now()));

            let swapped = self
                .store
                .update_if(USERS, user_id, "balance", &json!(current), fields)
                .await?;
            if swapped {
                debug!("잔고 변경: {} {} → {}", user_id, current, new_balance);
                return Ok(new_balance);
            }

            warn!(
                "잔고 CAS 충돌, 재시도 {}/{}: {}",
                attempt, BALANCE_CAS_RETRIES, user_id
            );
        }

        Err(LedgerError::Conflict)
    }

    /// 거래 기록 추가 + 누적 카운터 갱신
    ///
    /// 거래 문서는 append-only이며 카운터(totalDeposits / totalWithdrawals /
    /// totalTrades)는 원자적 증가로 갱신합니다.
    pub async fn record_transaction(
        &self,
        user_id: &str,
        input: NewTransaction,
    ) -> Result<TransactionRecord, LedgerError> {
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(LedgerError::Validation(
                "금액은 0보다 커야 합니다".to_string(),
            ));
        }
        // 사용자 존재 확인을 먼저 해서 고아 거래 문서를 남기지 않음
        self.get_user(user_id).await?;

        let mut record = TransactionRecord {
            id: String::new(),
            user_id: user_id.to_string(),
            kind: input.kind,
            amount: input.amount,
            status: input.status.unwrap_or_else(|| "completed".to_string()),
            description: input.description.unwrap_or_default(),
            crypto: input.crypto,
            wallet_address: input.wallet_address,
            created_at: Utc::now(),
        };

        record.id = self.store.add(TRANSACTIONS, to_fields(&record)?).await?;

        match input.kind {
            TransactionType::Deposit => {
                self.store
                    .increment(USERS, user_id, "totalDeposits", input.amount)
                    .await?;
            }
            TransactionType::Withdrawal => {
                self.store
                    .increment(USERS, user_id, "totalWithdrawals", input.amount)
                    .await?;
            }
            TransactionType::Trade => {
                self.store.increment(USERS, user_id, "totalTrades", 1.0).await?;
            }
        }

        let mut touch = Fields::new();
        touch.insert("updatedAt".to_string(), json!(Utc::now()));
        self.store.update(USERS, user_id, touch).await?;

        debug!(
            "거래 기록: {} {} {} ({})",
            user_id, record.kind, record.amount, record.id
        );

        Ok(record)
    }

    /// 사용자 거래 내역 (최신순)
    pub async fn transactions(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let docs = self
            .store
            .query(
                TRANSACTIONS,
                Query::new()
                    .where_eq("userId", user_id)
                    .order_by("createdAt", SortDir::Desc)
                    .limit(limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT)),
            )
            .await?;
        docs.iter()
            .map(|doc| doc.decode().map_err(LedgerError::from))
            .collect()
    }

    // ============ 대시보드 ============

    /// 대시보드 집계. balanceReport = accountBalance + todayPnL
    pub async fn dashboard_data(&self, user_id: &str) -> Result<DashboardData, LedgerError> {
        let user = self.get_user(user_id).await?;
        Ok(DashboardData {
            account_balance: user.balance,
            today_pnl: user.today_pnl,
            today_gain: user.today_gain,
            balance_report: user.balance + user.today_pnl,
            total_deposits: user.total_deposits,
            total_withdrawals: user.total_withdrawals,
            total_trades: user.total_trades,
            holdings: user.holdings,
        })
    }

    /// 일일 손익 스냅샷 갱신 (덮어쓰기)
    pub async fn update_today_report(
        &self,
        user_id: &str,
        pnl: f64,
        gain: f64,
    ) -> Result<(), LedgerError> {
        let mut fields = Fields::new();
        fields.insert("todayPnL".to_string(), json!(pnl));
        fields.insert("todayGain".to_string(), json!(gain));
        fields.insert("updatedAt".to_string(), json!(Utc::now()));
        self.update_user(user_id, fields).await?;
        info!("✅ 일일 리포트 갱신: {} PnL={} Gain={}%", user_id, pnl, gain);
        Ok(())
    }

    /// 보유 자산 목록 갱신
    pub async fn update_holdings(
        &self,
        user_id: &str,
        holdings: Vec<Holding>,
    ) -> Result<(), LedgerError> {
        let count = holdings.len();
        let mut fields = Fields::new();
        fields.insert("holdings".to_string(), json!(holdings));
        fields.insert("updatedAt".to_string(), json!(Utc::now()));
        self.update_user(user_id, fields).await?;
        info!("✅ 보유 자산 갱신: {} ({}종목)", user_id, count);
        Ok(())
    }

    // ============ 비밀번호 / 인증 ============

    /// 비밀번호 재설정 토큰 저장
    pub async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut fields = Fields::new();
        fields.insert("resetToken".to_string(), json!(token));
        fields.insert("resetTokenExpiry".to_string(), json!(expiry));
        fields.insert("updatedAt".to_string(), json!(Utc::now()));
        self.update_user(user_id, fields).await
    }

    /// 재설정 토큰으로 사용자 조회
    pub async fn get_user_by_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<UserRecord>, LedgerError> {
        let docs = self
            .store
            .query(USERS, Query::new().where_eq("resetToken", token).limit(1))
            .await?;
        match docs.first() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// 비밀번호 변경 + 재설정 토큰 제거
    pub async fn update_password(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), LedgerError> {
        let mut fields = Fields::new();
        fields.insert("password".to_string(), json!(password_hash));
        fields.insert("resetToken".to_string(), json!(null));
        fields.insert("resetTokenExpiry".to_string(), json!(null));
        fields.insert("updatedAt".to_string(), json!(Utc::now()));
        self.update_user(user_id, fields).await
    }

    /// OAuth uid 연결 (google 제공자로 전환)
    pub async fn link_firebase_uid(
        &self,
        user_id: &str,
        firebase_uid: &str,
    ) -> Result<(), LedgerError> {
        let mut fields = Fields::new();
        fields.insert("firebaseUid".to_string(), json!(firebase_uid));
        fields.insert("provider".to_string(), json!("google"));
        fields.insert("isEmailVerified".to_string(), json!(true));
        fields.insert("updatedAt".to_string(), json!(Utc::now()));
        self.update_user(user_id, fields).await
    }

    // ============ 문의 ============

    /// 문의 접수
    pub async fn record_contact(
        &self,
        name: &str,
        email: &str,
        message: &str,
    ) -> Result<ContactRecord, LedgerError> {
        if name.trim().is_empty() || email.trim().is_empty() || message.trim().is_empty() {
            return Err(LedgerError::Validation(
                "name, email, message는 필수 입력입니다".to_string(),
            ));
        }

        let mut record = ContactRecord {
            id: String::new(),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            message: message.trim().to_string(),
            created_at: Utc::now(),
        };
        record.id = self.store.add(CONTACTS, to_fields(&record)?).await?;
        Ok(record)
    }

    /// 존재 확인 후 부분 업데이트
    async fn update_user(&self, user_id: &str, fields: Fields) -> Result<(), LedgerError> {
        match self.store.update(USERS, user_id, fields).await {
            Ok(()) => Ok(()),
            Err(crate::store::StoreError::DocumentNotFound { .. }) => {
                Err(LedgerError::NotFound("사용자".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
