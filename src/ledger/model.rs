//! 원장 도메인 모델
//!
//! 문서 저장소에 기록되는 레코드 타입들. 필드명은 저장 문서의
//! camelCase 키와 일치합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 보유 자산 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub balance: f64,
    pub value: f64,
    pub allocation: f64,
    #[serde(default)]
    pub change_24h: f64,
}

/// 사용자 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub firebase_uid: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub total_deposits: f64,
    #[serde(default)]
    pub total_withdrawals: f64,
    #[serde(default)]
    pub total_trades: f64,
    #[serde(rename = "todayPnL", default)]
    pub today_pnl: f64,
    #[serde(default)]
    pub today_gain: f64,
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub reset_token: Option<String>,
    #[serde(default)]
    pub reset_token_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_provider() -> String {
    "email".to_string()
}

/// 신규 사용자 입력
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// bcrypt 해시. OAuth 사용자는 None
    pub password_hash: Option<String>,
    pub provider: String,
    pub firebase_uid: Option<String>,
    pub profile_picture: Option<String>,
    pub is_email_verified: bool,
}

/// 거래 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Trade,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Withdrawal => write!(f, "withdrawal"),
            TransactionType::Trade => write!(f, "trade"),
        }
    }
}

/// 거래 레코드 (생성 후 불변, append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub crypto: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 거래 기록 입력
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: TransactionType,
    pub amount: f64,
    /// 기본값 "completed"
    pub status: Option<String>,
    pub description: Option<String>,
    pub crypto: Option<String>,
    pub wallet_address: Option<String>,
}

/// 출금 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl WithdrawalStatus {
    /// 상태 문자열 파싱. 다섯 가지 상태 외에는 None
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(WithdrawalStatus::Pending),
            "processing" => Some(WithdrawalStatus::Processing),
            "completed" => Some(WithdrawalStatus::Completed),
            "failed" => Some(WithdrawalStatus::Failed),
            "cancelled" => Some(WithdrawalStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
            WithdrawalStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 출금 요청 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRecord {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub wallet_address: String,
    pub status: WithdrawalStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

/// 입금 레코드 (append-only, 생성 시점에 completed로 확정)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub crypto: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// 대시보드 집계
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub account_balance: f64,
    #[serde(rename = "todayPnL")]
    pub today_pnl: f64,
    pub today_gain: f64,
    /// accountBalance + todayPnL
    pub balance_report: f64,
    pub total_deposits: f64,
    pub total_withdrawals: f64,
    pub total_trades: f64,
    pub holdings: Vec<Holding>,
}

/// 문의 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdrawal_status_parse() {
        assert_eq!(
            WithdrawalStatus::parse("pending"),
            Some(WithdrawalStatus::Pending)
        );
        assert_eq!(
            WithdrawalStatus::parse("cancelled"),
            Some(WithdrawalStatus::Cancelled)
        );
        assert_eq!(WithdrawalStatus::parse("refunded"), None);
        assert_eq!(WithdrawalStatus::parse("PENDING"), None);
    }

    #[test]
    fn test_record_field_names() {
        let record = TransactionRecord {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            kind: TransactionType::Deposit,
            amount: 50.0,
            status: "completed".to_string(),
            description: String::new(),
            crypto: None,
            wallet_address: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["type"], "deposit");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_user_defaults_on_partial_document() {
        // 마이그레이션 전의 빈약한 문서도 기본값으로 읽혀야 함
        let user: UserRecord =
            serde_json::from_value(serde_json::json!({"email": "a@b.c", "name": "A"})).unwrap();
        assert_eq!(user.balance, 0.0);
        assert_eq!(user.provider, "email");
        assert!(user.holdings.is_empty());
        assert!(user.reset_token.is_none());
    }
}
