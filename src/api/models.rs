//! API 요청/응답 모델
//!
//! 모든 응답은 {success, data|error} 봉투 형식을 따릅니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ledger::model::{
    DashboardData, DepositRecord, Holding, TransactionRecord, WithdrawalRecord,
};
use crate::market::MarketQuote;

/// 공통 오류 응답
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

// ============ 인증 ============

/// 회원가입 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// 로그인 요청
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// 토큰 유효성 확인 요청
#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: Option<String>,
}

/// Google 로그인 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthRequest {
    pub id_token: Option<String>,
}

/// 비밀번호 찾기 요청
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// 비밀번호 재설정 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub token: Option<String>,
}

/// 인증 성공 데이터 (로그인/구글 로그인)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub token: String,
    pub expires_in: String,
}

/// 인증 응답
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub data: AuthData,
}

/// 가입된 사용자 요약
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// 회원가입 응답
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub data: RegisteredUser,
}

/// 토큰 유효성 응답
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<crate::auth::Claims>,
}

/// 단순 메시지 응답
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// ============ 대시보드 ============

/// 대시보드 응답
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub data: DashboardData,
}

/// 프로필 응답 (민감 필드 제거 후 원본 문서)
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub data: Value,
}

/// 거래 내역 질의 파라미터
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<i64>,
}

/// 거래 내역 응답
#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub success: bool,
    pub data: Vec<TransactionRecord>,
    pub count: usize,
}

/// 일일 리포트 갱신 요청
#[derive(Debug, Deserialize)]
pub struct TodayReportRequest {
    pub pnl: Option<f64>,
    pub gain: Option<f64>,
}

/// 보유 자산 갱신 요청
#[derive(Debug, Deserialize)]
pub struct HoldingsRequest {
    pub holdings: Option<Vec<Holding>>,
}

// ============ 출금 ============

/// 출금 생성 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub amount: Option<f64>,
    pub wallet_address: Option<String>,
}

/// 출금 생성 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawCreateResponse {
    pub success: bool,
    pub message: String,
    pub withdrawal_id: String,
    pub withdrawal: WithdrawalRecord,
}

/// 출금 내역 응답
#[derive(Debug, Serialize)]
pub struct WithdrawHistoryResponse {
    pub success: bool,
    pub withdrawals: Vec<WithdrawalRecord>,
    pub count: usize,
}

/// 잔고 조회 응답
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub success: bool,
    pub balance: f64,
    pub currency: String,
}

/// 출금 상태 변경 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawStatusRequest {
    pub status: Option<String>,
    pub transaction_id: Option<String>,
}

/// 출금 상태 변경 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawUpdateResponse {
    pub success: bool,
    pub message: String,
    pub withdrawal_id: String,
    pub status: String,
}

// ============ 입금 ============

/// 입금 기록 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub amount: Option<f64>,
    pub crypto: Option<String>,
    pub tx_hash: Option<String>,
    pub wallet_address: Option<String>,
}

/// 입금 기록 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecordResponse {
    pub success: bool,
    pub message: String,
    pub deposit_id: String,
    pub deposit: DepositRecord,
}

/// 입금 내역 응답
#[derive(Debug, Serialize)]
pub struct DepositHistoryResponse {
    pub success: bool,
    pub deposits: Vec<DepositRecord>,
    pub count: usize,
}

/// 입금 주소 응답
#[derive(Debug, Serialize)]
pub struct DepositAddressesResponse {
    pub success: bool,
    pub addresses: std::collections::BTreeMap<&'static str, &'static str>,
}

// ============ 시장 데이터 / 문의 ============

/// 상위 10개 코인 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Top10Response {
    pub success: bool,
    pub updated_at: DateTime<Utc>,
    pub top10: Vec<MarketQuote>,
    pub source: &'static str,
}

/// 문의 접수 요청
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

/// 문의 접수 응답
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub contact: crate::ledger::model::ContactRecord,
}
