use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::handlers::*;
use crate::server::AppState;

/// API 라우터 생성
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        // 인증 API
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/validate", post(validate_token))
        .route("/auth/google", post(google_auth))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        // 시장 데이터 / 문의 (공개)
        .route("/cryptos/top10", get(top10_cryptos))
        .route("/contact", post(user_contact))
        // 대시보드 API
        .route("/api/dashboard-data", get(dashboard_data))
        .route("/api/profile", get(user_profile))
        .route("/api/transactions", get(user_transactions))
        .route("/api/today-report", put(update_today_report))
        .route("/api/holdings", put(update_holdings))
        // 출금 API
        .route("/api/withdraw/create", post(create_withdrawal))
        .route("/api/withdraw/history", get(withdrawal_history))
        .route("/api/withdraw/balance", get(withdrawal_balance))
        .route("/api/withdraw/update/:withdrawal_id", put(update_withdrawal_status))
        // 입금 API
        .route("/api/deposit/record", post(record_deposit))
        .route("/api/deposit/history", get(deposit_history))
        .route("/api/deposit/addresses", get(deposit_addresses))
}
