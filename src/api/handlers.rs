//! API 핸들러
//!
//! 원장/시장 데이터 오류를 {success: false, error} 봉투와
//! HTTP 상태 코드로 매핑합니다.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use log::{debug, error};
use rand::RngCore;

use crate::api::models::*;
use crate::auth::google::AuthError;
use crate::auth::middleware::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::ledger::deposits::NewDeposit;
use crate::ledger::error::LedgerError;
use crate::ledger::model::NewUser;
use crate::ledger::DepositRecorder;
use crate::market::MarketError;
use crate::server::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn err(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

/// 원장 오류 → HTTP 응답 매핑
fn ledger_error(error: LedgerError) -> ApiError {
    match &error {
        LedgerError::Validation(message) => err(StatusCode::BAD_REQUEST, message.clone()),
        LedgerError::NotFound(_) => err(StatusCode::NOT_FOUND, error.to_string()),
        LedgerError::Duplicate => err(
            StatusCode::CONFLICT,
            "이미 등록된 이메일입니다. 다른 이메일을 사용해주세요",
        ),
        LedgerError::InsufficientFunds => err(StatusCode::BAD_REQUEST, error.to_string()),
        LedgerError::InvalidStatus(_) => err(StatusCode::BAD_REQUEST, error.to_string()),
        LedgerError::Conflict | LedgerError::Store(_) => {
            error!("원장 처리 실패: {}", error);
            err(StatusCode::INTERNAL_SERVER_ERROR, "내부 서버 오류")
        }
    }
}

fn market_error(error: MarketError) -> ApiError {
    error!("❌ 시장 데이터 처리 실패: {}", error);
    err(
        StatusCode::INTERNAL_SERVER_ERROR,
        "시장 데이터를 가져오지 못했습니다",
    )
}

// ============ 인증 ============

/// 회원가입 핸들러
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let username = payload.username.unwrap_or_default();
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(err(
            StatusCode::BAD_REQUEST,
            "모든 항목을 입력해야 합니다",
        ));
    }
    if payload.confirm_password.as_deref() != Some(password.as_str()) {
        return Err(err(
            StatusCode::BAD_REQUEST,
            "비밀번호가 일치하지 않습니다",
        ));
    }

    let password_hash = hash_password(&password).map_err(|e| {
        error!("비밀번호 해시 실패: {}", e);
        err(StatusCode::INTERNAL_SERVER_ERROR, "내부 서버 오류")
    })?;

    let user = state
        .users
        .create_user(NewUser {
            name: username,
            email,
            password_hash: Some(password_hash),
            provider: "email".to_string(),
            firebase_uid: None,
            profile_picture: None,
            is_email_verified: false,
        })
        .await
        .map_err(ledger_error)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "회원가입이 완료되었습니다".to_string(),
            data: RegisteredUser {
                id: user.id,
                email: user.email,
                name: user.name,
            },
        }),
    ))
}

/// 로그인 핸들러
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(err(
            StatusCode::BAD_REQUEST,
            "이메일과 비밀번호를 입력해야 합니다",
        ));
    }

    // 계정 존재 여부를 노출하지 않는 단일 실패 메시지
    let invalid = || err(
        StatusCode::UNAUTHORIZED,
        "이메일 또는 비밀번호가 올바르지 않습니다",
    );

    let user = state
        .users
        .get_user_by_email(&email)
        .await
        .map_err(ledger_error)?
        .ok_or_else(invalid)?;
    let stored_hash = user.password.as_deref().ok_or_else(invalid)?;
    if !verify_password(&password, stored_hash) {
        return Err(invalid());
    }

    let token = state
        .jwt
        .generate_token(&user.id, &user.email, &user.name)
        .map_err(|e| {
            error!("토큰 발급 실패: {}", e);
            err(StatusCode::INTERNAL_SERVER_ERROR, "내부 서버 오류")
        })?;

    Ok(Json(AuthResponse {
        success: true,
        message: "로그인 성공".to_string(),
        data: AuthData {
            id: user.id,
            email: user.email,
            name: user.name,
            profile_picture: user.profile_picture,
            token,
            expires_in: "1h".to_string(),
        },
    }))
}

/// 토큰 유효성 확인 핸들러
pub async fn validate_token(
    State(state): State<AppState>,
    Json(payload): Json<ValidateTokenRequest>,
) -> Json<ValidateResponse> {
    let invalid = Json(ValidateResponse {
        valid: false,
        user: None,
    });

    let token = match payload.token {
        Some(token) => token,
        None => return invalid,
    };
    let claims = match state.jwt.verify_token(&token) {
        Some(claims) => claims,
        None => return invalid,
    };
    // 사용자가 아직 존재하는지 확인
    match state.users.find_user(&claims.sub).await {
        Ok(Some(_)) => Json(ValidateResponse {
            valid: true,
            user: Some(claims),
        }),
        _ => invalid,
    }
}

/// Google 로그인 핸들러
pub async fn google_auth(
    State(state): State<AppState>,
    Json(payload): Json<GoogleAuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let id_token = payload
        .id_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "ID 토큰이 필요합니다"))?;

    let profile = state.google.verify(&id_token).await.map_err(|e| {
        if let AuthError::Upstream(inner) = &e {
            error!("Google 토큰 검증 요청 실패: {}", inner);
        }
        err(StatusCode::UNAUTHORIZED, "유효하지 않은 Google 토큰")
    })?;

    let user = match state
        .users
        .get_user_by_email(&profile.email)
        .await
        .map_err(ledger_error)?
    {
        Some(user) => {
            // 기존 계정에 OAuth uid가 없으면 연결
            if user.firebase_uid.is_none() {
                state
                    .users
                    .link_firebase_uid(&user.id, &profile.sub)
                    .await
                    .map_err(ledger_error)?;
            }
            user
        }
        None => state
            .users
            .create_user(NewUser {
                name: profile.name.clone().unwrap_or_else(|| profile.email.clone()),
                email: profile.email.clone(),
                password_hash: None,
                provider: "google".to_string(),
                firebase_uid: Some(profile.sub.clone()),
                profile_picture: profile.picture.clone(),
                is_email_verified: true,
            })
            .await
            .map_err(ledger_error)?,
    };

    let token = state
        .jwt
        .generate_token(&user.id, &user.email, &user.name)
        .map_err(|e| {
            error!("토큰 발급 실패: {}", e);
            err(StatusCode::INTERNAL_SERVER_ERROR, "내부 서버 오류")
        })?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Google 인증 성공".to_string(),
        data: AuthData {
            id: user.id,
            email: user.email,
            name: user.name,
            profile_picture: user.profile_picture.or(profile.picture),
            token,
            expires_in: "1h".to_string(),
        },
    }))
}

/// 비밀번호 찾기 핸들러
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "이메일을 입력해야 합니다"))?;

    let user = state
        .users
        .get_user_by_email(&email)
        .await
        .map_err(ledger_error)?
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "등록되지 않은 이메일입니다"))?;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let reset_token = hex::encode(bytes);
    let expiry = Utc::now() + chrono::Duration::hours(1);

    state
        .users
        .set_reset_token(&user.id, &reset_token, expiry)
        .await
        .map_err(ledger_error)?;

    // 메일 발송은 별도 시스템 담당
    debug!("비밀번호 재설정 토큰 발급: {}", user.id);

    Ok(Json(MessageResponse {
        success: true,
        message: "비밀번호 재설정 링크를 이메일로 보냈습니다".to_string(),
    }))
}

/// 비밀번호 재설정 핸들러
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = payload
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "재설정 토큰이 필요합니다"))?;

    let user = state
        .users
        .get_user_by_reset_token(&token)
        .await
        .map_err(ledger_error)?
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "유효하지 않은 재설정 토큰"))?;

    let expired = user
        .reset_token_expiry
        .map(|expiry| Utc::now() > expiry)
        .unwrap_or(true);
    if expired {
        return Err(err(
            StatusCode::BAD_REQUEST,
            "재설정 토큰이 만료되었습니다",
        ));
    }

    let password = payload.password.unwrap_or_default();
    if password.is_empty() {
        return Err(err(StatusCode::BAD_REQUEST, "비밀번호를 입력해야 합니다"));
    }
    if payload.confirm_password.as_deref() != Some(password.as_str()) {
        return Err(err(
            StatusCode::BAD_REQUEST,
            "비밀번호가 일치하지 않습니다",
        ));
    }

    let password_hash = hash_password(&password).map_err(|e| {
        error!("비밀번호 해시 실패: {}", e);
        err(StatusCode::INTERNAL_SERVER_ERROR, "내부 서버 오류")
    })?;
    state
        .users
        .update_password(&user.id, &password_hash)
        .await
        .map_err(ledger_error)?;

    Ok(Json(MessageResponse {
        success: true,
        message: "비밀번호가 재설정되었습니다".to_string(),
    }))
}

// ============ 대시보드 ============

/// 대시보드 데이터 핸들러
pub async fn dashboard_data(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let data = state
        .users
        .dashboard_data(&claims.sub)
        .await
        .map_err(ledger_error)?;
    Ok(Json(DashboardResponse {
        success: true,
        data,
    }))
}

/// 프로필 조회 핸들러. 민감 필드는 제거
pub async fn user_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .users
        .get_user(&claims.sub)
        .await
        .map_err(ledger_error)?;

    let mut data = serde_json::to_value(&user).map_err(|e| {
        error!("프로필 직렬화 실패: {}", e);
        err(StatusCode::INTERNAL_SERVER_ERROR, "내부 서버 오류")
    })?;
    if let Some(map) = data.as_object_mut() {
        map.remove("password");
        map.remove("resetToken");
        map.remove("resetTokenExpiry");
    }

    Ok(Json(ProfileResponse {
        success: true,
        data,
    }))
}

/// 거래 내역 핸들러
pub async fn user_transactions(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(params): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let transactions = state
        .users
        .transactions(&claims.sub, params.limit)
        .await
        .map_err(ledger_error)?;
    Ok(Json(TransactionsResponse {
        success: true,
        count: transactions.len(),
        data: transactions,
    }))
}

/// 일일 리포트 갱신 핸들러
pub async fn update_today_report(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<TodayReportRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (pnl, gain) = match (payload.pnl, payload.gain) {
        (Some(pnl), Some(gain)) => (pnl, gain),
        _ => {
            return Err(err(
                StatusCode::BAD_REQUEST,
                "pnl과 gain은 필수 입력입니다",
            ))
        }
    };

    state
        .users
        .update_today_report(&claims.sub, pnl, gain)
        .await
        .map_err(ledger_error)?;
    Ok(Json(MessageResponse {
        success: true,
        message: "일일 리포트가 갱신되었습니다".to_string(),
    }))
}

/// 보유 자산 갱신 핸들러
pub async fn update_holdings(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<HoldingsRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let holdings = payload
        .holdings
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "holdings는 배열이어야 합니다"))?;

    state
        .users
        .update_holdings(&claims.sub, holdings)
        .await
        .map_err(ledger_error)?;
    Ok(Json(MessageResponse {
        success: true,
        message: "보유 자산이 갱신되었습니다".to_string(),
    }))
}

// ============ 출금 ============

/// 출금 요청 생성 핸들러
pub async fn create_withdrawal(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<WithdrawRequest>,
) -> Result<(StatusCode, Json<WithdrawCreateResponse>), ApiError> {
    let (amount, wallet_address) = match (payload.amount, payload.wallet_address) {
        (Some(amount), Some(wallet)) if !wallet.is_empty() => (amount, wallet),
        _ => {
            return Err(err(
                StatusCode::BAD_REQUEST,
                "amount와 walletAddress는 필수 입력입니다",
            ))
        }
    };

    let withdrawal = state
        .withdrawals
        .create(&claims.sub, amount, &wallet_address)
        .await
        .map_err(ledger_error)?;

    Ok((
        StatusCode::CREATED,
        Json(WithdrawCreateResponse {
            success: true,
            message: "출금 요청이 접수되었습니다".to_string(),
            withdrawal_id: withdrawal.id.clone(),
            withdrawal,
        }),
    ))
}

/// 출금 내역 핸들러
pub async fn withdrawal_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<WithdrawHistoryResponse>, ApiError> {
    let withdrawals = state
        .withdrawals
        .history(&claims.sub)
        .await
        .map_err(ledger_error)?;
    Ok(Json(WithdrawHistoryResponse {
        success: true,
        count: withdrawals.len(),
        withdrawals,
    }))
}

/// 잔고 조회 핸들러
pub async fn withdrawal_balance(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user = state
        .users
        .get_user(&claims.sub)
        .await
        .map_err(ledger_error)?;
    Ok(Json(BalanceResponse {
        success: true,
        balance: user.balance,
        currency: "USDT".to_string(),
    }))
}

/// 출금 상태 변경 핸들러 (관리자 동작)
pub async fn update_withdrawal_status(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Path(withdrawal_id): Path<String>,
    Json(payload): Json<WithdrawStatusRequest>,
) -> Result<Json<WithdrawUpdateResponse>, ApiError> {
    let status = payload
        .status
        .filter(|status| !status.is_empty())
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "status는 필수 입력입니다"))?;

    let updated = state
        .withdrawals
        .update_status(&withdrawal_id, &status, payload.transaction_id)
        .await
        .map_err(ledger_error)?;

    Ok(Json(WithdrawUpdateResponse {
        success: true,
        message: "출금 상태가 변경되었습니다".to_string(),
        withdrawal_id: updated.id,
        status: updated.status.to_string(),
    }))
}

// ============ 입금 ============

/// 입금 기록 핸들러
pub async fn record_deposit(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<DepositRequest>,
) -> Result<(StatusCode, Json<DepositRecordResponse>), ApiError> {
    let (amount, crypto) = match (payload.amount, payload.crypto) {
        (Some(amount), Some(crypto)) if !crypto.is_empty() => (amount, crypto),
        _ => {
            return Err(err(
                StatusCode::BAD_REQUEST,
                "amount와 crypto는 필수 입력입니다",
            ))
        }
    };

    let deposit = state
        .deposits
        .record(
            &claims.sub,
            NewDeposit {
                amount,
                crypto,
                tx_hash: payload.tx_hash,
                wallet_address: payload.wallet_address,
            },
        )
        .await
        .map_err(ledger_error)?;

    Ok((
        StatusCode::CREATED,
        Json(DepositRecordResponse {
            success: true,
            message: "입금이 기록되었습니다".to_string(),
            deposit_id: deposit.id.clone(),
            deposit,
        }),
    ))
}

/// 입금 내역 핸들러
pub async fn deposit_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<DepositHistoryResponse>, ApiError> {
    let deposits = state
        .deposits
        .history(&claims.sub)
        .await
        .map_err(ledger_error)?;
    Ok(Json(DepositHistoryResponse {
        success: true,
        count: deposits.len(),
        deposits,
    }))
}

/// 입금 주소 조회 핸들러
pub async fn deposit_addresses(
    AuthUser(_claims): AuthUser,
) -> Json<DepositAddressesResponse> {
    Json(DepositAddressesResponse {
        success: true,
        addresses: DepositRecorder::addresses(),
    })
}

// ============ 시장 데이터 / 문의 ============

/// 상위 10개 코인 핸들러 (캐시 우선)
pub async fn top10_cryptos(
    State(state): State<AppState>,
) -> Result<Json<Top10Response>, ApiError> {
    let (data, source) = state
        .market
        .get_or_refresh()
        .await
        .map_err(market_error)?;
    Ok(Json(Top10Response {
        success: true,
        updated_at: data.updated_at,
        top10: data.top10,
        source: source.as_str(),
    }))
}

/// 문의 접수 핸들러
pub async fn user_contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = state
        .users
        .record_contact(
            payload.name.as_deref().unwrap_or(""),
            payload.email.as_deref().unwrap_or(""),
            payload.message.as_deref().unwrap_or(""),
        )
        .await
        .map_err(ledger_error)?;
    Ok(Json(ContactResponse {
        success: true,
        contact,
    }))
}
