//! 인증 미들웨어 (Bearer 토큰 추출기)

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Json,
};

use crate::api::models::ErrorResponse;
use crate::auth::jwt::Claims;
use crate::server::AppState;

/// 인증된 사용자. 핸들러 인자로 선언하면 Bearer 토큰을 강제함
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthorized("접근 거부. 토큰이 없습니다"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("잘못된 Authorization 헤더 형식"))?;

        let claims = state
            .jwt
            .verify_token(token)
            .ok_or_else(|| unauthorized("유효하지 않거나 만료된 토큰"))?;

        Ok(AuthUser(claims))
    }
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message)))
}
