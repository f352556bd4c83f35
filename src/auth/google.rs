//! Google ID 토큰 검증
//!
//! 프론트엔드에서 받은 Google 로그인 ID 토큰을 tokeninfo 엔드포인트로
//! 검증합니다. 테스트에서는 트레이트 구현을 교체합니다.

use serde::Deserialize;

/// Google tokeninfo 기본 엔드포인트
pub const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// 인증 오류 타입
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("유효하지 않은 ID 토큰")]
    InvalidToken,
    #[error("토큰 검증 요청 실패: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// 검증된 Google 계정 프로필
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Google 계정 고유 id
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// tokeninfo는 문자열 "true"/"false"로 반환
    #[serde(default)]
    pub email_verified: Option<String>,
}

/// ID 토큰 검증 인터페이스
#[async_trait::async_trait]
pub trait GoogleTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleProfile, AuthError>;
}

/// tokeninfo 엔드포인트 기반 검증기
pub struct GoogleTokenInfoClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GoogleTokenInfoClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl Default for GoogleTokenInfoClient {
    fn default() -> Self {
        Self::new(DEFAULT_TOKENINFO_URL)
    }
}

#[async_trait::async_trait]
impl GoogleTokenVerifier for GoogleTokenInfoClient {
    async fn verify(&self, id_token: &str) -> Result<GoogleProfile, AuthError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidToken);
        }

        let profile: GoogleProfile = response.json().await?;
        if profile.email.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(profile)
    }
}
