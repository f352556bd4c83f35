//! HTTP 서버 구성

use std::env;
use std::sync::Arc;

use log::info;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::create_api_router;
use crate::auth::{GoogleTokenInfoClient, GoogleTokenVerifier, JwtKeys};
use crate::ledger::{DepositRecorder, UserLedger, WithdrawalProcessor};
use crate::market::{CoinGeckoClient, MarketCache};
use crate::store::DocumentStore;

/// 서버 설정
#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub coingecko_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "sqlite://coinedge.db?mode=rwc".to_string(),
            jwt_secret: "coinedge-dev-secret".to_string(),
            coingecko_base_url: crate::market::client::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ServerConfig {
    /// 환경 변수에서 설정 로드 (없으면 기본값)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            coingecko_base_url: env::var("COINGECKO_API_URL")
                .unwrap_or(defaults.coingecko_base_url),
        }
    }
}

/// 서버 상태
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserLedger>,
    pub withdrawals: Arc<WithdrawalProcessor>,
    pub deposits: Arc<DepositRecorder>,
    pub market: Arc<MarketCache>,
    pub jwt: Arc<JwtKeys>,
    pub google: Arc<dyn GoogleTokenVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: &ServerConfig) -> Self {
        let google: Arc<dyn GoogleTokenVerifier> = Arc::new(GoogleTokenInfoClient::default());
        Self::with_google(store, config, google)
    }

    /// 검증기 주입 생성자 (테스트용)
    pub fn with_google(
        store: Arc<dyn DocumentStore>,
        config: &ServerConfig,
        google: Arc<dyn GoogleTokenVerifier>,
    ) -> Self {
        let users = Arc::new(UserLedger::new(store.clone()));
        let feed = Arc::new(CoinGeckoClient::new(&config.coingecko_base_url));
        Self {
            withdrawals: Arc::new(WithdrawalProcessor::new(store.clone(), users.clone())),
            deposits: Arc::new(DepositRecorder::new(store.clone(), users.clone())),
            market: Arc::new(MarketCache::new(store, feed)),
            jwt: Arc::new(JwtKeys::new(&config.jwt_secret)),
            google,
            users,
        }
    }
}

/// 서버 시작
pub async fn start_server(
    config: ServerConfig,
    store: Arc<dyn DocumentStore>,
) -> anyhow::Result<()> {
    let state = AppState::new(store, &config);

    let app = create_api_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    info!("서버가 성공적으로 시작되었습니다!");
    info!("REST API: http://localhost:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
