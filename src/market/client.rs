//! CoinGecko 시장 데이터 클라이언트

use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// CoinGecko 기본 엔드포인트
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// 시장 데이터 오류 타입
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("시장 데이터 API 오류: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("저장소 오류: {0}")]
    Store(#[from] StoreError),
}

/// /coins/markets 원시 응답 항목
#[derive(Debug, Clone, Deserialize)]
pub struct CoinMarket {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub sparkline_in_7d: Option<Sparkline>,
}

/// 7일 스파크라인
#[derive(Debug, Clone, Deserialize)]
pub struct Sparkline {
    #[serde(default)]
    pub price: Vec<f64>,
}

/// 캐시/응답용으로 가공한 코인 데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    pub rank: u32,
    pub image: String,
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub market_cap: f64,
    pub change_24h: f64,
    pub chart_data: Vec<f64>,
}

impl MarketQuote {
    /// 원시 응답 항목을 순위와 함께 가공
    pub fn from_coin(rank: u32, coin: CoinMarket) -> Self {
        Self {
            rank,
            image: coin.image,
            id: coin.id,
            symbol: coin.symbol.to_uppercase(),
            name: coin.name,
            price: coin.current_price.unwrap_or(0.0),
            market_cap: coin.market_cap.unwrap_or(0.0),
            change_24h: coin.price_change_percentage_24h.unwrap_or(0.0),
            chart_data: coin.sparkline_in_7d.map(|s| s.price).unwrap_or_default(),
        }
    }
}

/// 시장 데이터 공급원 인터페이스
#[async_trait::async_trait]
pub trait MarketFeed: Send + Sync {
    /// 시가총액 상위 10개 코인 조회
    async fn fetch_top10(&self) -> Result<Vec<MarketQuote>, MarketError>;
}

/// CoinGecko HTTP 클라이언트
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait::async_trait]
impl MarketFeed for CoinGeckoClient {
    async fn fetch_top10(&self) -> Result<Vec<MarketQuote>, MarketError> {
        let url = format!("{}/coins/markets", self.base_url);
        let coins: Vec<CoinMarket> = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", "10"),
                ("page", "1"),
                ("sparkline", "true"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(coins
            .into_iter()
            .enumerate()
            .map(|(i, coin)| MarketQuote::from_coin(i as u32 + 1, coin))
            .collect())
    }
}
