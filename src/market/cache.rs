//! 시장 데이터 캐시
//!
//! 단일 공유 문서에 상위 10개 코인 스냅샷을 저장하고 30분 이내면
//! 캐시에서 제공합니다. 동시 캐시 미스는 둘 다 갱신을 수행할 수 있으며
//! 마지막 쓰기가 남습니다 (last-write-wins).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::market::client::{MarketError, MarketFeed, MarketQuote};
use crate::store::{to_fields, DocumentStore};

const CACHE_COLLECTION: &str = "cryptoCache";
const CACHE_DOC: &str = "top10cryptos";

/// 캐시 유효기간 (분)
const CACHE_TTL_MINUTES: i64 = 30;

/// 캐시 문서
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTop10 {
    pub updated_at: DateTime<Utc>,
    pub top10: Vec<MarketQuote>,
}

/// 응답 출처 표시
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Cache,
    Api,
}

impl CacheSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheSource::Cache => "cache",
            CacheSource::Api => "api",
        }
    }
}

/// 시장 데이터 캐시 관리자
pub struct MarketCache {
    store: Arc<dyn DocumentStore>,
    feed: Arc<dyn MarketFeed>,
    ttl: Duration,
}

impl MarketCache {
    pub fn new(store: Arc<dyn DocumentStore>, feed: Arc<dyn MarketFeed>) -> Self {
        Self {
            store,
            feed,
            ttl: Duration::minutes(CACHE_TTL_MINUTES),
        }
    }

    /// TTL 변경 (테스트용)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// TTL 이내면 캐시를, 아니면 API 갱신 결과를 반환
    pub async fn get_or_refresh(&self) -> Result<(CachedTop10, CacheSource), MarketError> {
        if let Some(doc) = self.store.get(CACHE_COLLECTION, CACHE_DOC).await? {
            match doc.decode::<CachedTop10>() {
                Ok(cached) => {
                    let age = Utc::now() - cached.updated_at;
                    if age < self.ttl && !cached.top10.is_empty() {
                        info!("✅ 캐시에서 시장 데이터 제공 (age: {}분)", age.num_minutes());
                        return Ok((cached, CacheSource::Cache));
                    }
                }
                Err(err) => {
                    warn!("캐시 문서 해석 실패, 갱신으로 대체: {}", err);
                }
            }
        }

        info!("🌐 CoinGecko에서 시장 데이터 갱신 중...");
        let top10 = self.feed.fetch_top10().await?;
        let fresh = CachedTop10 {
            updated_at: Utc::now(),
            top10,
        };
        self.store
            .set(CACHE_COLLECTION, CACHE_DOC, to_fields(&fresh)?)
            .await?;

        Ok((fresh, CacheSource::Api))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 호출 횟수를 세는 스텁 공급원
    struct StubFeed {
        calls: AtomicUsize,
    }

    impl StubFeed {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MarketFeed for StubFeed {
        async fn fetch_top10(&self) -> Result<Vec<MarketQuote>, MarketError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![MarketQuote {
                rank: 1,
                image: "https://img/btc.png".to_string(),
                id: "bitcoin".to_string(),
                symbol: "BTC".to_string(),
                name: "Bitcoin".to_string(),
                price: 50000.0,
                market_cap: 1.0e12,
                change_24h: 1.5,
                chart_data: vec![1.0, 2.0],
            }])
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store: Arc<MemoryDocumentStore> = Arc::new(MemoryDocumentStore::new());
        let feed = Arc::new(StubFeed::new());
        let cache = MarketCache::new(store, feed.clone());

        // 첫 조회는 API
        let (data, source) = cache.get_or_refresh().await.unwrap();
        assert_eq!(source, CacheSource::Api);
        assert_eq!(data.top10.len(), 1);
        assert_eq!(feed.call_count(), 1);

        // 두 번째 조회는 캐시, API 호출 없음
        let (data, source) = cache.get_or_refresh().await.unwrap();
        assert_eq!(source, CacheSource::Cache);
        assert_eq!(data.top10[0].symbol, "BTC");
        assert_eq!(feed.call_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_refreshes() {
        let store: Arc<MemoryDocumentStore> = Arc::new(MemoryDocumentStore::new());
        let feed = Arc::new(StubFeed::new());
        let cache = MarketCache::new(store.clone(), feed.clone());

        // 31분 지난 캐시 문서를 직접 심음
        let stale = CachedTop10 {
            updated_at: Utc::now() - Duration::minutes(31),
            top10: vec![],
        };
        store
            .set(CACHE_COLLECTION, CACHE_DOC, to_fields(&stale).unwrap())
            .await
            .unwrap();

        let (_, source) = cache.get_or_refresh().await.unwrap();
        assert_eq!(source, CacheSource::Api);
        assert_eq!(feed.call_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_document_falls_back_to_api() {
        let store: Arc<MemoryDocumentStore> = Arc::new(MemoryDocumentStore::new());
        let feed = Arc::new(StubFeed::new());
        let cache = MarketCache::new(store.clone(), feed.clone());

        let mut broken = crate::store::Fields::new();
        broken.insert("updatedAt".to_string(), serde_json::json!("엉뚱한값"));
        store.set(CACHE_COLLECTION, CACHE_DOC, broken).await.unwrap();

        let (_, source) = cache.get_or_refresh().await.unwrap();
        assert_eq!(source, CacheSource::Api);
    }
}
