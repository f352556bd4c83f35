//! CoinEdge 서버 진입점

use std::sync::Arc;

use log::info;

use coinedge::ledger::{migration, UserLedger};
use coinedge::server::{start_server, ServerConfig};
use coinedge::store::{self, DocumentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    info!("🚀 CoinEdge 서버 시작 중...");

    let config = ServerConfig::from_env();
    let store: Arc<dyn DocumentStore> = Arc::new(store::init_store(&config.database_url).await?);

    // 기동 시 1회 스키마 보정
    let users = UserLedger::new(store.clone());
    migration::migrate_users(&users).await?;

    start_server(config, store).await
}
