//! 사용자 스키마 마이그레이션
//!
//! 서비스 기동 시 한 번 실행되어 기존 사용자 문서의 누락 필드를
//! 기본값으로 보정합니다. 요청 경로에서의 반복 보정(쓰기 증폭)을
//! 대체합니다.

use log::info;

use crate::ledger::error::LedgerError;
use crate::ledger::users::UserLedger;

/// 마이그레이션 결과 요약
#[derive(Debug, Clone, Default)]
pub struct MigrationSummary {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// 전체 사용자 필드 보정 실행
pub async fn migrate_users(users: &UserLedger) -> Result<MigrationSummary, LedgerError> {
    info!("🔄 사용자 마이그레이션 시작...");

    let ids = users.all_user_ids().await?;
    if ids.is_empty() {
        info!("마이그레이션 대상 사용자 없음");
        return Ok(MigrationSummary::default());
    }

    let mut summary = MigrationSummary {
        total: ids.len(),
        ..Default::default()
    };

    for user_id in &ids {
        let updated = users.ensure_user_fields(user_id).await?;
        if updated.is_empty() {
            summary.skipped += 1;
        } else {
            summary.updated += 1;
        }
    }

    info!(
        "📊 마이그레이션 완료: 전체 {} / 보정 {} / 통과 {}",
        summary.total, summary.updated, summary.skipped
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::model::NewUser;
    use crate::store::{DocumentStore, Fields, MemoryDocumentStore};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_migration_backfills_only_incomplete_users() {
        let store: Arc<MemoryDocumentStore> = Arc::new(MemoryDocumentStore::new());
        let users = UserLedger::new(store.clone());

        // 완전한 사용자 하나 + 구버전 문서 하나
        users
            .create_user(NewUser {
                name: "신규".to_string(),
                email: "new@b.c".to_string(),
                password_hash: None,
                provider: "email".to_string(),
                firebase_uid: None,
                profile_picture: None,
                is_email_verified: false,
            })
            .await
            .unwrap();
        let mut legacy = Fields::new();
        legacy.insert("email".to_string(), json!("old@b.c"));
        store.set("users", "legacy", legacy).await.unwrap();

        let summary = migrate_users(&users).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped, 1);

        // 재실행은 전부 통과
        let summary = migrate_users(&users).await.unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.skipped, 2);
    }
}
