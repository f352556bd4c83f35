//! SQLite 기반 문서 저장소
//!
//! 문서를 `documents` 테이블에 JSON 본문으로 저장하고
//! SQLite JSON1 함수로 질의/부분 업데이트/원자적 증가를 수행합니다.

use log::info;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use super::{Document, DocumentStore, Fields, Query, SortDir, StoreError};

/// SQLite 문서 저장소 초기화 및 연결
pub async fn init_store(database_url: &str) -> Result<SqliteDocumentStore, StoreError> {
    info!("🗄️  문서 저장소 초기화 중...");

    // 연결 풀 생성
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    create_tables(&pool).await?;

    info!("✅ 문서 저장소 초기화 완료");

    Ok(SqliteDocumentStore::new(pool))
}

/// 필요한 테이블 생성
async fn create_tables(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
        .execute(pool)
        .await?;

    Ok(())
}

/// SQLite 문서 저장소
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// JSON 경로 표기 ("$.필드명")
fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

#[async_trait::async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("data");
                let data: Value = serde_json::from_str(&raw)?;
                Ok(Some(Document {
                    id: id.to_string(),
                    data,
                }))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let body = serde_json::to_string(&Value::Object(fields))?;
        sqlx::query(
            "INSERT INTO documents (collection, id, data)
             VALUES (?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data",
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let patch = serde_json::to_string(&Value::Object(fields))?;
        let result = sqlx::query(
            "UPDATE documents SET data = json_patch(data, ?)
             WHERE collection = ? AND id = ?",
        )
        .bind(patch)
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_string(&Value::Object(fields))?;
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(body)
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>, StoreError> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        if query.filter.is_some() {
            sql.push_str(" AND json_extract(data, ?) = ?");
        }
        if let Some((_, dir)) = &query.order_by {
            sql.push_str(" ORDER BY json_extract(data, ?)");
            sql.push_str(match dir {
                SortDir::Asc => " ASC",
                SortDir::Desc => " DESC",
            });
        }
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql).bind(collection);
        if let Some((field, value)) = &query.filter {
            q = q.bind(json_path(field));
            q = match value {
                Value::String(s) => q.bind(s.clone()),
                Value::Number(n) => q.bind(n.as_f64().unwrap_or(0.0)),
                Value::Bool(b) => q.bind(*b),
                other => q.bind(other.to_string()),
            };
        }
        if let Some((field, _)) = &query.order_by {
            q = q.bind(json_path(field));
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit);
        }

        let rows = q.fetch_all(&self.pool).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("data");
            documents.push(Document {
                id: row.get("id"),
                data: serde_json::from_str(&raw)?,
            });
        }

        Ok(documents)
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: f64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE documents
             SET data = json_set(data, ?1, COALESCE(json_extract(data, ?1), 0) + ?2)
             WHERE collection = ?3 AND id = ?4",
        )
        .bind(json_path(field))
        .bind(delta)
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard_field: &str,
        expected: &Value,
        fields: Fields,
    ) -> Result<bool, StoreError> {
        let patch = serde_json::to_string(&Value::Object(fields))?;
        let sql = "UPDATE documents SET data = json_patch(data, ?)
                   WHERE collection = ? AND id = ? AND json_extract(data, ?) = ?";

        let mut q = sqlx::query(sql)
            .bind(patch)
            .bind(collection)
            .bind(id)
            .bind(json_path(guard_field));
        q = match expected {
            Value::String(s) => q.bind(s.clone()),
            Value::Number(n) => q.bind(n.as_f64().unwrap_or(0.0)),
            Value::Bool(b) => q.bind(*b),
            other => q.bind(other.to_string()),
        };

        let result = q.execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> SqliteDocumentStore {
        // :memory: DB는 연결마다 분리되므로 단일 연결 풀 사용
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_tables(&pool).await.unwrap();
        SqliteDocumentStore::new(pool)
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("객체가 아님"),
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = test_store().await;
        store
            .set("users", "u1", fields(json!({"email": "a@b.c", "balance": 10})))
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data["email"], "a@b.c");
        assert_eq!(doc.data["balance"], 10);

        assert!(store.get("users", "없음").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_and_removes_nulls() {
        let store = test_store().await;
        store
            .set("users", "u1", fields(json!({"a": 1, "b": "x"})))
            .await
            .unwrap();

        store
            .update("users", "u1", fields(json!({"b": "y", "c": true})))
            .await
            .unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data["a"], 1);
        assert_eq!(doc.data["b"], "y");
        assert_eq!(doc.data["c"], true);

        // null은 필드 제거
        store
            .update("users", "u1", fields(json!({"b": null})))
            .await
            .unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert!(doc.data.get("b").is_none());
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = test_store().await;
        let err = store
            .update("users", "없음", fields(json!({"a": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_query_filter_order_limit() {
        let store = test_store().await;
        for (id, user, at) in [
            ("t1", "u1", "2024-01-01T00:00:00Z"),
            ("t2", "u1", "2024-03-01T00:00:00Z"),
            ("t3", "u2", "2024-02-01T00:00:00Z"),
            ("t4", "u1", "2024-02-01T00:00:00Z"),
        ] {
            store
                .set(
                    "transactions",
                    id,
                    fields(json!({"userId": user, "createdAt": at})),
                )
                .await
                .unwrap();
        }

        let docs = store
            .query(
                "transactions",
                Query::new()
                    .where_eq("userId", "u1")
                    .order_by("createdAt", SortDir::Desc)
                    .limit(2),
            )
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "t2");
        assert_eq!(docs[1].id, "t4");
    }

    #[tokio::test]
    async fn test_increment_is_cumulative() {
        let store = test_store().await;
        store
            .set("users", "u1", fields(json!({"totalDeposits": 0})))
            .await
            .unwrap();

        store.increment("users", "u1", "totalDeposits", 50.0).await.unwrap();
        store.increment("users", "u1", "totalDeposits", 25.5).await.unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data["totalDeposits"].as_f64().unwrap(), 75.5);

        // 없던 필드도 0에서 시작
        store.increment("users", "u1", "totalTrades", 1.0).await.unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data["totalTrades"].as_f64().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_update_if_guard() {
        let store = test_store().await;
        store
            .set("users", "u1", fields(json!({"balance": 100.0})))
            .await
            .unwrap();

        // 기대값 일치 → 적용
        let swapped = store
            .update_if(
                "users",
                "u1",
                "balance",
                &json!(100.0),
                fields(json!({"balance": 60.0})),
            )
            .await
            .unwrap();
        assert!(swapped);

        // 기대값 불일치 → 미적용
        let swapped = store
            .update_if(
                "users",
                "u1",
                "balance",
                &json!(100.0),
                fields(json!({"balance": 0.0})),
            )
            .await
            .unwrap();
        assert!(!swapped);

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data["balance"].as_f64().unwrap(), 60.0);
    }

    #[tokio::test]
    async fn test_add_generates_ids() {
        let store = test_store().await;
        let id1 = store
            .add("deposits", fields(json!({"amount": 1})))
            .await
            .unwrap();
        let id2 = store
            .add("deposits", fields(json!({"amount": 2})))
            .await
            .unwrap();
        assert_ne!(id1, id2);
        assert!(store.get("deposits", &id1).await.unwrap().is_some());
    }
}
