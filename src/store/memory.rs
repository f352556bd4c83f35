//! 인메모리 문서 저장소
//!
//! 테스트와 로컬 개발용 대체 구현. SQLite 구현과 동일한
//! merge-patch / CAS 의미론을 유지합니다.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{value_eq, Document, DocumentStore, Fields, Query, SortDir, StoreError};

/// 인메모리 문서 저장소
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// merge-patch 적용: null 값은 최상위 필드를 제거
fn apply_patch(target: &mut Value, fields: Fields) {
    if let Value::Object(map) = target {
        for (key, value) in fields {
            if value.is_null() {
                map.remove(&key);
            } else {
                map.insert(key, value);
            }
        }
    }
}

/// 정렬용 비교: 숫자는 수치, 문자열은 사전순
fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), Value::Object(fields));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        apply_patch(doc, fields);
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), Value::Object(fields));
        Ok(id)
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let mut documents: Vec<Document> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, data)| match &query.filter {
                        Some((field, expected)) => data
                            .get(field)
                            .map(|actual| value_eq(actual, expected))
                            .unwrap_or(false),
                        None => true,
                    })
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let Some((field, dir)) = &query.order_by {
            documents.sort_by(|a, b| {
                let ordering = value_cmp(
                    a.data.get(field).unwrap_or(&Value::Null),
                    b.data.get(field).unwrap_or(&Value::Null),
                );
                match dir {
                    SortDir::Asc => ordering,
                    SortDir::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            documents.truncate(limit as usize);
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
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let Value::Object(map) = doc {
            let current = map
                .get(field)
                .and_then(|value| value.as_f64())
                .unwrap_or(0.0);
            map.insert(field.to_string(), serde_json::json!(current + delta));
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
        let mut collections = self.collections.write().await;
        let doc = match collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        {
            Some(doc) => doc,
            None => return Ok(false),
        };

        let matches = doc
            .get(guard_field)
            .map(|actual| value_eq(actual, expected))
            .unwrap_or(false);
        if !matches {
            return Ok(false);
        }

        apply_patch(doc, fields);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("객체가 아님"),
        }
    }

    #[tokio::test]
    async fn test_merge_patch_semantics() {
        let store = MemoryDocumentStore::new();
        store
            .set("users", "u1", fields(json!({"a": 1, "b": "x"})))
            .await
            .unwrap();

        store
            .update("users", "u1", fields(json!({"b": null, "c": 2})))
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data["a"], 1);
        assert!(doc.data.get("b").is_none());
        assert_eq!(doc.data["c"], 2);
    }

    #[tokio::test]
    async fn test_update_if_numeric_guard() {
        let store = MemoryDocumentStore::new();
        // 정수로 저장된 값도 수치 비교로 일치해야 함
        store
            .set("users", "u1", fields(json!({"balance": 0})))
            .await
            .unwrap();

        let swapped = store
            .update_if(
                "users",
                "u1",
                "balance",
                &json!(0.0),
                fields(json!({"balance": 50.0})),
            )
            .await
            .unwrap();
        assert!(swapped);

        let swapped = store
            .update_if(
                "users",
                "u1",
                "balance",
                &json!(0.0),
                fields(json!({"balance": 99.0})),
            )
            .await
            .unwrap();
        assert!(!swapped);
    }

    #[tokio::test]
    async fn test_query_order_desc() {
        let store = MemoryDocumentStore::new();
        for (id, at) in [
            ("w1", "2024-01-01T00:00:00Z"),
            ("w2", "2024-02-01T00:00:00Z"),
        ] {
            store
                .set(
                    "withdrawals",
                    id,
                    fields(json!({"userId": "u1", "createdAt": at})),
                )
                .await
                .unwrap();
        }

        let docs = store
            .query(
                "withdrawals",
                Query::new()
                    .where_eq("userId", "u1")
                    .order_by("createdAt", SortDir::Desc),
            )
            .await
            .unwrap();
        assert_eq!(docs[0].id, "w2");
    }
}
