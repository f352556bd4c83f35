//! 문서 저장소 추상화
//!
//! 컬렉션 + id로 접근하는 스키마리스 문서 저장소 인터페이스입니다.
//! 운영 환경은 SQLite 기반 구현을, 테스트는 인메모리 구현을 사용합니다.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::{init_store, SqliteDocumentStore};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// 문서 필드 맵
pub type Fields = serde_json::Map<String, Value>;

/// 저장소 오류 타입
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("문서를 찾을 수 없음: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },
    #[error("문서 형식 오류: {0}")]
    InvalidDocument(String),
    #[error("직렬화 오류: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
}

/// 저장된 문서 (id + 필드)
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// 문서를 레코드 타입으로 역직렬화. id는 `id` 필드로 주입됨
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        match &mut data {
            Value::Object(map) => {
                map.insert("id".to_string(), Value::String(self.id.clone()));
            }
            _ => {
                return Err(StoreError::InvalidDocument(format!(
                    "문서 본문이 객체가 아님: {}",
                    self.id
                )))
            }
        }
        Ok(serde_json::from_value(data)?)
    }
}

/// 레코드를 저장용 필드 맵으로 변환 (id 필드는 제외)
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(StoreError::InvalidDocument(format!(
            "레코드가 객체로 직렬화되지 않음: {}",
            other
        ))),
    }
}

/// 정렬 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// 필드 동등 비교 + 정렬 + 제한 질의
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<(String, Value)>,
    pub order_by: Option<(String, SortDir)>,
    pub limit: Option<i64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter = Some((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, dir: SortDir) -> Self {
        self.order_by = Some((field.to_string(), dir));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }
}

/// 문서 저장소 인터페이스
///
/// `update` 계열은 JSON merge-patch 의미론을 따릅니다:
/// null 값은 해당 최상위 필드를 제거합니다.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// 단일 문서 조회
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// 문서 생성 또는 전체 교체
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// 부분 업데이트. 문서가 없으면 `DocumentNotFound`
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// 자동 생성 id로 문서 추가, 생성된 id 반환
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// 필드 동등 비교 질의
    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>, StoreError>;

    /// 숫자 필드 원자적 증가 (읽기-수정-쓰기 왕복 없음)
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: f64,
    ) -> Result<(), StoreError>;

    /// 조건부 업데이트 (CAS). guard 필드가 기대값과 같을 때만 적용하고,
    /// 적용 여부를 반환. 문서가 없으면 false
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard_field: &str,
        expected: &Value,
        fields: Fields,
    ) -> Result<bool, StoreError>;
}

/// 숫자는 수치로, 나머지는 구조적으로 비교
pub(crate) fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
