use crate::store::StoreError;

/// 원장 오류 타입
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("잘못된 요청: {0}")]
    Validation(String),
    #[error("{0}을(를) 찾을 수 없음")]
    NotFound(String),
    #[error("이미 존재하는 사용자")]
    Duplicate,
    #[error("잔고 부족")]
    InsufficientFunds,
    #[error("잘못된 출금 상태: {0}")]
    InvalidStatus(String),
    #[error("동시 잔고 변경 충돌")]
    Conflict,
    #[error("저장소 오류: {0}")]
    Store(#[from] StoreError),
}
