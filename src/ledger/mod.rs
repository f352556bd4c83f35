//! 잔고/거래 원장 서브시스템
//!
//! 사용자 잔고 변경, 거래 기록, 출금 상태 머신, 입금 기록을 담당합니다.

pub mod deposits;
pub mod error;
pub mod migration;
pub mod model;
pub mod users;
pub mod withdrawals;

pub use deposits::DepositRecorder;
pub use error::LedgerError;
pub use users::{BalanceDirection, UserLedger};
pub use withdrawals::WithdrawalProcessor;
