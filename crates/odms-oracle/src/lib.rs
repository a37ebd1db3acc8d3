//! # ODMS Oracle
//!
//! 供体死亡验证的预言机证明网关。核心系统从不自行执行验证，
//! 只以 `fulfilled && is_deceased` 作为器官释放的前置条件；
//! "尚未完成"是合法的等待状态而非错误。

pub mod gateway;
pub mod notification;

pub use gateway::{AttestationGateway, InMemoryGateway, VerificationStatus};
pub use notification::AttestationEvent;
