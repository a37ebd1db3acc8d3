//! 证明事件通知
//!
//! 网关在每次请求完成时广播事件，订阅方（分配引擎）对重复事件幂等处理。
//! 取代原始系统的链上事件通知机制。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 死亡证明事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationEvent {
    pub request_id: Uuid,
    pub donor_id: Uuid,
    pub is_deceased: bool,
    pub evidence_cid: Option<String>,
    pub fulfilled_at: DateTime<Utc>,
}

impl AttestationEvent {
    pub fn event_type(&self) -> &'static str {
        if self.is_deceased {
            "attestation.deceased"
        } else {
            "attestation.alive"
        }
    }
}
