//! 证明网关
//!
//! 外部真相预言机的请求/完成状态契约

use async_trait::async_trait;
use chrono::Utc;
use odms_core::utils::{is_valid_evidence_cid, RequestIdGenerator};
use odms_core::{DeathVerificationRequest, OdmsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::notification::AttestationEvent;

/// 验证请求状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationStatus {
    pub fulfilled: bool,
    pub is_deceased: bool,
    pub evidence_cid: Option<String>,
}

/// 证明网关接口
///
/// 完成是异步的且可能无限期延迟；引擎侧不设超时，超时策略属于调用方
#[async_trait]
pub trait AttestationGateway: Send + Sync {
    /// 发起死亡验证请求
    ///
    /// 同一供体存在未完成请求时返回 AlreadyPending
    async fn request_verification(&self, donor_id: Uuid, requester: Uuid) -> Result<Uuid>;

    /// 查询请求状态；未完成不是错误
    async fn get_status(&self, request_id: Uuid) -> Result<VerificationStatus>;
}

/// 网关内部状态
#[derive(Debug, Default)]
struct GatewayState {
    requests: HashMap<Uuid, DeathVerificationRequest>,
    latest_by_donor: HashMap<Uuid, Uuid>, // donor_id -> 最近一次请求
}

/// 内存证明网关
///
/// 每个供体按"最近请求"跟踪至多一个未完成请求；
/// 请求完成后不可变更，完成时向订阅者广播事件
#[derive(Debug, Clone)]
pub struct InMemoryGateway {
    state: Arc<RwLock<GatewayState>>,
    ids: RequestIdGenerator,
    events: broadcast::Sender<AttestationEvent>,
}

impl InMemoryGateway {
    pub fn new(ids: RequestIdGenerator) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(RwLock::new(GatewayState::default())),
            ids,
            events,
        }
    }

    /// 订阅证明事件
    pub fn subscribe(&self) -> broadcast::Receiver<AttestationEvent> {
        self.events.subscribe()
    }

    /// 预言机侧完成请求
    ///
    /// 已完成的请求不可再次变更（InvalidState）
    pub async fn fulfill(
        &self,
        request_id: Uuid,
        is_deceased: bool,
        evidence_cid: Option<String>,
        oracle_id: Uuid,
    ) -> Result<DeathVerificationRequest> {
        if let Some(cid) = &evidence_cid {
            if !is_valid_evidence_cid(cid) {
                return Err(OdmsError::InvalidInput(format!(
                    "malformed evidence CID: {}",
                    cid
                )));
            }
        }

        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| OdmsError::NotFound(format!("verification request {}", request_id)))?;

        if request.fulfilled {
            return Err(OdmsError::InvalidState {
                from: "Fulfilled".to_string(),
                event: "Fulfill".to_string(),
            });
        }

        let now = Utc::now();
        request.fulfilled = true;
        request.is_deceased = is_deceased;
        request.evidence_cid = evidence_cid.clone();
        request.fulfilled_at = Some(now);
        request.fulfilled_by = Some(oracle_id);
        let fulfilled = request.clone();

        tracing::info!(
            "Verification request {} fulfilled by oracle {} (deceased: {})",
            request_id,
            oracle_id,
            is_deceased
        );

        // 无订阅者时发送失败是正常情况
        let _ = self.events.send(AttestationEvent {
            request_id,
            donor_id: fulfilled.donor_id,
            is_deceased,
            evidence_cid,
            fulfilled_at: now,
        });

        Ok(fulfilled)
    }

    /// 查询完整请求记录
    pub async fn get_request(&self, request_id: Uuid) -> Option<DeathVerificationRequest> {
        self.state.read().await.requests.get(&request_id).cloned()
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new(RequestIdGenerator::new())
    }
}

#[async_trait]
impl AttestationGateway for InMemoryGateway {
    async fn request_verification(&self, donor_id: Uuid, requester: Uuid) -> Result<Uuid> {
        let mut state = self.state.write().await;

        if let Some(latest_id) = state.latest_by_donor.get(&donor_id) {
            if let Some(latest) = state.requests.get(latest_id) {
                if !latest.fulfilled {
                    return Err(OdmsError::AlreadyPending(format!(
                        "verification request {} for donor {} is still open",
                        latest_id, donor_id
                    )));
                }
            }
        }

        let request = DeathVerificationRequest {
            request_id: self.ids.next_id(),
            donor_id,
            requester,
            requested_at: Utc::now(),
            fulfilled: false,
            is_deceased: false,
            evidence_cid: None,
            fulfilled_at: None,
            fulfilled_by: None,
        };

        let request_id = request.request_id;
        state.latest_by_donor.insert(donor_id, request_id);
        state.requests.insert(request_id, request);

        tracing::info!(
            "Verification request {} opened for donor {} by {}",
            request_id,
            donor_id,
            requester
        );
        Ok(request_id)
    }

    async fn get_status(&self, request_id: Uuid) -> Result<VerificationStatus> {
        let state = self.state.read().await;
        let request = state
            .requests
            .get(&request_id)
            .ok_or_else(|| OdmsError::NotFound(format!("verification request {}", request_id)))?;

        Ok(VerificationStatus {
            fulfilled: request.fulfilled,
            is_deceased: request.is_deceased,
            evidence_cid: request.evidence_cid.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    #[tokio::test]
    async fn test_second_request_already_pending() {
        let gateway = InMemoryGateway::default();
        let donor = Uuid::new_v4();
        let requester = Uuid::new_v4();

        gateway.request_verification(donor, requester).await.unwrap();
        let second = gateway.request_verification(donor, requester).await;
        assert!(matches!(second, Err(OdmsError::AlreadyPending(_))));

        // 其他供体不受影响
        assert!(gateway
            .request_verification(Uuid::new_v4(), requester)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unfulfilled_status_is_not_an_error() {
        let gateway = InMemoryGateway::default();
        let request_id = gateway
            .request_verification(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();

        let status = gateway.get_status(request_id).await.unwrap();
        assert!(!status.fulfilled);
        assert!(!status.is_deceased);
    }

    #[tokio::test]
    async fn test_fulfillment_is_immutable() {
        let gateway = InMemoryGateway::default();
        let donor = Uuid::new_v4();
        let oracle = Uuid::new_v4();
        let request_id = gateway
            .request_verification(donor, Uuid::new_v4())
            .await
            .unwrap();

        gateway
            .fulfill(request_id, true, Some(CID.to_string()), oracle)
            .await
            .unwrap();

        let again = gateway.fulfill(request_id, false, None, oracle).await;
        assert!(matches!(again, Err(OdmsError::InvalidState { .. })));

        let status = gateway.get_status(request_id).await.unwrap();
        assert!(status.fulfilled && status.is_deceased);
    }

    #[tokio::test]
    async fn test_new_request_allowed_after_fulfillment() {
        let gateway = InMemoryGateway::default();
        let donor = Uuid::new_v4();
        let requester = Uuid::new_v4();

        let first = gateway.request_verification(donor, requester).await.unwrap();
        gateway
            .fulfill(first, false, None, Uuid::new_v4())
            .await
            .unwrap();

        // 前一请求已完成，可以再次发起
        assert!(gateway.request_verification(donor, requester).await.is_ok());
    }

    #[tokio::test]
    async fn test_fulfillment_broadcasts_event() {
        let gateway = InMemoryGateway::default();
        let mut rx = gateway.subscribe();
        let donor = Uuid::new_v4();

        let request_id = gateway
            .request_verification(donor, Uuid::new_v4())
            .await
            .unwrap();
        gateway
            .fulfill(request_id, true, Some(CID.to_string()), Uuid::new_v4())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.request_id, request_id);
        assert_eq!(event.donor_id, donor);
        assert!(event.is_deceased);
        assert_eq!(event.event_type(), "attestation.deceased");
    }

    #[tokio::test]
    async fn test_malformed_evidence_rejected() {
        let gateway = InMemoryGateway::default();
        let request_id = gateway
            .request_verification(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();

        let result = gateway
            .fulfill(request_id, true, Some("not a cid".to_string()), Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(OdmsError::InvalidInput(_))));

        // 请求保持未完成
        let status = gateway.get_status(request_id).await.unwrap();
        assert!(!status.fulfilled);
    }
}
