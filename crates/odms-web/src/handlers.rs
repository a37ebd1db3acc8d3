//! HTTP处理器

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use odms_core::{
    BloodType, Donor, Hospital, OdmsError, OrganType, PriorityLevel, Recipient, Region,
    MedicalStatus,
};
use odms_matching::OrganRegistration;
use odms_oracle::AttestationGateway;
use odms_registry::RegistryStore;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::access::Capability;
use crate::server::AppState;

/// 统一错误响应
///
/// 业务错误按分类映射HTTP状态码，基础设施故障映射502由调用方重试
pub struct ApiError(pub OdmsError);

impl From<OdmsError> for ApiError {
    fn from(err: OdmsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            OdmsError::InvalidInput(_) | OdmsError::Serialization(_) => {
                (StatusCode::BAD_REQUEST, "invalid_input")
            }
            OdmsError::Permission(_) => (StatusCode::FORBIDDEN, "permission_denied"),
            OdmsError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            OdmsError::NoCandidate(_) => (StatusCode::NOT_FOUND, "no_candidate"),
            OdmsError::DuplicateEntry(_) => (StatusCode::CONFLICT, "duplicate_entry"),
            OdmsError::NotEligible(_) => (StatusCode::CONFLICT, "not_eligible"),
            OdmsError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
            OdmsError::AlreadyPending(_) => (StatusCode::CONFLICT, "already_pending"),
            OdmsError::Registry(_) | OdmsError::Gateway(_) | OdmsError::Network(_) => {
                (StatusCode::BAD_GATEWAY, "infrastructure")
            }
            OdmsError::Config(_) | OdmsError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        (
            status,
            Json(json!({
                "error": kind,
                "message": self.0.to_string(),
                "retriable": self.0.is_infrastructure(),
            })),
        )
            .into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "ODMS Allocation API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

// ---- 登记 ----

#[derive(Debug, Deserialize)]
pub struct RegisterDonorRequest {
    pub blood_type: BloodType,
}

pub async fn register_donor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterDonorRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::RegisterRecords)?;

    let donor = Donor {
        id: Uuid::new_v4(),
        blood_type: req.blood_type,
        death_verified: false,
        registered_at: Utc::now(),
    };
    state.registry.put_donor(donor.clone()).await?;
    Ok(Json(json!({ "donor": donor })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRecipientRequest {
    pub blood_type: BloodType,
    pub region: String,
}

pub async fn register_recipient(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRecipientRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::RegisterRecords)?;

    let recipient = Recipient {
        id: Uuid::new_v4(),
        blood_type: req.blood_type,
        medical_status: MedicalStatus::Waiting,
        region: Region::new(req.region),
        registered_at: Utc::now(),
    };
    state.registry.put_recipient(recipient.clone()).await?;
    Ok(Json(json!({ "recipient": recipient })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterHospitalRequest {
    pub name: String,
    pub region: String,
}

pub async fn register_hospital(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterHospitalRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::RegisterRecords)?;

    let hospital = Hospital {
        id: Uuid::new_v4(),
        name: req.name,
        region: Region::new(req.region),
        registered_at: Utc::now(),
    };
    state.registry.put_hospital(hospital.clone()).await?;
    Ok(Json(json!({ "hospital": hospital })))
}

pub async fn register_organ(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OrganRegistration>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::RegisterRecords)?;

    let organ = state.engine.register_organ(req).await?;
    Ok(Json(json!({ "organ": organ })))
}

// ---- 等待列表 ----

#[derive(Debug, Deserialize)]
pub struct WaitlistEntryRequest {
    pub recipient_id: Uuid,
    pub organ_type: OrganType,
    pub urgency_level: u8,
    pub region: String,
    pub priority: PriorityLevel,
}

pub async fn add_waitlist_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WaitlistEntryRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ManageWaitlist)?;

    let entry = state
        .engine
        .add_to_waiting_list(
            req.recipient_id,
            req.organ_type,
            req.urgency_level,
            Region::new(req.region),
            req.priority,
        )
        .await?;
    Ok(Json(json!({ "entry": entry })))
}

#[derive(Debug, Deserialize)]
pub struct WaitlistQueryParams {
    pub prioritized: Option<bool>,
}

pub async fn get_waitlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((organ_type, region)): Path<(String, String)>,
    Query(params): Query<WaitlistQueryParams>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ReadQueues)?;

    let organ_type: OrganType = organ_type.parse()?;
    let region = Region::new(region);
    let entries = if params.prioritized.unwrap_or(false) {
        state.engine.prioritized_waitlist(organ_type, &region).await
    } else {
        state.engine.waitlist(organ_type, &region).await
    };

    Ok(Json(json!({
        "organ_type": organ_type,
        "region": region,
        "total": entries.len(),
        "entries": entries,
    })))
}

pub async fn update_waitlist_priority(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WaitlistEntryRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ManageWaitlist)?;

    let entry = state
        .engine
        .update_waiting_priority(
            req.recipient_id,
            req.organ_type,
            req.urgency_level,
            req.priority,
            Region::new(req.region),
        )
        .await?;
    Ok(Json(json!({ "entry": entry })))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub recipient_id: Uuid,
    pub organ_type: OrganType,
}

pub async fn withdraw_waitlist_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ManageWaitlist)?;

    state
        .engine
        .withdraw_from_waiting_list(req.recipient_id, req.organ_type)
        .await?;
    Ok(Json(json!({ "withdrawn": true })))
}

// ---- 匹配与分配 ----

#[derive(Debug, Deserialize)]
pub struct MatchScoreRequest {
    pub organ_id: Uuid,
    pub recipient_id: Uuid,
}

pub async fn match_score(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MatchScoreRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ReadQueues)?;

    let score = state
        .engine
        .calculate_match_score(req.organ_id, req.recipient_id)
        .await?;
    Ok(Json(json!({ "score": score })))
}

pub async fn organ_candidates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(organ_id): Path<Uuid>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ReadQueues)?;

    let candidates = state.engine.rank_candidates(organ_id).await?;
    Ok(Json(json!({
        "organ_id": organ_id,
        "total": candidates.len(),
        "candidates": candidates,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub organ_id: Uuid,
    pub recipient_id: Uuid,
    pub hospital_id: Uuid,
}

pub async fn allocate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AllocateRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::Allocate)?;

    let proposal = state
        .engine
        .allocate_organ(req.organ_id, req.recipient_id, req.hospital_id)
        .await?;
    Ok(Json(json!({ "proposal": proposal })))
}

#[derive(Debug, Deserialize)]
pub struct EmergencyMatchRequest {
    pub organ_id: Uuid,
    pub max_distance: u32,
}

pub async fn emergency_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EmergencyMatchRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::Allocate)?;

    let proposal = state
        .engine
        .trigger_emergency_match(req.organ_id, req.max_distance)
        .await?;
    Ok(Json(json!({ "proposal": proposal })))
}

// ---- 提案与器官生命周期 ----

#[derive(Debug, Deserialize)]
pub struct ConfirmProposalRequest {
    pub hospital_id: Uuid,
}

pub async fn confirm_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(proposal_id): Path<Uuid>,
    Json(req): Json<ConfirmProposalRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ConfirmProposal)?;

    let proposal = state
        .engine
        .confirm_proposal(proposal_id, req.hospital_id)
        .await?;
    Ok(Json(json!({ "proposal": proposal })))
}

pub async fn reject_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(proposal_id): Path<Uuid>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ConfirmProposal)?;

    let proposal = state.engine.reject_proposal(proposal_id).await?;
    Ok(Json(json!({ "proposal": proposal })))
}

pub async fn mark_transplanted(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(organ_id): Path<Uuid>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ConfirmProposal)?;

    let organ = state.engine.mark_transplanted(organ_id).await?;
    Ok(Json(json!({ "organ": organ })))
}

pub async fn mark_expired(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(organ_id): Path<Uuid>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ManageWaitlist)?;

    let organ = state.engine.mark_expired(organ_id).await?;
    Ok(Json(json!({ "organ": organ })))
}

// ---- 死亡验证 ----

#[derive(Debug, Deserialize)]
pub struct RequestVerificationRequest {
    pub donor_id: Uuid,
    pub requester: Uuid,
}

pub async fn request_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RequestVerificationRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::RequestVerification)?;

    let request_id = state
        .gateway
        .request_verification(req.donor_id, req.requester)
        .await?;
    Ok(Json(json!({ "request_id": request_id })))
}

pub async fn get_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<Uuid>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::ReadQueues)?;

    let status = state.gateway.get_status(request_id).await?;
    Ok(Json(json!({ "request_id": request_id, "status": status })))
}

#[derive(Debug, Deserialize)]
pub struct FulfillVerificationRequest {
    pub is_deceased: bool,
    pub evidence_cid: Option<String>,
    pub oracle_id: Uuid,
}

pub async fn fulfill_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<Uuid>,
    Json(req): Json<FulfillVerificationRequest>,
) -> ApiResult {
    state
        .access
        .authorize_headers(&headers, Capability::FulfillVerification)?;

    let request = state
        .gateway
        .fulfill(request_id, req.is_deceased, req.evidence_cid, req.oracle_id)
        .await?;
    Ok(Json(json!({ "request": request })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                OdmsError::InvalidInput("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                OdmsError::NotFound("organ".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                OdmsError::DuplicateEntry("entry".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                OdmsError::NotEligible("not available".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                OdmsError::AlreadyPending("request".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                OdmsError::NoCandidate("none".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                OdmsError::Permission("denied".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (
                OdmsError::Registry("down".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
