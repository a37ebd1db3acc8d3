//! Web服务器

use axum::{
    routing::{get, post, put},
    Router,
};
use odms_core::Result;
use odms_matching::AllocationEngine;
use odms_oracle::InMemoryGateway;
use odms_registry::InMemoryRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::access::AccessPolicy;
use crate::handlers::{
    add_waitlist_entry, allocate, api_root, confirm_proposal, emergency_match,
    fulfill_verification, get_verification, get_waitlist, health, mark_expired,
    mark_transplanted, match_score, organ_candidates, register_donor, register_hospital,
    register_organ, register_recipient, reject_proposal, request_verification,
    update_waitlist_priority, withdraw_waitlist_entry,
};

/// 服务共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AllocationEngine<InMemoryRegistry>>,
    pub registry: Arc<InMemoryRegistry>,
    pub gateway: Arc<InMemoryGateway>,
    pub access: Arc<AccessPolicy>,
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = Self::create_app(state);
        Self { addr, app }
    }

    fn create_app(state: AppState) -> Router {
        Router::new()
            // 根路径
            .route("/", get(api_root))
            // 健康检查
            .route("/health", get(health))
            // API路由
            .nest("/api/v1", api_routes())
            .with_state(state)
            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting allocation API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// API v1 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        // 登记
        .route("/donors", post(register_donor))
        .route("/recipients", post(register_recipient))
        .route("/hospitals", post(register_hospital))
        .route("/organs", post(register_organ))
        // 等待列表
        .route("/waitlist", post(add_waitlist_entry))
        .route("/waitlist/priority", put(update_waitlist_priority))
        .route("/waitlist/withdraw", post(withdraw_waitlist_entry))
        .route("/waitlist/:organ_type/:region", get(get_waitlist))
        // 匹配与分配
        .route("/match-score", post(match_score))
        .route("/organs/:id/candidates", get(organ_candidates))
        .route("/allocate", post(allocate))
        .route("/emergency-match", post(emergency_match))
        // 提案与器官生命周期
        .route("/proposals/:id/confirm", post(confirm_proposal))
        .route("/proposals/:id/reject", post(reject_proposal))
        .route("/organs/:id/transplanted", post(mark_transplanted))
        .route("/organs/:id/expired", post(mark_expired))
        // 死亡验证
        .route("/verifications", post(request_verification))
        .route("/verifications/:id", get(get_verification))
        .route("/verifications/:id/fulfill", post(fulfill_verification))
}
