//! 能力访问策略
//!
//! API边界上基于调用方角色的能力检查，作为策略协作方注入；
//! 核心分配逻辑自身不做任何授权判断

use axum::http::HeaderMap;
use odms_core::{OdmsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 调用方角色头
pub const ROLE_HEADER: &str = "x-odms-role";

/// 调用方角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CallerRole {
    /// 管理员 - 全部能力
    Admin,
    /// 协调员 - 登记与分配
    Coordinator,
    /// 医院 - 分配提案与确认
    Hospital,
    /// 预言机操作员 - 完成验证请求
    OracleOperator,
    /// 只读用户
    Viewer,
}

impl TryFrom<&str> for CallerRole {
    type Error = OdmsError;

    fn try_from(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "admin" => Ok(CallerRole::Admin),
            "coordinator" => Ok(CallerRole::Coordinator),
            "hospital" => Ok(CallerRole::Hospital),
            "oracle" | "oracle-operator" => Ok(CallerRole::OracleOperator),
            "viewer" => Ok(CallerRole::Viewer),
            other => Err(OdmsError::Permission(format!("unknown role: {}", other))),
        }
    }
}

/// 操作能力
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Capability {
    RegisterRecords,     // 登记供体/受体/医院/器官
    ManageWaitlist,      // 等待列表增删改
    Allocate,            // 常规与紧急分配
    ConfirmProposal,     // 提案确认与拒绝
    RequestVerification, // 发起死亡验证
    FulfillVerification, // 完成死亡验证（预言机侧）
    ReadQueues,          // 查询队列与评分
}

/// 能力访问策略
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    grants: HashMap<CallerRole, HashSet<Capability>>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        use Capability::*;

        let mut grants: HashMap<CallerRole, HashSet<Capability>> = HashMap::new();
        grants.insert(
            CallerRole::Admin,
            [
                RegisterRecords,
                ManageWaitlist,
                Allocate,
                ConfirmProposal,
                RequestVerification,
                FulfillVerification,
                ReadQueues,
            ]
            .into(),
        );
        grants.insert(
            CallerRole::Coordinator,
            [
                RegisterRecords,
                ManageWaitlist,
                Allocate,
                RequestVerification,
                ReadQueues,
            ]
            .into(),
        );
        grants.insert(
            CallerRole::Hospital,
            [Allocate, ConfirmProposal, RequestVerification, ReadQueues].into(),
        );
        grants.insert(
            CallerRole::OracleOperator,
            [FulfillVerification, ReadQueues].into(),
        );
        grants.insert(CallerRole::Viewer, [ReadQueues].into());

        Self { grants }
    }
}

impl AccessPolicy {
    /// 检查角色是否持有能力
    pub fn authorize(&self, role: CallerRole, capability: Capability) -> Result<()> {
        let allowed = self
            .grants
            .get(&role)
            .map(|caps| caps.contains(&capability))
            .unwrap_or(false);

        if allowed {
            Ok(())
        } else {
            tracing::warn!("Role {:?} denied capability {:?}", role, capability);
            Err(OdmsError::Permission(format!(
                "role {:?} lacks capability {:?}",
                role, capability
            )))
        }
    }

    /// 从请求头解析角色并检查能力
    pub fn authorize_headers(&self, headers: &HeaderMap, capability: Capability) -> Result<CallerRole> {
        let role = headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                OdmsError::Permission(format!("missing {} header", ROLE_HEADER))
            })?;
        let role = CallerRole::try_from(role)?;
        self.authorize(role, capability)?;
        Ok(role)
    }
}
