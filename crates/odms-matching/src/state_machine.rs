//! 生命周期状态机
//!
//! 管理器官与匹配提案的状态转换规则

use odms_core::{OdmsError, OrganStatus, ProposalStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 器官状态转换事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrganEvent {
    Allocated,            // 分配给受体
    TransplantCompleted,  // 移植完成
    Expired,              // 超过保存时限
    AllocationRejected,   // 医院拒绝匹配提案
    Discarded,            // 质检不合格废弃
}

/// 器官状态机
#[derive(Debug)]
pub struct OrganStateMachine {
    transitions: HashMap<(OrganStatus, OrganEvent), OrganStatus>,
}

impl OrganStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert(
            (OrganStatus::Available, OrganEvent::Allocated),
            OrganStatus::Matched,
        );
        transitions.insert(
            (OrganStatus::Matched, OrganEvent::TransplantCompleted),
            OrganStatus::Transplanted,
        );
        transitions.insert(
            (OrganStatus::Available, OrganEvent::Expired),
            OrganStatus::Expired,
        );
        transitions.insert(
            (OrganStatus::Matched, OrganEvent::Expired),
            OrganStatus::Expired,
        );
        // 提案被拒绝后器官回到可分配状态，需显式重新分配
        transitions.insert(
            (OrganStatus::Matched, OrganEvent::AllocationRejected),
            OrganStatus::Available,
        );
        transitions.insert(
            (OrganStatus::Available, OrganEvent::Discarded),
            OrganStatus::Rejected,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: &OrganStatus, event: &OrganEvent) -> bool {
        self.transitions.contains_key(&(*from, event.clone()))
    }

    /// 执行状态转换
    pub fn transition(&self, from: &OrganStatus, event: &OrganEvent) -> Result<OrganStatus> {
        match self.transitions.get(&(*from, event.clone())) {
            Some(to) => Ok(*to),
            None => Err(OdmsError::InvalidState {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current: &OrganStatus) -> Vec<OrganEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| state == current)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Default for OrganStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// 提案状态转换事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProposalEvent {
    Confirmed, // 医院确认
    Rejected,  // 医院拒绝
    Expired,   // 超时
}

/// 匹配提案状态机
#[derive(Debug)]
pub struct ProposalStateMachine {
    transitions: HashMap<(ProposalStatus, ProposalEvent), ProposalStatus>,
}

impl ProposalStateMachine {
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert(
            (ProposalStatus::Matched, ProposalEvent::Confirmed),
            ProposalStatus::Confirmed,
        );
        transitions.insert(
            (ProposalStatus::Matched, ProposalEvent::Rejected),
            ProposalStatus::Rejected,
        );
        transitions.insert(
            (ProposalStatus::Matched, ProposalEvent::Expired),
            ProposalStatus::Expired,
        );
        // 已确认的提案在移植完成前仍可拒绝或失效
        transitions.insert(
            (ProposalStatus::Confirmed, ProposalEvent::Rejected),
            ProposalStatus::Rejected,
        );
        transitions.insert(
            (ProposalStatus::Confirmed, ProposalEvent::Expired),
            ProposalStatus::Expired,
        );
        transitions.insert(
            (ProposalStatus::Pending, ProposalEvent::Rejected),
            ProposalStatus::Rejected,
        );
        transitions.insert(
            (ProposalStatus::Pending, ProposalEvent::Expired),
            ProposalStatus::Expired,
        );

        Self { transitions }
    }

    pub fn can_transition(&self, from: &ProposalStatus, event: &ProposalEvent) -> bool {
        self.transitions.contains_key(&(*from, event.clone()))
    }

    pub fn transition(&self, from: &ProposalStatus, event: &ProposalEvent) -> Result<ProposalStatus> {
        match self.transitions.get(&(*from, event.clone())) {
            Some(to) => Ok(*to),
            None => Err(OdmsError::InvalidState {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }
}

impl Default for ProposalStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
