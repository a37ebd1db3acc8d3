//! # ODMS匹配模块
//!
//! 提供完整的器官匹配与分配功能，包括：
//! - 兼容性评分器：计算器官与受体的加权多因子匹配评分
//! - 等待列表管理：按器官类型与区域维护带紧急度元数据的有序队列
//! - 生命周期状态机：管理器官与匹配提案的状态转换
//! - 分配引擎：协调评分与等待列表遍历，执行常规与紧急分配决策

pub mod allocation;
pub mod policy;
pub mod scoring;
pub mod state_machine;
pub mod waiting_list;

// 重新导出主要类型
pub use allocation::{AllocationEngine, OrganRegistration, RankedCandidate};
pub use policy::{MatchingPolicy, ScoringWeights};
pub use scoring::CompatibilityScorer;
pub use state_machine::{OrganEvent, OrganStateMachine, ProposalEvent, ProposalStateMachine};
pub use waiting_list::WaitingListManager;
