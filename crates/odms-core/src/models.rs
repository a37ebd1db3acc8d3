//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 血型（ABO + Rh）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodType {
    /// ABO/Rh供血相容性判定
    ///
    /// O-为万能供体，AB+为万能受体，其余按相容对查表
    pub fn can_donate_to(&self, recipient: &BloodType) -> bool {
        use BloodType::*;
        match self {
            ONeg => true,
            OPos => matches!(recipient, OPos | APos | BPos | AbPos),
            ANeg => matches!(recipient, ANeg | APos | AbNeg | AbPos),
            APos => matches!(recipient, APos | AbPos),
            BNeg => matches!(recipient, BNeg | BPos | AbNeg | AbPos),
            BPos => matches!(recipient, BPos | AbPos),
            AbNeg => matches!(recipient, AbNeg | AbPos),
            AbPos => matches!(recipient, AbPos),
        }
    }
}

impl std::fmt::Display for BloodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BloodType::APos => "A+",
            BloodType::ANeg => "A-",
            BloodType::BPos => "B+",
            BloodType::BNeg => "B-",
            BloodType::AbPos => "AB+",
            BloodType::AbNeg => "AB-",
            BloodType::OPos => "O+",
            BloodType::ONeg => "O-",
        };
        write!(f, "{}", s)
    }
}

/// 器官类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrganType {
    Heart,  // 心脏
    Liver,  // 肝脏
    Kidney, // 肾脏
}

impl std::fmt::Display for OrganType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrganType::Heart => write!(f, "Heart"),
            OrganType::Liver => write!(f, "Liver"),
            OrganType::Kidney => write!(f, "Kidney"),
        }
    }
}

impl std::str::FromStr for OrganType {
    type Err = crate::OdmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heart" => Ok(OrganType::Heart),
            "liver" => Ok(OrganType::Liver),
            "kidney" => Ok(OrganType::Kidney),
            other => Err(crate::OdmsError::InvalidInput(format!(
                "unknown organ type: {}",
                other
            ))),
        }
    }
}

/// 地域标识
///
/// 区域编码（如 "CN-SH"），等待队列按 (器官类型, 区域) 维护
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(pub String);

impl Region {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 器官状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrganStatus {
    Available,    // 可分配
    Matched,      // 已匹配
    Transplanted, // 已移植
    Expired,      // 已过期
    Rejected,     // 已废弃
}

/// 器官记录
///
/// 在供体死亡确认并完成摘取后创建；Transplanted/Expired/Rejected 为终态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organ {
    pub id: Uuid,
    pub organ_type: OrganType,
    pub blood_type: BloodType,
    pub donor_id: Uuid,
    pub origin_region: Region, // 摘取地区域
    pub status: OrganStatus,
    pub is_emergency: bool,
    pub urgency_level: u8, // 1-10
    pub medical_validated: bool, // 医学检测数据是否已验证
    pub assigned_recipient: Option<Uuid>,
    pub assigned_hospital: Option<Uuid>,
    pub donated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Organ {
    /// 不变式：仅 Matched/Transplanted 状态允许持有受体指派
    pub fn assignment_consistent(&self) -> bool {
        match self.status {
            OrganStatus::Matched | OrganStatus::Transplanted => self.assigned_recipient.is_some(),
            _ => self.assigned_recipient.is_none(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrganStatus::Transplanted | OrganStatus::Expired | OrganStatus::Rejected
        )
    }
}

/// 供体记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donor {
    pub id: Uuid,
    pub blood_type: BloodType,
    pub death_verified: bool, // 由预言机证明流程置位，且仅置位一次
    pub registered_at: DateTime<Utc>,
}

/// 受体医疗状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MedicalStatus {
    Waiting,      // 等待中
    Transplanted, // 已移植
    Critical,     // 危重
    Stable,       // 稳定
    Rejected,     // 已退出
}

/// 受体记录
///
/// 由注册中心持有；分配引擎只通过状态转换调用修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub blood_type: BloodType,
    pub medical_status: MedicalStatus,
    pub region: Region,
    pub registered_at: DateTime<Utc>,
}

impl Recipient {
    /// 是否处于可接受分配的医疗状态
    pub fn awaiting_transplant(&self) -> bool {
        matches!(
            self.medical_status,
            MedicalStatus::Waiting | MedicalStatus::Critical | MedicalStatus::Stable
        )
    }
}

/// 医院记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    pub region: Region,
    pub registered_at: DateTime<Utc>,
}

/// 等待列表优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityLevel {
    Low,       // 低
    Medium,    // 中
    High,      // 高
    Critical,  // 危重
    Emergency, // 紧急
}

/// 等待列表条目
///
/// 不变式：每个 (受体, 器官类型) 至多一个活跃条目；
/// Active → Inactive 不可逆，重新入队须新建条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingListEntry {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub organ_type: OrganType,
    pub urgency_level: u8, // 1-10
    pub region: Region,
    pub priority: PriorityLevel,
    pub added_at: DateTime<Utc>,
    pub is_active: bool,
}

/// 匹配评分
///
/// 不变式：total 为各分量之和（上限100）；
/// is_compatible 要求血型相容且 total 达到配置阈值
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchScore {
    pub total: u32,
    pub blood: u32,
    pub urgency: u32,
    pub waiting_time: u32,
    pub geographic: u32,
    pub medical: u32,
    pub is_compatible: bool,
}

/// 匹配提案状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProposalStatus {
    Pending,   // 待处理
    Matched,   // 已匹配
    Confirmed, // 已确认
    Rejected,  // 已拒绝
    Expired,   // 已过期
}

/// 匹配提案
///
/// 由分配引擎创建（status=Matched），后续转换由医院确认或超时驱动；
/// proposing_hospital 为 None 表示引擎发起的紧急匹配提案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchProposal {
    pub id: Uuid,
    pub organ_id: Uuid,
    pub recipient_id: Uuid,
    pub proposing_hospital: Option<Uuid>,
    pub score: MatchScore,
    pub status: ProposalStatus,
    pub proposed_at: DateTime<Utc>,
}

/// 死亡验证请求
///
/// fulfilled=true 后不可变更；每个供体同一时间至多一个未完成请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathVerificationRequest {
    pub request_id: Uuid,
    pub donor_id: Uuid,
    pub requester: Uuid,
    pub requested_at: DateTime<Utc>,
    pub fulfilled: bool,
    pub is_deceased: bool,
    pub evidence_cid: Option<String>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub fulfilled_by: Option<Uuid>,
}
