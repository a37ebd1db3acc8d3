//! 分配引擎
//!
//! 协调注册中心、等待列表、评分器与状态机的核心引擎，
//! 执行常规与紧急两条分配路径并记录匹配提案

use chrono::{Duration, Utc};
use odms_core::{
    MatchProposal, MatchScore, MedicalStatus, OdmsError, Organ, OrganStatus, OrganType,
    PriorityLevel, ProposalStatus, Region, Result, WaitingListEntry,
};
use odms_registry::RegistryStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    policy::MatchingPolicy,
    scoring::CompatibilityScorer,
    state_machine::{OrganEvent, OrganStateMachine, ProposalEvent, ProposalStateMachine},
    waiting_list::WaitingListManager,
};

/// 紧急分配路径的紧急度下限
const EMERGENCY_URGENCY_CEILING: u8 = 10;

/// 器官登记请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganRegistration {
    pub donor_id: Uuid,
    pub organ_type: OrganType,
    pub origin_region: Region,
    pub is_emergency: bool,
    pub urgency_level: u8,
    pub medical_validated: bool,
    /// 摘取后可存活小时数，决定过期时间
    pub viability_hours: u32,
}

/// 排序后的候选受体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub recipient_id: Uuid,
    pub score: MatchScore,
}

/// 引擎内部共享状态
///
/// 等待列表与提案账本放在同一把锁下，
/// 跨实体变更在单一临界区内整体生效
#[derive(Debug, Default)]
struct MatchingState {
    waiting: WaitingListManager,
    proposals: HashMap<Uuid, MatchProposal>,
    organ_proposals: HashMap<Uuid, Uuid>, // organ_id -> 最近一次提案
}

/// 分配引擎
///
/// 所有写操作串行通过状态写锁；读操作（评分、队列查询）
/// 持读锁观察到的必然是变更前或变更后的完整快照
#[derive(Debug)]
pub struct AllocationEngine<R: RegistryStore> {
    registry: Arc<R>,
    scorer: CompatibilityScorer,
    policy: MatchingPolicy,
    organ_sm: OrganStateMachine,
    proposal_sm: ProposalStateMachine,
    state: Arc<RwLock<MatchingState>>,
}

impl<R: RegistryStore> AllocationEngine<R> {
    /// 创建新的分配引擎
    pub fn new(registry: Arc<R>, policy: MatchingPolicy) -> Self {
        Self {
            registry,
            scorer: CompatibilityScorer::new(policy.clone()),
            policy,
            organ_sm: OrganStateMachine::new(),
            proposal_sm: ProposalStateMachine::new(),
            state: Arc::new(RwLock::new(MatchingState::default())),
        }
    }

    // ---- 器官登记 ----

    /// 登记摘取的器官
    ///
    /// 供体死亡验证是器官释放的前置门槛：未经预言机证明的供体返回 NotEligible
    pub async fn register_organ(&self, registration: OrganRegistration) -> Result<Organ> {
        if !(1..=10).contains(&registration.urgency_level) {
            return Err(OdmsError::InvalidInput(format!(
                "urgency level {} out of range 1-10",
                registration.urgency_level
            )));
        }

        let donor = self
            .registry
            .get_donor(registration.donor_id)
            .await?
            .ok_or_else(|| OdmsError::NotFound(format!("donor {}", registration.donor_id)))?;

        if !donor.death_verified {
            return Err(OdmsError::NotEligible(format!(
                "donor {} death not verified by attestation oracle",
                donor.id
            )));
        }

        let now = Utc::now();
        let organ = Organ {
            id: Uuid::new_v4(),
            organ_type: registration.organ_type,
            blood_type: donor.blood_type,
            donor_id: donor.id,
            origin_region: registration.origin_region,
            status: OrganStatus::Available,
            is_emergency: registration.is_emergency,
            urgency_level: registration.urgency_level,
            medical_validated: registration.medical_validated,
            assigned_recipient: None,
            assigned_hospital: None,
            donated_at: now,
            expires_at: now + Duration::hours(i64::from(registration.viability_hours)),
        };

        self.registry.put_organ(organ.clone()).await?;
        tracing::info!(
            "Registered {} {} from donor {} (region {}, expires {})",
            organ.blood_type,
            organ.organ_type,
            organ.donor_id,
            organ.origin_region,
            organ.expires_at
        );
        Ok(organ)
    }

    // ---- 等待列表操作 ----

    /// 受体登记进入等待列表
    pub async fn add_to_waiting_list(
        &self,
        recipient_id: Uuid,
        organ_type: OrganType,
        urgency_level: u8,
        region: Region,
        priority: PriorityLevel,
    ) -> Result<WaitingListEntry> {
        let recipient = self
            .registry
            .get_recipient(recipient_id)
            .await?
            .ok_or_else(|| OdmsError::NotFound(format!("recipient {}", recipient_id)))?;

        if !recipient.awaiting_transplant() {
            return Err(OdmsError::NotEligible(format!(
                "recipient {} is {:?}, cannot join waiting list",
                recipient_id, recipient.medical_status
            )));
        }

        let mut state = self.state.write().await;
        state
            .waiting
            .add(recipient_id, organ_type, urgency_level, region, priority)
    }

    /// 原始队列（登记顺序）
    pub async fn waitlist(&self, organ_type: OrganType, region: &Region) -> Vec<WaitingListEntry> {
        self.state
            .read()
            .await
            .waiting
            .get_by_organ_region(organ_type, region)
    }

    /// 优先级排序后的队列
    pub async fn prioritized_waitlist(
        &self,
        organ_type: OrganType,
        region: &Region,
    ) -> Vec<WaitingListEntry> {
        self.state.read().await.waiting.prioritize(organ_type, region)
    }

    /// 更新等待条目的紧急度与优先级
    pub async fn update_waiting_priority(
        &self,
        recipient_id: Uuid,
        organ_type: OrganType,
        urgency_level: u8,
        priority: PriorityLevel,
        region: Region,
    ) -> Result<WaitingListEntry> {
        let mut state = self.state.write().await;
        state
            .waiting
            .update_priority(recipient_id, organ_type, urgency_level, priority, region)
    }

    /// 受体撤回等待（或因死亡/退出停用条目），幂等
    pub async fn withdraw_from_waiting_list(
        &self,
        recipient_id: Uuid,
        organ_type: OrganType,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.waiting.deactivate(recipient_id, organ_type)
    }

    // ---- 匹配查询 ----

    /// 廉价预筛选：器官类型匹配、条目活跃、血型相容、受体仍在等待
    ///
    /// 不做评分
    pub async fn find_compatible_recipients(&self, organ_id: Uuid) -> Result<Vec<Uuid>> {
        let organ = self.get_organ(organ_id).await?;
        let entries = {
            let state = self.state.read().await;
            state.waiting.entries_for_organ_type(organ.organ_type)
        };

        let mut compatible = Vec::new();
        for entry in entries {
            let recipient = match self.registry.get_recipient(entry.recipient_id).await? {
                Some(r) => r,
                None => {
                    tracing::warn!(
                        "Waiting list entry {} references missing recipient {}",
                        entry.id,
                        entry.recipient_id
                    );
                    continue;
                }
            };
            if recipient.awaiting_transplant()
                && organ.blood_type.can_donate_to(&recipient.blood_type)
            {
                compatible.push(recipient.id);
            }
        }
        Ok(compatible)
    }

    /// 计算单个 (器官, 受体) 匹配评分
    pub async fn calculate_match_score(
        &self,
        organ_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<MatchScore> {
        let organ = self.get_organ(organ_id).await?;
        let recipient = self
            .registry
            .get_recipient(recipient_id)
            .await?
            .ok_or_else(|| OdmsError::NotFound(format!("recipient {}", recipient_id)))?;

        let entry = {
            let state = self.state.read().await;
            state
                .waiting
                .active_entry(recipient_id, organ.organ_type)
                .cloned()
        }
        .ok_or_else(|| {
            OdmsError::NotEligible(format!(
                "recipient {} has no active {} waiting entry",
                recipient_id, organ.organ_type
            ))
        })?;

        Ok(self.scorer.score(&organ, &recipient, &entry, Utc::now()))
    }

    /// 候选受体排序
    ///
    /// 常规分配的决胜规则：总分降序 → 登记时间升序（等待最久优先）→ 登记顺序
    pub async fn rank_candidates(&self, organ_id: Uuid) -> Result<Vec<RankedCandidate>> {
        let organ = self.get_organ(organ_id).await?;
        let entries = {
            let state = self.state.read().await;
            state.waiting.entries_for_organ_type(organ.organ_type)
        };

        let now = Utc::now();
        let mut scored = Vec::new();
        for entry in entries {
            let recipient = match self.registry.get_recipient(entry.recipient_id).await? {
                Some(r) => r,
                None => {
                    tracing::warn!(
                        "Waiting list entry {} references missing recipient {}",
                        entry.id,
                        entry.recipient_id
                    );
                    continue;
                }
            };
            if !recipient.awaiting_transplant()
                || !organ.blood_type.can_donate_to(&recipient.blood_type)
            {
                continue;
            }
            let score = self.scorer.score(&organ, &recipient, &entry, now);
            scored.push((entry.added_at, RankedCandidate { recipient_id: recipient.id, score }));
        }

        scored.sort_by(|a, b| {
            b.1.score
                .total
                .cmp(&a.1.score.total)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(scored.into_iter().map(|(_, candidate)| candidate).collect())
    }

    // ---- 分配操作 ----

    /// 常规分配
    ///
    /// 前置条件：器官 Available 且受体持有该器官类型的活跃等待条目。
    /// 四项效果（器官置 Matched 并指派、条目停用、提案记录）在同一临界区内
    /// 整体生效：并发的第二次调用观察到 Matched 后以 NotEligible 失败。
    pub async fn allocate_organ(
        &self,
        organ_id: Uuid,
        recipient_id: Uuid,
        hospital_id: Uuid,
    ) -> Result<MatchProposal> {
        let mut state = self.state.write().await;
        self.allocate_locked(&mut state, organ_id, recipient_id, Some(hospital_id))
            .await
    }

    /// 紧急匹配
    ///
    /// 仅限紧急器官（is_emergency 或紧急度达上限）。跨区域扫描 maxDistance
    /// 范围内的等待条目，忽略常规区域边界，选出评分最高的相容候选并分配。
    pub async fn trigger_emergency_match(
        &self,
        organ_id: Uuid,
        max_distance: u32,
    ) -> Result<MatchProposal> {
        let mut state = self.state.write().await;

        let organ = self.get_organ(organ_id).await?;
        if !organ.is_emergency && organ.urgency_level < EMERGENCY_URGENCY_CEILING {
            return Err(OdmsError::NotEligible(format!(
                "organ {} is not an emergency case",
                organ_id
            )));
        }
        if organ.status != OrganStatus::Available {
            return Err(OdmsError::NotEligible(format!(
                "organ {} is {:?}, not Available",
                organ_id, organ.status
            )));
        }

        let entries = state.waiting.entries_for_organ_type(organ.organ_type);
        let now = Utc::now();
        let mut best: Option<(MatchScore, WaitingListEntry)> = None;

        for entry in entries {
            let distance = self
                .policy
                .region_distance(&organ.origin_region, &entry.region);
            if distance > max_distance {
                continue;
            }
            let recipient = match self.registry.get_recipient(entry.recipient_id).await? {
                Some(r) => r,
                None => {
                    tracing::warn!(
                        "Waiting list entry {} references missing recipient {}",
                        entry.id,
                        entry.recipient_id
                    );
                    continue;
                }
            };
            if !recipient.awaiting_transplant() {
                continue;
            }
            let score = self.scorer.score(&organ, &recipient, &entry, now);
            if !score.is_compatible {
                continue;
            }
            let is_better = match &best {
                None => true,
                Some((best_score, best_entry)) => {
                    score.total > best_score.total
                        || (score.total == best_score.total && entry.added_at < best_entry.added_at)
                }
            };
            if is_better {
                best = Some((score, entry));
            }
        }

        let (score, entry) = best.ok_or_else(|| {
            OdmsError::NoCandidate(format!(
                "no compatible recipient within distance {} for organ {}",
                max_distance, organ_id
            ))
        })?;

        tracing::warn!(
            "Emergency match for organ {}: recipient {} (score {}, region {})",
            organ_id,
            entry.recipient_id,
            score.total,
            entry.region
        );
        self.allocate_locked(&mut state, organ_id, entry.recipient_id, None)
            .await
    }

    /// 在已持有的写锁内执行分配
    ///
    /// 所有校验先于任何变更；紧急路径的提案不携带发起医院
    async fn allocate_locked(
        &self,
        state: &mut MatchingState,
        organ_id: Uuid,
        recipient_id: Uuid,
        hospital_id: Option<Uuid>,
    ) -> Result<MatchProposal> {
        let organ = self.get_organ(organ_id).await?;

        let next_status = self
            .organ_sm
            .transition(&organ.status, &OrganEvent::Allocated)
            .map_err(|_| {
                OdmsError::NotEligible(format!(
                    "organ {} is {:?}, not Available",
                    organ_id, organ.status
                ))
            })?;

        let recipient = self
            .registry
            .get_recipient(recipient_id)
            .await?
            .ok_or_else(|| OdmsError::NotFound(format!("recipient {}", recipient_id)))?;

        if let Some(hospital_id) = hospital_id {
            self.registry
                .get_hospital(hospital_id)
                .await?
                .ok_or_else(|| OdmsError::NotFound(format!("hospital {}", hospital_id)))?;
        }

        let entry = state
            .waiting
            .active_entry(recipient_id, organ.organ_type)
            .cloned()
            .ok_or_else(|| {
                OdmsError::NotEligible(format!(
                    "recipient {} has no active {} waiting entry",
                    recipient_id, organ.organ_type
                ))
            })?;

        let now = Utc::now();
        let score = self.scorer.score(&organ, &recipient, &entry, now);

        let mut updated = organ;
        updated.status = next_status;
        updated.assigned_recipient = Some(recipient_id);
        updated.assigned_hospital = hospital_id;
        self.registry.put_organ(updated).await?;

        state.waiting.deactivate(recipient_id, entry.organ_type)?;

        let proposal = MatchProposal {
            id: Uuid::new_v4(),
            organ_id,
            recipient_id,
            proposing_hospital: hospital_id,
            score,
            status: ProposalStatus::Matched,
            proposed_at: now,
        };
        state.proposals.insert(proposal.id, proposal.clone());
        state.organ_proposals.insert(organ_id, proposal.id);

        tracing::info!(
            "Allocated organ {} to recipient {} (proposal {}, score {})",
            organ_id,
            recipient_id,
            proposal.id,
            score.total
        );
        Ok(proposal)
    }

    // ---- 提案生命周期 ----

    /// 医院确认提案
    pub async fn confirm_proposal(
        &self,
        proposal_id: Uuid,
        hospital_id: Uuid,
    ) -> Result<MatchProposal> {
        self.registry
            .get_hospital(hospital_id)
            .await?
            .ok_or_else(|| OdmsError::NotFound(format!("hospital {}", hospital_id)))?;

        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get(&proposal_id)
            .cloned()
            .ok_or_else(|| OdmsError::NotFound(format!("proposal {}", proposal_id)))?;

        let next = self
            .proposal_sm
            .transition(&proposal.status, &ProposalEvent::Confirmed)?;

        // 紧急提案在确认时落定承接医院
        let organ = self.get_organ(proposal.organ_id).await?;
        if organ.status == OrganStatus::Matched && organ.assigned_hospital.is_none() {
            let mut updated = organ;
            updated.assigned_hospital = Some(hospital_id);
            self.registry.put_organ(updated).await?;
        }

        let stored = state
            .proposals
            .get_mut(&proposal_id)
            .ok_or_else(|| OdmsError::Internal(format!("proposal {} vanished", proposal_id)))?;
        stored.status = next;
        if stored.proposing_hospital.is_none() {
            stored.proposing_hospital = Some(hospital_id);
        }

        tracing::info!("Proposal {} confirmed by hospital {}", proposal_id, hospital_id);
        Ok(stored.clone())
    }

    /// 医院拒绝提案
    ///
    /// 器官由 Matched 回到 Available 待复核；
    /// 受体等待条目保持停用，重新入队须显式登记
    pub async fn reject_proposal(&self, proposal_id: Uuid) -> Result<MatchProposal> {
        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get(&proposal_id)
            .cloned()
            .ok_or_else(|| OdmsError::NotFound(format!("proposal {}", proposal_id)))?;

        let next_proposal = self
            .proposal_sm
            .transition(&proposal.status, &ProposalEvent::Rejected)?;

        let organ = self.get_organ(proposal.organ_id).await?;
        let next_organ = self
            .organ_sm
            .transition(&organ.status, &OrganEvent::AllocationRejected)?;

        let mut updated = organ;
        updated.status = next_organ;
        updated.assigned_recipient = None;
        updated.assigned_hospital = None;
        self.registry.put_organ(updated).await?;

        let stored = state
            .proposals
            .get_mut(&proposal_id)
            .ok_or_else(|| OdmsError::Internal(format!("proposal {} vanished", proposal_id)))?;
        stored.status = next_proposal;

        tracing::warn!(
            "Proposal {} rejected; organ {} returned to Available for manual review",
            proposal_id,
            proposal.organ_id
        );
        Ok(stored.clone())
    }

    // ---- 器官终态操作 ----

    /// 移植完成
    ///
    /// 仅允许 Matched 器官，其余状态返回 InvalidState
    pub async fn mark_transplanted(&self, organ_id: Uuid) -> Result<Organ> {
        let _state = self.state.write().await;

        let organ = self.get_organ(organ_id).await?;
        let next = self
            .organ_sm
            .transition(&organ.status, &OrganEvent::TransplantCompleted)?;
        let recipient_id = organ.assigned_recipient.ok_or_else(|| {
            OdmsError::Internal(format!("matched organ {} has no assigned recipient", organ_id))
        })?;

        let mut updated = organ;
        updated.status = next;
        self.registry.put_organ(updated.clone()).await?;
        self.registry
            .set_recipient_status(recipient_id, MedicalStatus::Transplanted)
            .await?;

        tracing::info!(
            "Organ {} transplanted into recipient {}",
            organ_id,
            recipient_id
        );
        Ok(updated)
    }

    /// 器官过期
    ///
    /// Available 或 Matched 均可过期；先前 Matched 的器官其提案同步置 Expired，
    /// 受体等待条目不自动恢复，失败的分配需人工复核后重新登记
    pub async fn mark_expired(&self, organ_id: Uuid) -> Result<Organ> {
        let mut state = self.state.write().await;

        let organ = self.get_organ(organ_id).await?;
        let next = self
            .organ_sm
            .transition(&organ.status, &OrganEvent::Expired)?;
        let was_matched = organ.status == OrganStatus::Matched;

        let mut updated = organ;
        updated.status = next;
        updated.assigned_recipient = None;
        updated.assigned_hospital = None;
        self.registry.put_organ(updated.clone()).await?;

        if was_matched {
            if let Some(proposal_id) = state.organ_proposals.get(&organ_id).copied() {
                if let Some(proposal) = state.proposals.get_mut(&proposal_id) {
                    if let Ok(next) = self
                        .proposal_sm
                        .transition(&proposal.status, &ProposalEvent::Expired)
                    {
                        proposal.status = next;
                        tracing::info!("Proposal {} expired with organ {}", proposal_id, organ_id);
                    }
                }
            }
        }

        tracing::warn!("Organ {} expired", organ_id);
        Ok(updated)
    }

    // ---- 预言机事件 ----

    /// 处理死亡证明事件
    ///
    /// 幂等：重复通知与未知供体的事件不构成错误
    pub async fn handle_attestation(
        &self,
        request_id: Uuid,
        donor_id: Uuid,
        is_deceased: bool,
    ) -> Result<()> {
        if !is_deceased {
            tracing::debug!(
                "Attestation {} reports donor {} alive; no action",
                request_id,
                donor_id
            );
            return Ok(());
        }

        match self.registry.set_donor_death_verified(donor_id).await {
            Ok(true) => {
                tracing::info!(
                    "Donor {} death verified via attestation request {}",
                    donor_id,
                    request_id
                );
                Ok(())
            }
            Ok(false) => {
                tracing::debug!(
                    "Duplicate attestation {} for donor {} ignored",
                    request_id,
                    donor_id
                );
                Ok(())
            }
            Err(OdmsError::NotFound(_)) => {
                tracing::warn!(
                    "Attestation {} references unknown donor {}",
                    request_id,
                    donor_id
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ---- 查询 ----

    pub async fn get_proposal(&self, proposal_id: Uuid) -> Option<MatchProposal> {
        self.state.read().await.proposals.get(&proposal_id).cloned()
    }

    pub async fn proposal_for_organ(&self, organ_id: Uuid) -> Option<MatchProposal> {
        let state = self.state.read().await;
        state
            .organ_proposals
            .get(&organ_id)
            .and_then(|id| state.proposals.get(id))
            .cloned()
    }

    async fn get_organ(&self, organ_id: Uuid) -> Result<Organ> {
        self.registry
            .get_organ(organ_id)
            .await?
            .ok_or_else(|| OdmsError::NotFound(format!("organ {}", organ_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odms_core::{BloodType, Donor, Hospital, Recipient};
    use odms_registry::InMemoryRegistry;

    fn engine() -> (AllocationEngine<InMemoryRegistry>, Arc<InMemoryRegistry>) {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = AllocationEngine::new(registry.clone(), MatchingPolicy::default());
        (engine, registry)
    }

    async fn seed_donor(registry: &InMemoryRegistry, blood: BloodType, verified: bool) -> Uuid {
        let donor = Donor {
            id: Uuid::new_v4(),
            blood_type: blood,
            death_verified: verified,
            registered_at: Utc::now(),
        };
        registry.put_donor(donor.clone()).await.unwrap();
        donor.id
    }

    async fn seed_recipient(registry: &InMemoryRegistry, blood: BloodType, region: &str) -> Uuid {
        let recipient = Recipient {
            id: Uuid::new_v4(),
            blood_type: blood,
            medical_status: MedicalStatus::Waiting,
            region: Region::new(region),
            registered_at: Utc::now(),
        };
        registry.put_recipient(recipient.clone()).await.unwrap();
        recipient.id
    }

    async fn seed_hospital(registry: &InMemoryRegistry, region: &str) -> Uuid {
        let hospital = Hospital {
            id: Uuid::new_v4(),
            name: "仁济医院".to_string(),
            region: Region::new(region),
            registered_at: Utc::now(),
        };
        registry.put_hospital(hospital.clone()).await.unwrap();
        hospital.id
    }

    async fn seed_organ(
        engine: &AllocationEngine<InMemoryRegistry>,
        registry: &InMemoryRegistry,
        blood: BloodType,
        organ_type: OrganType,
        region: &str,
        is_emergency: bool,
        urgency_level: u8,
    ) -> Organ {
        let donor_id = seed_donor(registry, blood, true).await;
        engine
            .register_organ(OrganRegistration {
                donor_id,
                organ_type,
                origin_region: Region::new(region),
                is_emergency,
                urgency_level,
                medical_validated: true,
                viability_hours: 24,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_organ_requires_verified_donor() {
        let (engine, registry) = engine();
        let donor_id = seed_donor(&registry, BloodType::ONeg, false).await;

        let result = engine
            .register_organ(OrganRegistration {
                donor_id,
                organ_type: OrganType::Liver,
                origin_region: Region::new("X"),
                is_emergency: false,
                urgency_level: 5,
                medical_validated: true,
                viability_hours: 12,
            })
            .await;
        assert!(matches!(result, Err(OdmsError::NotEligible(_))));
    }

    #[tokio::test]
    async fn test_normal_allocation_scenario() {
        // R1 (O-, 紧急度8, 区域X, 先登记)，R2 (A+, 紧急度8, 区域X, 后登记)
        // O- 肝脏到达区域X：两者均相容，R1 因登记更早排前，分配给 R1
        let (engine, registry) = engine();
        let r1 = seed_recipient(&registry, BloodType::ONeg, "X").await;
        let r2 = seed_recipient(&registry, BloodType::APos, "X").await;
        let hospital = seed_hospital(&registry, "X").await;

        engine
            .add_to_waiting_list(r1, OrganType::Liver, 8, Region::new("X"), PriorityLevel::High)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        engine
            .add_to_waiting_list(r2, OrganType::Liver, 8, Region::new("X"), PriorityLevel::High)
            .await
            .unwrap();

        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Liver, "X", false, 5).await;

        let compatible = engine.find_compatible_recipients(organ.id).await.unwrap();
        assert_eq!(compatible.len(), 2);
        assert!(compatible.contains(&r1) && compatible.contains(&r2));

        let prioritized = engine
            .prioritized_waitlist(OrganType::Liver, &Region::new("X"))
            .await;
        assert_eq!(prioritized[0].recipient_id, r1);
        assert_eq!(prioritized[1].recipient_id, r2);

        let ranked = engine.rank_candidates(organ.id).await.unwrap();
        assert_eq!(ranked[0].recipient_id, r1);

        let proposal = engine.allocate_organ(organ.id, r1, hospital).await.unwrap();
        assert_eq!(proposal.status, ProposalStatus::Matched);
        assert_eq!(proposal.recipient_id, r1);

        let stored = registry.get_organ(organ.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrganStatus::Matched);
        assert_eq!(stored.assigned_recipient, Some(r1));
        assert!(stored.assignment_consistent());

        // R1 条目停用，R2 条目保持活跃
        let remaining = engine.waitlist(OrganType::Liver, &Region::new("X")).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].recipient_id, r2);
    }

    #[tokio::test]
    async fn test_double_allocation_fails_not_eligible() {
        let (engine, registry) = engine();
        let r1 = seed_recipient(&registry, BloodType::APos, "X").await;
        let r2 = seed_recipient(&registry, BloodType::APos, "X").await;
        let hospital = seed_hospital(&registry, "X").await;

        for r in [r1, r2] {
            engine
                .add_to_waiting_list(r, OrganType::Kidney, 6, Region::new("X"), PriorityLevel::Medium)
                .await
                .unwrap();
        }
        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Kidney, "X", false, 5).await;

        let first = engine.allocate_organ(organ.id, r1, hospital).await;
        assert!(first.is_ok());

        // 同一器官的第二次分配必须失败，不得产生第二个提案
        let second = engine.allocate_organ(organ.id, r2, hospital).await;
        assert!(matches!(second, Err(OdmsError::NotEligible(_))));

        let proposal = engine.proposal_for_organ(organ.id).await.unwrap();
        assert_eq!(proposal.recipient_id, r1);
    }

    #[tokio::test]
    async fn test_allocate_requires_active_entry() {
        let (engine, registry) = engine();
        let recipient = seed_recipient(&registry, BloodType::APos, "X").await;
        let hospital = seed_hospital(&registry, "X").await;
        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Heart, "X", false, 5).await;

        let result = engine.allocate_organ(organ.id, recipient, hospital).await;
        assert!(matches!(result, Err(OdmsError::NotEligible(_))));
    }

    #[tokio::test]
    async fn test_mark_expired_on_matched_organ() {
        let (engine, registry) = engine();
        let recipient = seed_recipient(&registry, BloodType::APos, "X").await;
        let hospital = seed_hospital(&registry, "X").await;

        engine
            .add_to_waiting_list(recipient, OrganType::Liver, 7, Region::new("X"), PriorityLevel::High)
            .await
            .unwrap();
        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Liver, "X", false, 5).await;
        let proposal = engine.allocate_organ(organ.id, recipient, hospital).await.unwrap();

        let expired = engine.mark_expired(organ.id).await.unwrap();
        assert_eq!(expired.status, OrganStatus::Expired);
        assert!(expired.assigned_recipient.is_none());

        // 提案同步失效
        let proposal = engine.get_proposal(proposal.id).await.unwrap();
        assert_eq!(proposal.status, ProposalStatus::Expired);

        // 受体等待条目不自动恢复
        assert!(engine.waitlist(OrganType::Liver, &Region::new("X")).await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_transplanted_requires_matched() {
        let (engine, registry) = engine();
        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Kidney, "X", false, 5).await;

        let result = engine.mark_transplanted(organ.id).await;
        assert!(matches!(result, Err(OdmsError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_transplant_completes_lifecycle() {
        let (engine, registry) = engine();
        let recipient = seed_recipient(&registry, BloodType::AbPos, "X").await;
        let hospital = seed_hospital(&registry, "X").await;

        engine
            .add_to_waiting_list(recipient, OrganType::Heart, 9, Region::new("X"), PriorityLevel::Critical)
            .await
            .unwrap();
        let organ =
            seed_organ(&engine, &registry, BloodType::BNeg, OrganType::Heart, "X", false, 5).await;
        let proposal = engine.allocate_organ(organ.id, recipient, hospital).await.unwrap();
        engine.confirm_proposal(proposal.id, hospital).await.unwrap();

        let transplanted = engine.mark_transplanted(organ.id).await.unwrap();
        assert_eq!(transplanted.status, OrganStatus::Transplanted);
        assert_eq!(transplanted.assigned_recipient, Some(recipient));

        let stored = registry.get_recipient(recipient).await.unwrap().unwrap();
        assert_eq!(stored.medical_status, MedicalStatus::Transplanted);
    }

    #[tokio::test]
    async fn test_reject_proposal_returns_organ_to_available() {
        let (engine, registry) = engine();
        let recipient = seed_recipient(&registry, BloodType::APos, "X").await;
        let hospital = seed_hospital(&registry, "X").await;

        engine
            .add_to_waiting_list(recipient, OrganType::Liver, 6, Region::new("X"), PriorityLevel::Medium)
            .await
            .unwrap();
        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Liver, "X", false, 5).await;
        let proposal = engine.allocate_organ(organ.id, recipient, hospital).await.unwrap();

        let rejected = engine.reject_proposal(proposal.id).await.unwrap();
        assert_eq!(rejected.status, ProposalStatus::Rejected);

        let stored = registry.get_organ(organ.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrganStatus::Available);
        assert!(stored.assigned_recipient.is_none());
        assert!(stored.assignment_consistent());

        // 条目保持停用，需显式重新登记
        assert!(engine.waitlist(OrganType::Liver, &Region::new("X")).await.is_empty());
    }

    #[tokio::test]
    async fn test_emergency_match_crosses_regions() {
        let (engine, registry) = engine();
        let remote = seed_recipient(&registry, BloodType::APos, "Y").await;

        engine
            .add_to_waiting_list(remote, OrganType::Heart, 9, Region::new("Y"), PriorityLevel::Critical)
            .await
            .unwrap();
        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Heart, "X", true, 9).await;

        let proposal = engine.trigger_emergency_match(organ.id, 2).await.unwrap();
        assert_eq!(proposal.recipient_id, remote);
        // 引擎发起的紧急提案不携带发起医院
        assert!(proposal.proposing_hospital.is_none());

        let stored = registry.get_organ(organ.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrganStatus::Matched);
    }

    #[tokio::test]
    async fn test_emergency_match_respects_max_distance() {
        let (engine, registry) = engine();
        let remote = seed_recipient(&registry, BloodType::APos, "Y").await;

        engine
            .add_to_waiting_list(remote, OrganType::Heart, 9, Region::new("Y"), PriorityLevel::Critical)
            .await
            .unwrap();
        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Heart, "X", true, 9).await;

        // 距离0范围内只有本区域，唯一候选在区域Y之外
        let result = engine.trigger_emergency_match(organ.id, 0).await;
        assert!(matches!(result, Err(OdmsError::NoCandidate(_))));
    }

    #[tokio::test]
    async fn test_emergency_match_rejects_routine_organ() {
        let (engine, registry) = engine();
        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Liver, "X", false, 5).await;

        let result = engine.trigger_emergency_match(organ.id, 3).await;
        assert!(matches!(result, Err(OdmsError::NotEligible(_))));
    }

    #[tokio::test]
    async fn test_attestation_handling_is_idempotent() {
        let (engine, registry) = engine();
        let donor_id = seed_donor(&registry, BloodType::ONeg, false).await;
        let request_id = Uuid::new_v4();

        engine
            .handle_attestation(request_id, donor_id, true)
            .await
            .unwrap();
        // 重复通知与未知供体均不报错
        engine
            .handle_attestation(request_id, donor_id, true)
            .await
            .unwrap();
        engine
            .handle_attestation(Uuid::new_v4(), Uuid::new_v4(), true)
            .await
            .unwrap();

        let donor = registry.get_donor(donor_id).await.unwrap().unwrap();
        assert!(donor.death_verified);
    }

    #[tokio::test]
    async fn test_calculate_match_score_resolves_refs() {
        let (engine, registry) = engine();
        let recipient = seed_recipient(&registry, BloodType::APos, "X").await;

        let missing_organ = engine.calculate_match_score(Uuid::new_v4(), recipient).await;
        assert!(matches!(missing_organ, Err(OdmsError::NotFound(_))));

        let organ =
            seed_organ(&engine, &registry, BloodType::ONeg, OrganType::Liver, "X", false, 5).await;
        let missing_recipient = engine.calculate_match_score(organ.id, Uuid::new_v4()).await;
        assert!(matches!(missing_recipient, Err(OdmsError::NotFound(_))));

        engine
            .add_to_waiting_list(recipient, OrganType::Liver, 8, Region::new("X"), PriorityLevel::High)
            .await
            .unwrap();
        let score = engine.calculate_match_score(organ.id, recipient).await.unwrap();
        assert!(score.is_compatible);
        assert_eq!(
            score.total,
            score.blood + score.urgency + score.waiting_time + score.geographic + score.medical
        );
    }
}
