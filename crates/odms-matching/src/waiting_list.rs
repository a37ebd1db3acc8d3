//! 等待列表管理
//!
//! 按 (器官类型, 区域) 维护受体等待队列及其紧急度/优先级元数据

use chrono::Utc;
use odms_core::{OdmsError, OrganType, PriorityLevel, Region, Result, WaitingListEntry};
use std::collections::HashMap;
use uuid::Uuid;

/// 等待列表管理器
///
/// 条目状态机：Active → Inactive（分配、撤回或受体死亡），
/// 不可重新激活，重新入队必须新建条目
#[derive(Debug, Default)]
pub struct WaitingListManager {
    entries: HashMap<Uuid, WaitingListEntry>,
    queues: HashMap<(OrganType, Region), Vec<Uuid>>, // 登记顺序
    active_index: HashMap<(Uuid, OrganType), Uuid>,  // (recipient_id, organ_type) -> entry_id
}

impl WaitingListManager {
    /// 创建新的等待列表管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记等待条目
    ///
    /// 同一 (受体, 器官类型) 已存在活跃条目时返回 DuplicateEntry
    pub fn add(
        &mut self,
        recipient_id: Uuid,
        organ_type: OrganType,
        urgency_level: u8,
        region: Region,
        priority: PriorityLevel,
    ) -> Result<WaitingListEntry> {
        validate_urgency(urgency_level)?;

        if self.active_index.contains_key(&(recipient_id, organ_type)) {
            return Err(OdmsError::DuplicateEntry(format!(
                "recipient {} already has an active {} entry",
                recipient_id, organ_type
            )));
        }

        let entry = WaitingListEntry {
            id: Uuid::new_v4(),
            recipient_id,
            organ_type,
            urgency_level,
            region: region.clone(),
            priority,
            added_at: Utc::now(),
            is_active: true,
        };

        let entry_id = entry.id;
        self.entries.insert(entry_id, entry.clone());
        self.queues
            .entry((organ_type, region))
            .or_default()
            .push(entry_id);
        self.active_index
            .insert((recipient_id, organ_type), entry_id);

        tracing::info!(
            "Added waiting list entry {} for recipient {} ({}, urgency {})",
            entry_id,
            recipient_id,
            organ_type,
            urgency_level
        );
        Ok(entry)
    }

    /// 获取原始队列（登记顺序，非优先级顺序）
    pub fn get_by_organ_region(
        &self,
        organ_type: OrganType,
        region: &Region,
    ) -> Vec<WaitingListEntry> {
        self.queues
            .get(&(organ_type, region.clone()))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.entries.get(id))
                    .filter(|entry| entry.is_active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 获取优先级排序后的队列
    ///
    /// 排序键：优先级降序 → 紧急度降序 → 登记时间升序（等待最久优先）；
    /// 稳定排序保证完全同键时按登记顺序输出
    pub fn prioritize(&self, organ_type: OrganType, region: &Region) -> Vec<WaitingListEntry> {
        let mut items = self.get_by_organ_region(organ_type, region);
        items.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.urgency_level.cmp(&a.urgency_level))
                .then_with(|| a.added_at.cmp(&b.added_at))
        });
        items
    }

    /// 就地更新活跃条目的紧急度与优先级
    ///
    /// 无活跃条目时返回 NotFound；区域变更会将条目移入目标区域队列
    pub fn update_priority(
        &mut self,
        recipient_id: Uuid,
        organ_type: OrganType,
        urgency_level: u8,
        priority: PriorityLevel,
        region: Region,
    ) -> Result<WaitingListEntry> {
        validate_urgency(urgency_level)?;

        let entry_id = *self
            .active_index
            .get(&(recipient_id, organ_type))
            .ok_or_else(|| {
                OdmsError::NotFound(format!(
                    "no active {} entry for recipient {}",
                    organ_type, recipient_id
                ))
            })?;

        let entry = self
            .entries
            .get_mut(&entry_id)
            .ok_or_else(|| OdmsError::Internal(format!("dangling entry index {}", entry_id)))?;

        if entry.region != region {
            if let Some(queue) = self.queues.get_mut(&(organ_type, entry.region.clone())) {
                queue.retain(|id| *id != entry_id);
            }
            self.queues
                .entry((organ_type, region.clone()))
                .or_default()
                .push(entry_id);
            entry.region = region;
        }

        entry.urgency_level = urgency_level;
        entry.priority = priority;

        tracing::info!(
            "Updated waiting list entry {} (urgency {}, priority {:?})",
            entry_id,
            urgency_level,
            priority
        );
        Ok(entry.clone())
    }

    /// 停用条目
    ///
    /// 幂等：已停用或不存在时为无操作，不报错
    pub fn deactivate(&mut self, recipient_id: Uuid, organ_type: OrganType) -> Result<()> {
        match self.active_index.remove(&(recipient_id, organ_type)) {
            Some(entry_id) => {
                if let Some(entry) = self.entries.get_mut(&entry_id) {
                    entry.is_active = false;
                    let key = (organ_type, entry.region.clone());
                    if let Some(queue) = self.queues.get_mut(&key) {
                        queue.retain(|id| *id != entry_id);
                    }
                }
                tracing::info!(
                    "Deactivated waiting list entry for recipient {} ({})",
                    recipient_id,
                    organ_type
                );
                Ok(())
            }
            None => {
                tracing::debug!(
                    "Deactivate no-op: recipient {} has no active {} entry",
                    recipient_id,
                    organ_type
                );
                Ok(())
            }
        }
    }

    /// 查询受体的活跃条目
    pub fn active_entry(
        &self,
        recipient_id: Uuid,
        organ_type: OrganType,
    ) -> Option<&WaitingListEntry> {
        self.active_index
            .get(&(recipient_id, organ_type))
            .and_then(|id| self.entries.get(id))
    }

    /// 获取某器官类型的全部活跃条目（跨区域，区域编码升序遍历）
    pub fn entries_for_organ_type(&self, organ_type: OrganType) -> Vec<WaitingListEntry> {
        let mut keys: Vec<_> = self
            .queues
            .keys()
            .filter(|(t, _)| *t == organ_type)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.1.cmp(&b.1));

        keys.iter()
            .flat_map(|key| self.queues[key].iter())
            .filter_map(|id| self.entries.get(id))
            .filter(|entry| entry.is_active)
            .cloned()
            .collect()
    }
}

fn validate_urgency(urgency_level: u8) -> Result<()> {
    if (1..=10).contains(&urgency_level) {
        Ok(())
    } else {
        Err(OdmsError::InvalidInput(format!(
            "urgency level {} out of range 1-10",
            urgency_level
        )))
    }
}
