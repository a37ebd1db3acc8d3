//! 兼容性评分器
//!
//! 计算器官与受体之间的加权多因子匹配评分。
//! 纯函数实现：给定相同输入（含评分时间点）必然产生相同评分，无副作用。

use chrono::{DateTime, Utc};
use odms_core::{MatchScore, Organ, Recipient, WaitingListEntry};

use crate::policy::MatchingPolicy;

/// 兼容性评分器
#[derive(Debug, Clone, Default)]
pub struct CompatibilityScorer {
    policy: MatchingPolicy,
}

impl CompatibilityScorer {
    pub fn new(policy: MatchingPolicy) -> Self {
        Self { policy }
    }

    /// 计算匹配评分
    ///
    /// 评分永不失败：即使完全不匹配也产生评分（可能为零分）。
    /// 血型不相容时 is_compatible 强制为 false，不受其余分量影响。
    pub fn score(
        &self,
        organ: &Organ,
        recipient: &Recipient,
        entry: &WaitingListEntry,
        now: DateTime<Utc>,
    ) -> MatchScore {
        let weights = &self.policy.weights;

        let blood_compatible = organ.blood_type.can_donate_to(&recipient.blood_type);
        let blood = if blood_compatible { weights.blood } else { 0 };

        // 紧急度 1-10 线性映射到 [0, urgency权重]
        let urgency = weights.urgency * u32::from(entry.urgency_level.min(10)) / 10;

        let waiting_time = self.waiting_time_score(entry.added_at, now);
        let geographic = self.geographic_score(organ, entry);

        let medical = if organ.medical_validated {
            weights.medical
        } else {
            weights.medical * self.policy.partial_medical_percent / 100
        };

        let total = (blood + urgency + waiting_time + geographic + medical).min(100);

        MatchScore {
            total,
            blood,
            urgency,
            waiting_time,
            geographic,
            medical,
            is_compatible: blood_compatible && total >= self.policy.minimum_score_threshold,
        }
    }

    /// 等待时间分量：随等待时长单调增加，达到配置的最大等待后饱和
    fn waiting_time_score(&self, added_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
        let max_secs = i64::from(self.policy.max_wait_days) * 86_400;
        if max_secs == 0 {
            return self.policy.weights.waiting_time;
        }
        let elapsed = (now - added_at).num_seconds().clamp(0, max_secs);
        (i64::from(self.policy.weights.waiting_time) * elapsed / max_secs) as u32
    }

    /// 地域分量：同区域满分，跨区域按策略比例折减，超距记零
    fn geographic_score(&self, organ: &Organ, entry: &WaitingListEntry) -> u32 {
        let distance = self
            .policy
            .region_distance(&organ.origin_region, &entry.region);
        if distance == 0 {
            self.policy.weights.geographic
        } else if distance <= self.policy.max_scored_distance {
            self.policy.weights.geographic * self.policy.cross_region_percent / 100
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use odms_core::{BloodType, MedicalStatus, OrganStatus, OrganType, PriorityLevel, Region};
    use uuid::Uuid;

    fn organ(blood: BloodType, region: &str, validated: bool) -> Organ {
        let now = Utc::now();
        Organ {
            id: Uuid::new_v4(),
            organ_type: OrganType::Kidney,
            blood_type: blood,
            donor_id: Uuid::new_v4(),
            origin_region: Region::new(region),
            status: OrganStatus::Available,
            is_emergency: false,
            urgency_level: 5,
            medical_validated: validated,
            assigned_recipient: None,
            assigned_hospital: None,
            donated_at: now,
            expires_at: now + Duration::hours(24),
        }
    }

    fn recipient(blood: BloodType, region: &str) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            blood_type: blood,
            medical_status: MedicalStatus::Waiting,
            region: Region::new(region),
            registered_at: Utc::now(),
        }
    }

    fn entry(recipient_id: Uuid, urgency: u8, region: &str, added_at: DateTime<Utc>) -> WaitingListEntry {
        WaitingListEntry {
            id: Uuid::new_v4(),
            recipient_id,
            organ_type: OrganType::Kidney,
            urgency_level: urgency,
            region: Region::new(region),
            priority: PriorityLevel::High,
            added_at,
            is_active: true,
        }
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = CompatibilityScorer::default();
        let organ = organ(BloodType::ONeg, "CN-SH", true);
        let r = recipient(BloodType::APos, "CN-SH");
        let e = entry(r.id, 8, "CN-SH", Utc::now() - Duration::days(30));
        let now = Utc::now();

        let first = scorer.score(&organ, &r, &e, now);
        let second = scorer.score(&organ, &r, &e, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_total_equals_component_sum() {
        let scorer = CompatibilityScorer::default();
        let organ = organ(BloodType::ONeg, "CN-SH", true);
        let r = recipient(BloodType::AbPos, "CN-BJ");
        let e = entry(r.id, 7, "CN-BJ", Utc::now() - Duration::days(100));

        let score = scorer.score(&organ, &r, &e, Utc::now());
        assert_eq!(
            score.total,
            score.blood + score.urgency + score.waiting_time + score.geographic + score.medical
        );
        assert!(score.total <= 100);
    }

    #[test]
    fn test_incompatible_blood_forces_incompatible() {
        let scorer = CompatibilityScorer::default();
        // AB+ 供体只能捐给 AB+
        let organ = organ(BloodType::AbPos, "CN-SH", true);
        let r = recipient(BloodType::OPos, "CN-SH");
        // 其余分量全部拉满
        let e = entry(r.id, 10, "CN-SH", Utc::now() - Duration::days(400));

        let score = scorer.score(&organ, &r, &e, Utc::now());
        assert_eq!(score.blood, 0);
        assert!(!score.is_compatible);
    }

    #[test]
    fn test_waiting_time_saturates() {
        let scorer = CompatibilityScorer::default();
        let organ = organ(BloodType::ONeg, "CN-SH", true);
        let r = recipient(BloodType::ONeg, "CN-SH");
        let now = Utc::now();

        let fresh = scorer.score(&organ, &r, &entry(r.id, 5, "CN-SH", now), now);
        let one_year = scorer.score(
            &organ,
            &r,
            &entry(r.id, 5, "CN-SH", now - Duration::days(365)),
            now,
        );
        let two_years = scorer.score(
            &organ,
            &r,
            &entry(r.id, 5, "CN-SH", now - Duration::days(730)),
            now,
        );

        assert_eq!(fresh.waiting_time, 0);
        assert_eq!(one_year.waiting_time, 20);
        // 超过最大等待后饱和
        assert_eq!(two_years.waiting_time, 20);
    }

    #[test]
    fn test_urgency_linear_mapping() {
        let scorer = CompatibilityScorer::default();
        let organ = organ(BloodType::ONeg, "CN-SH", true);
        let r = recipient(BloodType::ONeg, "CN-SH");
        let now = Utc::now();

        let low = scorer.score(&organ, &r, &entry(r.id, 2, "CN-SH", now), now);
        let high = scorer.score(&organ, &r, &entry(r.id, 10, "CN-SH", now), now);

        assert_eq!(low.urgency, 5);
        assert_eq!(high.urgency, 25);
    }

    #[test]
    fn test_cross_region_reduction() {
        let scorer = CompatibilityScorer::default();
        let organ = organ(BloodType::ONeg, "CN-SH", true);
        let r = recipient(BloodType::ONeg, "CN-BJ");
        let now = Utc::now();

        let same = scorer.score(&organ, &r, &entry(r.id, 5, "CN-SH", now), now);
        let cross = scorer.score(&organ, &r, &entry(r.id, 5, "CN-BJ", now), now);

        assert_eq!(same.geographic, 15);
        assert_eq!(cross.geographic, 6); // 15 * 40%
    }

    #[test]
    fn test_distance_beyond_limit_scores_zero() {
        let mut policy = MatchingPolicy::default();
        policy.region_distances.insert("CN-SH:CN-LS".to_string(), 5);
        let scorer = CompatibilityScorer::new(policy);

        let organ = organ(BloodType::ONeg, "CN-SH", true);
        let r = recipient(BloodType::ONeg, "CN-LS");
        let now = Utc::now();
        let score = scorer.score(&organ, &r, &entry(r.id, 5, "CN-LS", now), now);
        assert_eq!(score.geographic, 0);
    }

    #[test]
    fn test_unvalidated_medical_partial_credit() {
        let scorer = CompatibilityScorer::default();
        let r = recipient(BloodType::ONeg, "CN-SH");
        let now = Utc::now();
        let e = entry(r.id, 5, "CN-SH", now);

        let validated = scorer.score(&organ(BloodType::ONeg, "CN-SH", true), &r, &e, now);
        let unvalidated = scorer.score(&organ(BloodType::ONeg, "CN-SH", false), &r, &e, now);

        assert_eq!(validated.medical, 10);
        assert_eq!(unvalidated.medical, 5);
    }
}
