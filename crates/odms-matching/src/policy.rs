//! 匹配策略配置
//!
//! 权重与阈值均为可配置参数，默认值仅为策略基线而非医学结论

use odms_core::Region;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 评分权重配置
///
/// 各分量独立可调，默认基线 血型30/紧急度25/等待时间20/地域15/医学10，合计100
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub blood: u32,
    pub urgency: u32,
    pub waiting_time: u32,
    pub geographic: u32,
    pub medical: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            blood: 30,
            urgency: 25,
            waiting_time: 20,
            geographic: 15,
            medical: 10,
        }
    }
}

/// 匹配策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingPolicy {
    pub weights: ScoringWeights,
    /// 综合评分达标阈值，低于该值视为不兼容
    pub minimum_score_threshold: u32,
    /// 等待时间评分饱和天数
    pub max_wait_days: u32,
    /// 跨区域时地域分量保留的百分比
    pub cross_region_percent: u32,
    /// 超过该距离地域分量记零
    pub max_scored_distance: u32,
    /// 器官医学数据未验证时医学分量保留的百分比
    pub partial_medical_percent: u32,
    /// 区域距离表，键格式 "区域A:区域B"（无序）
    pub region_distances: HashMap<String, u32>,
    /// 距离表未覆盖的跨区域组合使用的默认距离
    pub default_cross_distance: u32,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            minimum_score_threshold: 50,
            max_wait_days: 365,
            cross_region_percent: 40,
            max_scored_distance: 2,
            partial_medical_percent: 50,
            region_distances: HashMap::new(),
            default_cross_distance: 1,
        }
    }
}

impl MatchingPolicy {
    /// 查询两个区域之间的距离
    ///
    /// 同区域恒为0；距离表按无序键查找，未命中回退默认跨区距离
    pub fn region_distance(&self, a: &Region, b: &Region) -> u32 {
        if a == b {
            return 0;
        }
        let forward = format!("{}:{}", a.as_str(), b.as_str());
        let backward = format!("{}:{}", b.as_str(), a.as_str());
        self.region_distances
            .get(&forward)
            .or_else(|| self.region_distances.get(&backward))
            .copied()
            .unwrap_or(self.default_cross_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_100() {
        let w = ScoringWeights::default();
        assert_eq!(w.blood + w.urgency + w.waiting_time + w.geographic + w.medical, 100);
    }

    #[test]
    fn test_region_distance_lookup() {
        let mut policy = MatchingPolicy::default();
        policy
            .region_distances
            .insert("CN-SH:CN-BJ".to_string(), 2);

        let sh = Region::new("CN-SH");
        let bj = Region::new("CN-BJ");
        let gz = Region::new("CN-GZ");

        assert_eq!(policy.region_distance(&sh, &sh), 0);
        assert_eq!(policy.region_distance(&sh, &bj), 2);
        // 距离表按无序键匹配
        assert_eq!(policy.region_distance(&bj, &sh), 2);
        // 未配置的组合回退默认值
        assert_eq!(policy.region_distance(&sh, &gz), 1);
    }
}
