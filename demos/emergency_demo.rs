//! 紧急匹配演示程序
//!
//! 展示紧急分配路径的跨区域扫描，以及提案被拒绝后的器官回退流程

use odms_core::{BloodType, Donor, Hospital, MedicalStatus, OrganType, PriorityLevel, Recipient, Region};
use odms_matching::{AllocationEngine, MatchingPolicy, OrganRegistration};
use odms_registry::{InMemoryRegistry, RegistryStore};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let registry = Arc::new(InMemoryRegistry::new());

    // 区域距离表：上海-北京 2，上海-广州 3
    let mut policy = MatchingPolicy::default();
    policy.region_distances.insert("CN-SH:CN-BJ".to_string(), 2);
    policy.region_distances.insert("CN-SH:CN-GZ".to_string(), 3);
    let engine = AllocationEngine::new(registry.clone(), policy);

    println!("🚨 ODMS 紧急匹配演示\n");

    // 1. 已验证死亡的供体与紧急心脏
    let donor = Donor {
        id: Uuid::new_v4(),
        blood_type: BloodType::ONeg,
        death_verified: true,
        registered_at: chrono::Utc::now(),
    };
    registry.put_donor(donor.clone()).await?;

    let hospital = Hospital {
        id: Uuid::new_v4(),
        name: "北京协和医院".to_string(),
        region: Region::new("CN-BJ"),
        registered_at: chrono::Utc::now(),
    };
    registry.put_hospital(hospital.clone()).await?;

    // 2. 候选受体分布在不同区域
    let nearby = make_recipient(BloodType::APos, "CN-BJ");
    let faraway = make_recipient(BloodType::APos, "CN-GZ");
    registry.put_recipient(nearby.clone()).await?;
    registry.put_recipient(faraway.clone()).await?;

    engine
        .add_to_waiting_list(nearby.id, OrganType::Heart, 9, Region::new("CN-BJ"), PriorityLevel::Critical)
        .await?;
    engine
        .add_to_waiting_list(faraway.id, OrganType::Heart, 10, Region::new("CN-GZ"), PriorityLevel::Emergency)
        .await?;
    println!("✅ 两名候选受体: 北京(紧急度9) / 广州(紧急度10)");

    let organ = engine
        .register_organ(OrganRegistration {
            donor_id: donor.id,
            organ_type: OrganType::Heart,
            origin_region: Region::new("CN-SH"),
            is_emergency: true,
            urgency_level: 10,
            medical_validated: true,
            viability_hours: 6,
        })
        .await?;
    println!("🫀 紧急 O- 心脏登记于上海 ({})", organ.id);

    // 3. 距离上限2：广州(距离3)被排除，即便其紧急度更高
    let proposal = engine.trigger_emergency_match(organ.id, 2).await?;
    println!(
        "\n🎯 紧急匹配命中: 受体 {} (距离上限内评分最高)",
        proposal.recipient_id
    );
    assert_eq!(proposal.recipient_id, nearby.id);

    // 4. 医院拒绝提案，器官回到可分配状态等待复核
    let rejected = engine.reject_proposal(proposal.id).await?;
    println!("❌ 医院拒绝提案 {} (状态 {:?})", rejected.id, rejected.status);

    let organ_after = registry.get_organ(organ.id).await?.expect("organ exists");
    println!(
        "🔁 器官状态回退: {:?}，等待条目保持停用，需人工重新登记",
        organ_after.status
    );

    // 5. 放宽距离上限后重新紧急匹配
    engine
        .add_to_waiting_list(nearby.id, OrganType::Heart, 9, Region::new("CN-BJ"), PriorityLevel::Critical)
        .await?;
    let retry = engine.trigger_emergency_match(organ.id, 3).await?;
    println!(
        "\n🎯 放宽距离后重新匹配成功: 受体 {} (总分 {})",
        retry.recipient_id, retry.score.total
    );

    println!("\n🎉 紧急匹配演示完成!");
    Ok(())
}

/// 构造示例受体
fn make_recipient(blood_type: BloodType, region: &str) -> Recipient {
    Recipient {
        id: Uuid::new_v4(),
        blood_type,
        medical_status: MedicalStatus::Waiting,
        region: Region::new(region),
        registered_at: chrono::Utc::now(),
    }
}
