//! 分配引擎演示程序
//!
//! 展示从供体死亡验证、器官登记、等待列表管理到匹配分配的完整流程

use odms_core::utils::RequestIdGenerator;
use odms_core::{BloodType, Donor, Hospital, MedicalStatus, OrganType, PriorityLevel, Recipient, Region};
use odms_matching::{AllocationEngine, MatchingPolicy, OrganRegistration};
use odms_oracle::{AttestationGateway, InMemoryGateway};
use odms_registry::{InMemoryRegistry, RegistryStore};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let registry = Arc::new(InMemoryRegistry::new());
    let gateway = InMemoryGateway::new(RequestIdGenerator::new());
    let engine = AllocationEngine::new(registry.clone(), MatchingPolicy::default());

    println!("🫀 ODMS 器官分配引擎演示\n");

    // 1. 登记供体、受体与医院
    let donor = Donor {
        id: Uuid::new_v4(),
        blood_type: BloodType::ONeg,
        death_verified: false,
        registered_at: chrono::Utc::now(),
    };
    registry.put_donor(donor.clone()).await?;

    let hospital = Hospital {
        id: Uuid::new_v4(),
        name: "仁济医院".to_string(),
        region: Region::new("CN-SH"),
        registered_at: chrono::Utc::now(),
    };
    registry.put_hospital(hospital.clone()).await?;

    let r1 = make_recipient(BloodType::ONeg, "CN-SH");
    let r2 = make_recipient(BloodType::APos, "CN-SH");
    registry.put_recipient(r1.clone()).await?;
    registry.put_recipient(r2.clone()).await?;
    println!("✅ 登记完成: 1 供体, 2 受体, 1 医院");

    // 2. 死亡验证流程
    let request_id = gateway.request_verification(donor.id, hospital.id).await?;
    println!("📨 已发起死亡验证请求 {}", request_id);

    let status = gateway.get_status(request_id).await?;
    println!("⏳ 验证状态: fulfilled={} (等待中不是错误)", status.fulfilled);

    let oracle_id = Uuid::new_v4();
    gateway
        .fulfill(
            request_id,
            true,
            Some("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".to_string()),
            oracle_id,
        )
        .await?;
    engine.handle_attestation(request_id, donor.id, true).await?;
    println!("✅ 预言机已确认供体死亡，器官释放解锁");

    // 3. 受体加入等待列表
    engine
        .add_to_waiting_list(r1.id, OrganType::Liver, 8, Region::new("CN-SH"), PriorityLevel::High)
        .await?;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    engine
        .add_to_waiting_list(r2.id, OrganType::Liver, 8, Region::new("CN-SH"), PriorityLevel::High)
        .await?;
    println!("✅ 两名受体进入肝脏等待列表");

    // 4. 登记器官
    let organ = engine
        .register_organ(OrganRegistration {
            donor_id: donor.id,
            organ_type: OrganType::Liver,
            origin_region: Region::new("CN-SH"),
            is_emergency: false,
            urgency_level: 5,
            medical_validated: true,
            viability_hours: 12,
        })
        .await?;
    println!("🫁 O- 肝脏已登记 ({})", organ.id);

    // 5. 候选查询与排序
    let compatible = engine.find_compatible_recipients(organ.id).await?;
    println!("\n🔍 血型相容候选: {} 名", compatible.len());

    let prioritized = engine
        .prioritized_waitlist(OrganType::Liver, &Region::new("CN-SH"))
        .await;
    println!("📋 优先级队列:");
    for (index, entry) in prioritized.iter().enumerate() {
        println!(
            "   {}. 受体 {} (优先级 {:?}, 紧急度 {}, 登记于 {})",
            index + 1,
            entry.recipient_id,
            entry.priority,
            entry.urgency_level,
            entry.added_at.format("%H:%M:%S%.3f")
        );
    }

    let ranked = engine.rank_candidates(organ.id).await?;
    println!("🏆 评分排序:");
    for candidate in &ranked {
        println!(
            "   受体 {} 总分 {} (血型{} 紧急{} 等待{} 地域{} 医学{})",
            candidate.recipient_id,
            candidate.score.total,
            candidate.score.blood,
            candidate.score.urgency,
            candidate.score.waiting_time,
            candidate.score.geographic,
            candidate.score.medical
        );
    }

    // 6. 分配给最佳候选
    let best = ranked.first().expect("ranked list is non-empty");
    let proposal = engine
        .allocate_organ(organ.id, best.recipient_id, hospital.id)
        .await?;
    println!(
        "\n🎯 已分配: 器官 {} -> 受体 {} (提案 {})",
        organ.id, best.recipient_id, proposal.id
    );

    // 7. 医院确认并完成移植
    engine.confirm_proposal(proposal.id, hospital.id).await?;
    println!("🏥 医院已确认提案");

    let transplanted = engine.mark_transplanted(organ.id).await?;
    println!("✅ 移植完成，器官状态: {:?}", transplanted.status);

    let recipient = registry.get_recipient(best.recipient_id).await?.expect("recipient exists");
    println!("✅ 受体医疗状态: {:?}", recipient.medical_status);

    let remaining = engine.waitlist(OrganType::Liver, &Region::new("CN-SH")).await;
    println!("📋 等待列表剩余 {} 名受体", remaining.len());

    println!("\n🎉 分配引擎演示完成!");
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
