//! 注册中心访问接口

use async_trait::async_trait;
use odms_core::{Donor, Hospital, MedicalStatus, Organ, OrganStatus, Recipient, Result};
use uuid::Uuid;

/// 注册中心存储接口
///
/// 记录按自然主键存取，整条记录写入为最小原子单位；
/// 实现层故障以 `OdmsError::Registry` 上抛，由调用方退避重试
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get_donor(&self, id: Uuid) -> Result<Option<Donor>>;
    async fn put_donor(&self, donor: Donor) -> Result<()>;

    async fn get_recipient(&self, id: Uuid) -> Result<Option<Recipient>>;
    async fn put_recipient(&self, recipient: Recipient) -> Result<()>;

    async fn get_hospital(&self, id: Uuid) -> Result<Option<Hospital>>;
    async fn put_hospital(&self, hospital: Hospital) -> Result<()>;

    async fn get_organ(&self, id: Uuid) -> Result<Option<Organ>>;
    async fn put_organ(&self, organ: Organ) -> Result<()>;

    /// 更新受体医疗状态，记录不存在时返回 NotFound
    async fn set_recipient_status(&self, id: Uuid, status: MedicalStatus) -> Result<()>;

    /// 更新器官状态，记录不存在时返回 NotFound
    async fn set_organ_status(&self, id: Uuid, status: OrganStatus) -> Result<()>;

    /// 置位供体死亡验证标记
    ///
    /// 返回是否为首次置位，重复通知据此幂等处理
    async fn set_donor_death_verified(&self, id: Uuid) -> Result<bool>;
}
