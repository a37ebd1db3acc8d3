//! 内存注册中心实现

use async_trait::async_trait;
use odms_core::{
    Donor, Hospital, MedicalStatus, OdmsError, Organ, OrganStatus, Recipient, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::RegistryStore;

/// 内存注册中心
///
/// 每类实体一张表，键为自然主键
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    donors: Arc<RwLock<HashMap<Uuid, Donor>>>,
    recipients: Arc<RwLock<HashMap<Uuid, Recipient>>>,
    hospitals: Arc<RwLock<HashMap<Uuid, Hospital>>>,
    organs: Arc<RwLock<HashMap<Uuid, Organ>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    async fn get_donor(&self, id: Uuid) -> Result<Option<Donor>> {
        Ok(self.donors.read().await.get(&id).cloned())
    }

    async fn put_donor(&self, donor: Donor) -> Result<()> {
        self.donors.write().await.insert(donor.id, donor);
        Ok(())
    }

    async fn get_recipient(&self, id: Uuid) -> Result<Option<Recipient>> {
        Ok(self.recipients.read().await.get(&id).cloned())
    }

    async fn put_recipient(&self, recipient: Recipient) -> Result<()> {
        self.recipients
            .write()
            .await
            .insert(recipient.id, recipient);
        Ok(())
    }

    async fn get_hospital(&self, id: Uuid) -> Result<Option<Hospital>> {
        Ok(self.hospitals.read().await.get(&id).cloned())
    }

    async fn put_hospital(&self, hospital: Hospital) -> Result<()> {
        self.hospitals.write().await.insert(hospital.id, hospital);
        Ok(())
    }

    async fn get_organ(&self, id: Uuid) -> Result<Option<Organ>> {
        Ok(self.organs.read().await.get(&id).cloned())
    }

    async fn put_organ(&self, organ: Organ) -> Result<()> {
        self.organs.write().await.insert(organ.id, organ);
        Ok(())
    }

    async fn set_recipient_status(&self, id: Uuid, status: MedicalStatus) -> Result<()> {
        let mut recipients = self.recipients.write().await;
        match recipients.get_mut(&id) {
            Some(recipient) => {
                let old = recipient.medical_status;
                recipient.medical_status = status;
                tracing::info!(
                    "Recipient {} medical status changed from {:?} to {:?}",
                    id,
                    old,
                    status
                );
                Ok(())
            }
            None => Err(OdmsError::NotFound(format!("recipient {}", id))),
        }
    }

    async fn set_organ_status(&self, id: Uuid, status: OrganStatus) -> Result<()> {
        let mut organs = self.organs.write().await;
        match organs.get_mut(&id) {
            Some(organ) => {
                let old = organ.status;
                organ.status = status;
                tracing::info!("Organ {} status changed from {:?} to {:?}", id, old, status);
                Ok(())
            }
            None => Err(OdmsError::NotFound(format!("organ {}", id))),
        }
    }

    async fn set_donor_death_verified(&self, id: Uuid) -> Result<bool> {
        let mut donors = self.donors.write().await;
        match donors.get_mut(&id) {
            Some(donor) => {
                if donor.death_verified {
                    Ok(false)
                } else {
                    donor.death_verified = true;
                    tracing::info!("Donor {} death verification recorded", id);
                    Ok(true)
                }
            }
            None => Err(OdmsError::NotFound(format!("donor {}", id))),
        }
    }
}
