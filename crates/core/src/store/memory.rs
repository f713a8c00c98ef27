use super::{check_profile, check_study, newest_first, DocumentStore};
use crate::error::{StoreError, StoreResult};
use crate::study::{AuthorizationRecord, TrackedStudy};
use crate::users::UserProfile;
use async_trait::async_trait;
use radtrack_uuid::RecordId;
use std::collections::HashMap;
use tokio::sync::{watch, RwLock};

/// Store kept in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    studies: RwLock<HashMap<RecordId, TrackedStudy>>,
    authorizations: RwLock<Vec<AuthorizationRecord>>,
    users: RwLock<HashMap<String, UserProfile>>,
    changes: watch::Sender<u64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            studies: RwLock::new(HashMap::new()),
            authorizations: RwLock::new(Vec::new()),
            users: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn bump(&self) {
        self.changes.send_modify(|n| *n += 1);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_study(&self, study: &TrackedStudy) -> StoreResult<()> {
        check_study(study)?;
        {
            let mut studies = self.studies.write().await;
            if studies.contains_key(&study.id) {
                return Err(StoreError::Duplicate(study.id.to_string()));
            }
            studies.insert(study.id, study.clone());
        }
        self.bump();
        Ok(())
    }

    async fn update_study(&self, study: &TrackedStudy) -> StoreResult<()> {
        check_study(study)?;
        {
            let mut studies = self.studies.write().await;
            let slot = studies
                .get_mut(&study.id)
                .ok_or_else(|| StoreError::Missing(study.id.to_string()))?;
            *slot = study.clone();
        }
        self.bump();
        Ok(())
    }

    async fn get_study(&self, id: &RecordId) -> StoreResult<Option<TrackedStudy>> {
        Ok(self.studies.read().await.get(id).cloned())
    }

    async fn list_studies(&self) -> StoreResult<Vec<TrackedStudy>> {
        let mut all: Vec<TrackedStudy> = self.studies.read().await.values().cloned().collect();
        newest_first(&mut all);
        Ok(all)
    }

    async fn insert_authorization(&self, record: &AuthorizationRecord) -> StoreResult<RecordId> {
        self.authorizations.write().await.push(record.clone());
        Ok(RecordId::new())
    }

    async fn list_authorizations(&self) -> StoreResult<Vec<AuthorizationRecord>> {
        Ok(self.authorizations.read().await.clone())
    }

    async fn put_user(&self, profile: &UserProfile) -> StoreResult<()> {
        check_profile(profile)?;
        self.users
            .write()
            .await
            .insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.users.read().await.get(uid).cloned())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
