//! Document stores for study records, authorization audit entries and staff profiles.
//!
//! Every store checks record invariants before writing and publishes a change counter that
//! increments on each committed study write, which the live feed subscribes to.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;
use crate::study::{AuthorizationRecord, TrackedStudy};
use crate::users::UserProfile;
use crate::StoreError;
use async_trait::async_trait;
use radtrack_uuid::RecordId;
use tokio::sync::watch;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes a new study. Fails with [`StoreError::Duplicate`] if the id is taken.
    async fn insert_study(&self, study: &TrackedStudy) -> StoreResult<()>;

    /// Replaces an existing study. Fails with [`StoreError::Missing`] if it does not exist.
    async fn update_study(&self, study: &TrackedStudy) -> StoreResult<()>;

    async fn get_study(&self, id: &RecordId) -> StoreResult<Option<TrackedStudy>>;

    /// All studies, newest request first.
    async fn list_studies(&self) -> StoreResult<Vec<TrackedStudy>>;

    async fn insert_authorization(&self, record: &AuthorizationRecord) -> StoreResult<RecordId>;

    /// All authorization entries, oldest first.
    async fn list_authorizations(&self) -> StoreResult<Vec<AuthorizationRecord>>;

    /// Creates or replaces the profile stored under `profile.uid`.
    async fn put_user(&self, profile: &UserProfile) -> StoreResult<()>;

    async fn get_user(&self, uid: &str) -> StoreResult<Option<UserProfile>>;

    /// A receiver whose value changes after every committed study write.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

pub(crate) fn check_study(study: &TrackedStudy) -> StoreResult<()> {
    study.check_invariants().map_err(StoreError::Invariant)
}

pub(crate) fn check_profile(profile: &UserProfile) -> StoreResult<()> {
    crate::validation::validate_uid(&profile.uid)
        .map_err(|e| StoreError::InvalidKey(e.to_string()))?;
    profile.check_invariants().map_err(StoreError::Invariant)
}

pub(crate) fn newest_first(studies: &mut [TrackedStudy]) {
    studies.sort_by(|a, b| {
        b.request_date
            .cmp(&a.request_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store with switchable failures.
    #[derive(Default)]
    pub(crate) struct FlakyStore {
        pub(crate) inner: MemoryStore,
        fail_studies: AtomicBool,
        fail_authorizations: AtomicBool,
        fail_users: AtomicBool,
        fail_user_reads: AtomicBool,
    }

    impl FlakyStore {
        pub(crate) fn fail_study_writes(&self, fail: bool) {
            self.fail_studies.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn fail_authorization_writes(&self, fail: bool) {
            self.fail_authorizations.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn fail_user_writes(&self, fail: bool) {
            self.fail_users.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn fail_user_reads(&self, fail: bool) {
            self.fail_user_reads.store(fail, Ordering::SeqCst);
        }

        fn check(flag: &AtomicBool) -> StoreResult<()> {
            if flag.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn insert_study(&self, study: &TrackedStudy) -> StoreResult<()> {
            Self::check(&self.fail_studies)?;
            self.inner.insert_study(study).await
        }

        async fn update_study(&self, study: &TrackedStudy) -> StoreResult<()> {
            Self::check(&self.fail_studies)?;
            self.inner.update_study(study).await
        }

        async fn get_study(&self, id: &RecordId) -> StoreResult<Option<TrackedStudy>> {
            self.inner.get_study(id).await
        }

        async fn list_studies(&self) -> StoreResult<Vec<TrackedStudy>> {
            self.inner.list_studies().await
        }

        async fn insert_authorization(
            &self,
            record: &AuthorizationRecord,
        ) -> StoreResult<RecordId> {
            Self::check(&self.fail_authorizations)?;
            self.inner.insert_authorization(record).await
        }

        async fn list_authorizations(&self) -> StoreResult<Vec<AuthorizationRecord>> {
            self.inner.list_authorizations().await
        }

        async fn put_user(&self, profile: &UserProfile) -> StoreResult<()> {
            Self::check(&self.fail_users)?;
            self.inner.put_user(profile).await
        }

        async fn get_user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
            Self::check(&self.fail_user_reads)?;
            self.inner.get_user(uid).await
        }

        fn subscribe(&self) -> watch::Receiver<u64> {
            self.inner.subscribe()
        }
    }
}
