//! YAML document store on the local filesystem.
//!
//! Layout under the data directory:
//!
//! ```text
//! studies/<s1>/<s2>/<id>/study.yaml
//! authorizations/<s1>/<s2>/<id>/authorization.yaml
//! users/<uid>/profile.yaml
//! ```
//!
//! Files are replaced atomically (write to a sibling temp file, then rename), so a reader never
//! observes a half-written record.

use super::{check_profile, check_study, newest_first, DocumentStore};
use crate::config::CoreConfig;
use crate::constants::{AUTHORIZATION_FILENAME, PROFILE_FILENAME, STUDY_FILENAME};
use crate::error::{StoreError, StoreResult};
use crate::study::{AuthorizationRecord, TrackedStudy};
use crate::users::UserProfile;
use async_trait::async_trait;
use radtrack_uuid::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::{watch, Mutex};

#[derive(Debug)]
pub struct FileStore {
    studies_dir: PathBuf,
    authorizations_dir: PathBuf,
    users_dir: PathBuf,
    write_lock: Mutex<()>,
    changes: watch::Sender<u64>,
}

impl FileStore {
    /// Opens the store, creating its directories if needed.
    pub fn open(cfg: &CoreConfig) -> StoreResult<Self> {
        let studies_dir = cfg.studies_dir();
        let authorizations_dir = cfg.authorizations_dir();
        let users_dir = cfg.users_dir();
        for dir in [&studies_dir, &authorizations_dir, &users_dir] {
            fs::create_dir_all(dir).map_err(|source| StoreError::DirCreation {
                path: dir.clone(),
                source,
            })?;
        }
        let (changes, _) = watch::channel(0);
        Ok(Self {
            studies_dir,
            authorizations_dir,
            users_dir,
            write_lock: Mutex::new(()),
            changes,
        })
    }

    fn study_path(&self, id: &RecordId) -> PathBuf {
        id.sharded_dir(&self.studies_dir).join(STUDY_FILENAME)
    }

    fn user_path(&self, uid: &str) -> StoreResult<PathBuf> {
        crate::validation::validate_uid(uid).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        Ok(self.users_dir.join(uid).join(PROFILE_FILENAME))
    }

    fn bump(&self) {
        self.changes.send_modify(|n| *n += 1);
    }
}

async fn blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let yaml = serde_yaml::to_string(value).map_err(StoreError::YamlSerialization)?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| StoreError::DirCreation {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, yaml).map_err(|source| StoreError::FileWrite {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        StoreError::FileWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::FileRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_yaml::from_str(&text)
        .map(Some)
        .map_err(StoreError::YamlDeserialization)
}

fn subdirs(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::FileRead {
                path: dir.to_path_buf(),
                source,
            })
        }
    };
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::FileRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            out.push(path);
        }
    }
    Ok(out)
}

/// Reads every `<s1>/<s2>/<id>/<filename>` document under `root`.
///
/// A document that does not parse is logged and left out; I/O failures still abort.
fn read_sharded<T: DeserializeOwned>(root: &Path, filename: &str) -> StoreResult<Vec<T>> {
    let mut docs = Vec::new();
    for s1 in subdirs(root)? {
        for s2 in subdirs(&s1)? {
            for record_dir in subdirs(&s2)? {
                let path = record_dir.join(filename);
                match read_yaml(&path) {
                    Ok(Some(doc)) => docs.push(doc),
                    Ok(None) => {}
                    Err(StoreError::YamlDeserialization(e)) => {
                        tracing::warn!(path = %path.display(), "skipping unreadable record: {}", e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
    Ok(docs)
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn insert_study(&self, study: &TrackedStudy) -> StoreResult<()> {
        check_study(study)?;
        let path = self.study_path(&study.id);
        let record = study.clone();
        let _guard = self.write_lock.lock().await;
        blocking(move || {
            if path.exists() {
                return Err(StoreError::Duplicate(record.id.to_string()));
            }
            write_yaml(&path, &record)
        })
        .await?;
        self.bump();
        Ok(())
    }

    async fn update_study(&self, study: &TrackedStudy) -> StoreResult<()> {
        check_study(study)?;
        let path = self.study_path(&study.id);
        let record = study.clone();
        let _guard = self.write_lock.lock().await;
        blocking(move || {
            if !path.exists() {
                return Err(StoreError::Missing(record.id.to_string()));
            }
            write_yaml(&path, &record)
        })
        .await?;
        self.bump();
        Ok(())
    }

    async fn get_study(&self, id: &RecordId) -> StoreResult<Option<TrackedStudy>> {
        let path = self.study_path(id);
        blocking(move || read_yaml(&path)).await
    }

    async fn list_studies(&self) -> StoreResult<Vec<TrackedStudy>> {
        let root = self.studies_dir.clone();
        let mut all: Vec<TrackedStudy> =
            blocking(move || read_sharded(&root, STUDY_FILENAME)).await?;
        newest_first(&mut all);
        Ok(all)
    }

    async fn insert_authorization(&self, record: &AuthorizationRecord) -> StoreResult<RecordId> {
        let id = RecordId::new();
        let path = id
            .sharded_dir(&self.authorizations_dir)
            .join(AUTHORIZATION_FILENAME);
        let record = record.clone();
        blocking(move || write_yaml(&path, &record)).await?;
        Ok(id)
    }

    async fn list_authorizations(&self) -> StoreResult<Vec<AuthorizationRecord>> {
        let root = self.authorizations_dir.clone();
        let mut all: Vec<AuthorizationRecord> =
            blocking(move || read_sharded(&root, AUTHORIZATION_FILENAME)).await?;
        all.sort_by(|a, b| a.generated_at.cmp(&b.generated_at));
        Ok(all)
    }

    async fn put_user(&self, profile: &UserProfile) -> StoreResult<()> {
        check_profile(profile)?;
        let path = self.user_path(&profile.uid)?;
        let record = profile.clone();
        let _guard = self.write_lock.lock().await;
        blocking(move || write_yaml(&path, &record)).await
    }

    async fn get_user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        let path = self.user_path(uid)?;
        blocking(move || read_yaml(&path)).await
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, StoreBackend};
    use crate::study::tests::{at, study};
    use crate::study::StudyStatus;
    use crate::users::{AssignedService, Role};
    use extraction::ExtractionSettings;
    use radtrack_types::EmailAddress;
    use tempfile::TempDir;

    fn cfg(dir: &Path) -> CoreConfig {
        CoreConfig::new(
            dir.to_path_buf(),
            StoreBackend::File,
            "URG".into(),
            ExtractionSettings::default(),
            ModelConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn studies_survive_reopening() {
        let dir = TempDir::new().unwrap();
        let mut older = study(StudyStatus::Pendiente, "URG", "RX DE TORAX");
        let mut newer = study(StudyStatus::Cancelado, "UCI", "TAC DE CRANEO");
        older.request_date = at(1, 8);
        newer.request_date = at(6, 8);
        {
            let store = FileStore::open(&cfg(dir.path())).unwrap();
            store.insert_study(&older).await.unwrap();
            store.insert_study(&newer).await.unwrap();
        }

        let store = FileStore::open(&cfg(dir.path())).unwrap();
        let listed = store.list_studies().await.unwrap();
        assert_eq!(listed, vec![newer.clone(), older.clone()]);

        let hex = older.id.to_string();
        let expected = dir
            .path()
            .join("studies")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(&hex)
            .join("study.yaml");
        assert!(expected.is_file());
    }

    #[tokio::test]
    async fn corrupt_record_is_skipped_when_listing() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(&cfg(dir.path())).unwrap();
        let good = study(StudyStatus::Pendiente, "URG", "RX DE TORAX");
        let damaged = study(StudyStatus::Pendiente, "UCI", "TAC DE CRANEO");
        store.insert_study(&good).await.unwrap();
        store.insert_study(&damaged).await.unwrap();

        let hex = damaged.id.to_string();
        let path = dir
            .path()
            .join("studies")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(&hex)
            .join("study.yaml");
        std::fs::write(&path, "id: [unterminated\n\t: :").unwrap();

        let listed = store.list_studies().await.unwrap();
        assert_eq!(listed, vec![good]);
        assert!(matches!(
            store.get_study(&damaged.id).await,
            Err(StoreError::YamlDeserialization(_))
        ));
    }

    #[tokio::test]
    async fn insert_and_update_respect_existence() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(&cfg(dir.path())).unwrap();
        let mut s = study(StudyStatus::Pendiente, "URG", "RX DE TORAX");

        assert!(matches!(
            store.update_study(&s).await,
            Err(StoreError::Missing(_))
        ));
        store.insert_study(&s).await.unwrap();
        assert!(matches!(
            store.insert_study(&s).await,
            Err(StoreError::Duplicate(_))
        ));

        s.status = StudyStatus::Leido;
        store.update_study(&s).await.unwrap();
        let loaded = store.get_study(&s.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, StudyStatus::Leido);
        assert!(store.get_study(&RecordId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_records_leave_no_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(&cfg(dir.path())).unwrap();
        let mut s = study(StudyStatus::Completado, "URG", "RX DE TORAX");
        s.completion_date = None;
        assert!(matches!(
            store.insert_study(&s).await,
            Err(StoreError::Invariant(_))
        ));
        assert!(store.list_studies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn authorizations_are_listed_oldest_first() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(&cfg(dir.path())).unwrap();
        let s = study(StudyStatus::Pendiente, "URG", "RX DE TORAX");
        for day in [4, 2] {
            store
                .insert_authorization(&AuthorizationRecord {
                    study_id: s.id,
                    patient_id: "123".into(),
                    patient_full_name: "JUAN PEREZ".into(),
                    study_name: "RX DE TORAX".into(),
                    generated_at: at(day, 9),
                })
                .await
                .unwrap();
        }
        let listed = store.list_authorizations().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].generated_at, at(2, 9));
    }

    #[tokio::test]
    async fn profiles_are_keyed_by_safe_uid() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(&cfg(dir.path())).unwrap();
        let mut profile = UserProfile {
            uid: "nurse-1".into(),
            email: EmailAddress::parse("enfermera@hospital.co").unwrap(),
            nombre: "María".into(),
            rol: Role::Enfermero,
            servicio_asignado: AssignedService::Urg,
            area_general: None,
            activo: true,
        };
        store.put_user(&profile).await.unwrap();
        assert_eq!(store.get_user("nurse-1").await.unwrap(), Some(profile.clone()));
        assert!(dir.path().join("users/nurse-1/profile.yaml").is_file());

        assert!(matches!(
            store.get_user("../etc").await,
            Err(StoreError::InvalidKey(_))
        ));

        profile.servicio_asignado = AssignedService::Tac;
        assert!(matches!(
            store.put_user(&profile).await,
            Err(StoreError::Invariant(_))
        ));
    }
}
