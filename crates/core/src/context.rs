//! Process-wide handles, built once at startup and passed to every surface.

use crate::auth::{CredentialProvider, LocalCredentialProvider};
use crate::config::{
    default_service_from_env_value, extraction_settings_from_env_values,
    model_config_from_env_values, store_backend_from_env_value, CoreConfig, StoreBackend,
};
use crate::constants::DEFAULT_DATA_DIR;
use crate::feed::StudyFeed;
use crate::ingestion::IngestionService;
use crate::store::{DocumentStore, FileStore, MemoryStore};
use crate::studies::StudyService;
use crate::users::UserService;
use crate::StudyResult;
use extraction::{ExtractionClient, GeminiClient};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state of a running process.
///
/// Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct AppContext {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn DocumentStore>,
    credentials: Arc<dyn CredentialProvider>,
    extraction: Option<ExtractionClient>,
}

impl AppContext {
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn DocumentStore>,
        credentials: Arc<dyn CredentialProvider>,
        extraction: Option<ExtractionClient>,
    ) -> Self {
        Self {
            cfg,
            store,
            credentials,
            extraction,
        }
    }

    /// Builds the store selected by `cfg` and, when an API key is configured, the Gemini
    /// extraction client.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created or the HTTP client cannot
    /// be built.
    pub fn open(cfg: CoreConfig, credentials: Arc<dyn CredentialProvider>) -> StudyResult<Self> {
        let store: Arc<dyn DocumentStore> = match cfg.store_backend() {
            StoreBackend::File => Arc::new(FileStore::open(&cfg)?),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };

        let extraction = match cfg.model().api_key.as_deref() {
            Some(key) => {
                let model = GeminiClient::new(
                    key,
                    &cfg.model().name,
                    cfg.model().base_url.as_deref(),
                    cfg.extraction().timeout,
                )?;
                Some(ExtractionClient::new(
                    Arc::new(model),
                    cfg.extraction().clone(),
                ))
            }
            None => {
                tracing::warn!("no model API key configured; order extraction is disabled");
                None
            }
        };

        tracing::info!(
            backend = ?cfg.store_backend(),
            data_dir = %cfg.data_dir().display(),
            "application context ready"
        );
        Ok(Self::new(Arc::new(cfg), store, credentials, extraction))
    }

    /// Resolves configuration from the process environment and opens the context.
    ///
    /// Intended to be called once by binaries at startup, after `.env` has been loaded.
    ///
    /// # Environment Variables
    /// - `RADTRACK_DATA_DIR`, `RADTRACK_STORE`, `RADTRACK_DEFAULT_SERVICE`
    /// - `RADTRACK_ACCOUNTS_FILE`: YAML accounts seed; without it no caller can authenticate
    /// - `GEMINI_API_KEY`, `RADTRACK_MODEL`, `RADTRACK_MODEL_BASE_URL`
    /// - `RADTRACK_MODEL_TIMEOUT_SECS`, `RADTRACK_MAX_UPLOAD_BYTES`
    ///
    /// # Errors
    /// Returns an error if any value is malformed, the accounts file cannot be loaded, or the
    /// store cannot be opened.
    pub fn from_env() -> StudyResult<Self> {
        Self::from_env_values(|name| std::env::var(name).ok())
    }

    /// [`Self::from_env`] over an arbitrary variable lookup.
    pub fn from_env_values(var: impl Fn(&str) -> Option<String>) -> StudyResult<Self> {
        let data_dir = var("RADTRACK_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into());
        let cfg = CoreConfig::new(
            PathBuf::from(data_dir),
            store_backend_from_env_value(var("RADTRACK_STORE"))?,
            default_service_from_env_value(var("RADTRACK_DEFAULT_SERVICE")),
            extraction_settings_from_env_values(
                var("RADTRACK_MODEL_TIMEOUT_SECS"),
                var("RADTRACK_MAX_UPLOAD_BYTES"),
            )?,
            model_config_from_env_values(
                var("RADTRACK_MODEL"),
                var("RADTRACK_MODEL_BASE_URL"),
                var("GEMINI_API_KEY"),
            ),
        )?;

        let credentials: Arc<dyn CredentialProvider> = match var("RADTRACK_ACCOUNTS_FILE") {
            Some(path) => Arc::new(LocalCredentialProvider::from_file(&PathBuf::from(path))?),
            None => {
                tracing::warn!("RADTRACK_ACCOUNTS_FILE not set; every credential will be rejected");
                Arc::new(LocalCredentialProvider::new(Vec::new())?)
            }
        };

        Self::open(cfg, credentials)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    pub fn credentials(&self) -> &dyn CredentialProvider {
        self.credentials.as_ref()
    }

    /// The extraction client, if a model is configured.
    pub fn extraction(&self) -> Option<&ExtractionClient> {
        self.extraction.as_ref()
    }

    pub fn ingestion(&self) -> IngestionService {
        IngestionService::new(Arc::clone(&self.cfg), self.store())
    }

    pub fn studies(&self) -> StudyService {
        StudyService::new(self.store())
    }

    pub fn feed(&self) -> StudyFeed {
        StudyFeed::new(self.store())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.store(), Arc::clone(&self.credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::provider;
    use crate::config::ModelConfig;
    use crate::feed::FeedFilters;
    use crate::study::tests::order_named;
    use extraction::ExtractionSettings;

    #[tokio::test]
    async fn services_share_one_store() {
        let ctx = AppContext::open(CoreConfig::in_memory(), Arc::new(provider())).unwrap();
        assert!(ctx.extraction().is_none());

        ctx.ingestion()
            .create_study(order_named("123", "JUAN PEREZ", "RX DE TORAX"), None, false)
            .await
            .unwrap();
        let view = ctx.feed().snapshot(&FeedFilters::default()).await.unwrap();
        assert_eq!(view.total, 1);
        let id = view.studies[0].id.to_string();
        assert!(ctx.studies().get(&id).await.is_ok());
    }

    #[tokio::test]
    async fn file_backend_with_model_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = CoreConfig::new(
            dir.path().to_path_buf(),
            StoreBackend::File,
            "HOSP".into(),
            ExtractionSettings::default(),
            ModelConfig {
                api_key: Some("test-key".into()),
                ..ModelConfig::default()
            },
        )
        .unwrap();
        let ctx = AppContext::open(cfg, Arc::new(provider())).unwrap();
        assert!(ctx.extraction().is_some());
        assert!(dir.path().join("studies").is_dir());
        assert_eq!(ctx.config().default_service(), "HOSP");
    }

    #[tokio::test]
    async fn resolves_from_environment_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let accounts = dir.path().join("accounts.yaml");
        std::fs::write(
            &accounts,
            "accounts:\n  - uid: tech-1\n    email: tecnologo@hospital.co\n    token: tech-token\n",
        )
        .unwrap();
        let accounts = accounts.display().to_string();

        let ctx = AppContext::from_env_values(|name| match name {
            "RADTRACK_STORE" => Some("memory".into()),
            "RADTRACK_DEFAULT_SERVICE" => Some("URG".into()),
            "RADTRACK_ACCOUNTS_FILE" => Some(accounts.clone()),
            _ => None,
        })
        .unwrap();
        assert_eq!(ctx.config().store_backend(), StoreBackend::Memory);
        assert_eq!(ctx.config().default_service(), "URG");
        assert!(ctx.extraction().is_none());
        let caller = ctx.credentials().verify_token("tech-token").await.unwrap();
        assert_eq!(caller.uid, "tech-1");
    }

    #[test]
    fn malformed_environment_values_are_rejected() {
        let bad_store = AppContext::from_env_values(|name| {
            (name == "RADTRACK_STORE").then(|| "sqlite".to_string())
        });
        assert!(bad_store.is_err());

        let missing_accounts = AppContext::from_env_values(|name| match name {
            "RADTRACK_STORE" => Some("memory".into()),
            "RADTRACK_ACCOUNTS_FILE" => Some("/nonexistent/accounts.yaml".into()),
            _ => None,
        });
        assert!(missing_accounts.is_err());
    }
}
