//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses. Binaries read the environment and hand the raw values to the
//! `*_from_env_value` helpers below.

use crate::constants::{
    AUTHORIZATIONS_DIR_NAME, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MODEL, DEFAULT_MODEL_TIMEOUT_SECS,
    DEFAULT_SERVICE, STUDIES_DIR_NAME, USERS_DIR_NAME,
};
use crate::{StudyError, StudyResult};
use extraction::ExtractionSettings;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which document store backs the process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreBackend {
    /// YAML files under the data directory.
    #[default]
    File,
    /// Process memory; nothing survives a restart.
    Memory,
}

/// Settings of the external vision model.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    store_backend: StoreBackend,
    default_service: String,
    extraction: ExtractionSettings,
    model: ModelConfig,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidInput`] if the default service is blank or the extraction
    /// limits are zero.
    pub fn new(
        data_dir: PathBuf,
        store_backend: StoreBackend,
        default_service: String,
        extraction: ExtractionSettings,
        model: ModelConfig,
    ) -> StudyResult<Self> {
        let default_service = crate::validation::validate_service(&default_service)?;
        if extraction.max_upload_bytes == 0 {
            return Err(StudyError::InvalidInput(
                "max upload size must be greater than zero".into(),
            ));
        }
        if extraction.timeout.is_zero() {
            return Err(StudyError::InvalidInput(
                "model timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            data_dir,
            store_backend,
            default_service,
            extraction,
            model,
        })
    }

    /// Configuration for tests and embedded use: in-memory store, default limits.
    pub fn in_memory() -> Self {
        Self {
            data_dir: PathBuf::from(crate::constants::DEFAULT_DATA_DIR),
            store_backend: StoreBackend::Memory,
            default_service: DEFAULT_SERVICE.to_string(),
            extraction: ExtractionSettings::default(),
            model: ModelConfig::default(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn studies_dir(&self) -> PathBuf {
        self.data_dir.join(STUDIES_DIR_NAME)
    }

    pub fn authorizations_dir(&self) -> PathBuf {
        self.data_dir.join(AUTHORIZATIONS_DIR_NAME)
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join(USERS_DIR_NAME)
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    pub fn default_service(&self) -> &str {
        &self.default_service
    }

    pub fn extraction(&self) -> &ExtractionSettings {
        &self.extraction
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the store backend from an optional string value (`file` or `memory`).
///
/// If `value` is `None` or empty/whitespace, returns [`StoreBackend::File`].
pub fn store_backend_from_env_value(value: Option<String>) -> StudyResult<StoreBackend> {
    match non_blank(value).map(|v| v.to_ascii_lowercase()).as_deref() {
        None | Some("file") => Ok(StoreBackend::File),
        Some("memory") => Ok(StoreBackend::Memory),
        Some(other) => Err(StudyError::InvalidInput(format!(
            "unknown store backend '{other}' (expected 'file' or 'memory')"
        ))),
    }
}

/// Parse the default service area, falling back to `URG`.
pub fn default_service_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_SERVICE.to_string())
}

/// Parse extraction limits from the optional timeout (seconds) and upload size (bytes).
pub fn extraction_settings_from_env_values(
    timeout_secs: Option<String>,
    max_upload_bytes: Option<String>,
) -> StudyResult<ExtractionSettings> {
    let timeout_secs = non_blank(timeout_secs)
        .map(|v| {
            v.parse::<u64>().map_err(|_| {
                StudyError::InvalidInput(format!("model timeout must be whole seconds, got '{v}'"))
            })
        })
        .transpose()?
        .unwrap_or(DEFAULT_MODEL_TIMEOUT_SECS);

    let max_upload_bytes = non_blank(max_upload_bytes)
        .map(|v| {
            v.parse::<usize>().map_err(|_| {
                StudyError::InvalidInput(format!("max upload size must be bytes, got '{v}'"))
            })
        })
        .transpose()?
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

    Ok(ExtractionSettings {
        max_upload_bytes,
        timeout: Duration::from_secs(timeout_secs),
    })
}

/// Assemble model settings from optional raw values.
pub fn model_config_from_env_values(
    name: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
) -> ModelConfig {
    ModelConfig {
        name: non_blank(name).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        base_url: non_blank(base_url),
        api_key: non_blank(api_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_defaults_to_file() {
        assert_eq!(store_backend_from_env_value(None).unwrap(), StoreBackend::File);
        assert_eq!(
            store_backend_from_env_value(Some("  ".into())).unwrap(),
            StoreBackend::File
        );
        assert_eq!(
            store_backend_from_env_value(Some("Memory".into())).unwrap(),
            StoreBackend::Memory
        );
        assert!(store_backend_from_env_value(Some("postgres".into())).is_err());
    }

    #[test]
    fn extraction_settings_parse_and_default() {
        let defaults = extraction_settings_from_env_values(None, None).unwrap();
        assert_eq!(defaults.timeout, Duration::from_secs(60));
        assert_eq!(defaults.max_upload_bytes, 10 * 1024 * 1024);

        let custom =
            extraction_settings_from_env_values(Some("15".into()), Some("2048".into())).unwrap();
        assert_eq!(custom.timeout, Duration::from_secs(15));
        assert_eq!(custom.max_upload_bytes, 2048);

        assert!(extraction_settings_from_env_values(Some("soon".into()), None).is_err());
    }

    #[test]
    fn config_rejects_zero_limits_and_blank_service() {
        let zero = ExtractionSettings {
            max_upload_bytes: 0,
            ..ExtractionSettings::default()
        };
        assert!(CoreConfig::new(
            "data".into(),
            StoreBackend::Memory,
            "URG".into(),
            zero,
            ModelConfig::default()
        )
        .is_err());

        assert!(CoreConfig::new(
            "data".into(),
            StoreBackend::Memory,
            "  ".into(),
            ExtractionSettings::default(),
            ModelConfig::default()
        )
        .is_err());
    }

    #[test]
    fn derived_directories_live_under_data_dir() {
        let cfg = CoreConfig::new(
            "/srv/radtrack".into(),
            StoreBackend::File,
            default_service_from_env_value(None),
            ExtractionSettings::default(),
            ModelConfig::default(),
        )
        .unwrap();
        assert_eq!(cfg.studies_dir(), PathBuf::from("/srv/radtrack/studies"));
        assert_eq!(cfg.users_dir(), PathBuf::from("/srv/radtrack/users"));
        assert_eq!(cfg.default_service(), "URG");
    }

    #[test]
    fn model_config_debug_hides_key() {
        let model = model_config_from_env_values(None, None, Some("secret".into()));
        assert_eq!(model.name, "gemini-1.5-flash-latest");
        assert!(!format!("{model:?}").contains("secret"));
    }
}
