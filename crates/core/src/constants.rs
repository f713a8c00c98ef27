//! Constants used throughout the radtrack core crate.
//!
//! This module contains path, filename and domain-list constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default directory for persisted records when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "radtrack_data";

/// Directory name for tracked study records.
pub const STUDIES_DIR_NAME: &str = "studies";

/// Directory name for authorization audit records.
pub const AUTHORIZATIONS_DIR_NAME: &str = "authorizations";

/// Directory name for user profiles.
pub const USERS_DIR_NAME: &str = "users";

/// Filename for a tracked study inside its sharded directory.
pub const STUDY_FILENAME: &str = "study.yaml";

/// Filename for an authorization audit record inside its sharded directory.
pub const AUTHORIZATION_FILENAME: &str = "authorization.yaml";

/// Filename for a user profile inside `users/<uid>/`.
pub const PROFILE_FILENAME: &str = "profile.yaml";

/// Service area assigned to new studies when the caller gives none.
pub const DEFAULT_SERVICE: &str = "URG";

/// Display value for missing text on feed records and audit entries.
pub const NOT_AVAILABLE: &str = "N/A";

/// Default extraction model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Default bound on a single model call.
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;

/// Default upload size limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Files per extraction request that the REST body limit makes room for at full size.
pub const MAX_REQUEST_FILES: usize = 10;

/// Modality buckets of the pending summary, in display order.
pub const MODALITY_BUCKETS: [&str; 4] = ["ECO", "RX", "TAC", "RMN"];

/// Service-area buckets of the pending summary, in display order.
pub const SERVICE_BUCKETS: [&str; 4] = ["URG", "HOSP", "UCI", "C. EXT"];
