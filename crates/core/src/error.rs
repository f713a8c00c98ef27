use crate::study::StudyStatus;

/// Errors raised by the document stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create storage directory {path}: {source}", path = path.display())]
    DirCreation {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}", path = path.display())]
    FileWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}", path = path.display())]
    FileRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("record violates storage invariant: {0}")]
    Invariant(String),
    #[error("record {0} does not exist")]
    Missing(String),
    #[error("record {0} already exists")]
    Duplicate(String),
    #[error("invalid record key: {0}")]
    InvalidKey(String),
    #[error("store task failed: {0}")]
    Task(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by credential providers.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("missing or invalid credential")]
    InvalidToken,
    #[error("no account with email {0}")]
    UserNotFound(String),
    #[error("no account with uid {0}")]
    UnknownUid(String),
    #[error("failed to read accounts file {path}: {source}", path = path.display())]
    FileRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid accounts file: {0}")]
    InvalidSeed(String),
}

pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Errors raised by the study, ingestion, feed and user services.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("order validation failed: {0}")]
    Validation(#[from] orders::ValidationError),
    #[error("invalid study id: {0}")]
    InvalidId(#[from] radtrack_uuid::UuidError),
    #[error("study {0} not found")]
    NotFound(String),
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: StudyStatus, to: StudyStatus },
    #[error("cancelling a study requires a cancellation reason")]
    MissingCancellationReason,
    #[error("unknown cancellation reason '{0}'")]
    UnknownCancellationReason(String),
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),
    #[error("permission denied")]
    PermissionDenied,
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("service '{service}' is not valid for role '{role}'")]
    ServiceNotAllowed { role: String, service: String },
    #[error("profile for {0} already exists")]
    ProfileExists(String),
    #[error("profile for {0} not found")]
    ProfileNotFound(String),
    #[error(
        "claims for {uid} were updated but the profile write failed (re-run to repair): {source}"
    )]
    ProfileProjectionFailed {
        uid: String,
        #[source]
        source: StoreError,
    },
    #[error("document generation failed: {0}")]
    Document(#[from] documents::DocumentError),
    #[error("extraction failed: {0}")]
    Extraction(#[from] extraction::ExtractionError),
}

pub type StudyResult<T> = std::result::Result<T, StudyError>;
