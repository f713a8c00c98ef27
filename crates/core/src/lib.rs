//! # RadTrack Core
//!
//! Core business logic for the radiology order tracker.
//!
//! This crate contains the record lifecycle and everything built on top of persisted studies:
//! - Ingestion of validated orders as `Pendiente` studies, singly or in batches
//! - Status transitions, edits and authorization document export
//! - The study feed: display projection, filters and pending summaries, live or on demand
//! - Staff profiles and privileged role assignment
//! - File-backed and in-memory document stores
//!
//! **No API concerns**: HTTP servers, request parsing and status codes belong in `api-rest` and
//! `api-shared`.

pub mod auth;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod feed;
pub mod ingestion;
pub mod lifecycle;
pub mod store;
pub mod studies;
pub mod study;
pub mod users;
pub mod validation;

pub use auth::{Account, Caller, Claims, CredentialProvider, LocalCredentialProvider};
pub use config::{CoreConfig, ModelConfig, StoreBackend};
pub use context::AppContext;
pub use error::{
    CredentialError, CredentialResult, StoreError, StoreResult, StudyError, StudyResult,
};
pub use feed::{
    compute_view, derive_modality, normalize_service, DisplayStudy, FeedFilters, FeedView,
    StudyFeed, SummaryBucket,
};
pub use ingestion::{BatchIngestReport, BatchItem, IngestionService};
pub use store::{DocumentStore, FileStore, MemoryStore};
pub use studies::{render_authorization, RenderedDocument, StudyService};
pub use study::{AuthorizationRecord, CancellationReason, StudyStatus, TrackedStudy};
pub use users::{
    AssignedService, ProfileRequest, Role, RoleAssignment, RoleAssignmentOutcome, UserProfile,
    UserService,
};
