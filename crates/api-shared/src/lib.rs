//! # API Shared
//!
//! Shared utilities and definitions for the RadTrack APIs.
//!
//! Contains:
//! - Wire request/response types with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - Bearer-token parsing used by the REST authentication extractor
//!
//! Used by `api-rest`.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
