//! Display projection, filtering and pending summaries over the full study collection.
//!
//! Every view is recomputed from a complete snapshot of the store; nothing is derived
//! incrementally.

use crate::constants::{MODALITY_BUCKETS, NOT_AVAILABLE, SERVICE_BUCKETS};
use crate::store::DocumentStore;
use crate::study::{CancellationReason, StudyStatus, TrackedStudy};
use crate::StudyResult;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::stream::{self, Stream};
use orders::{Diagnosis, OrderPatient};
use radtrack_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Modality tag for a study name.
///
/// Keyword rules are checked in order: TOMOGRAFIA/TAC, ECOGRAFIA, RESONANCIA/RMN, RAYOS X/RX.
/// Otherwise the first three characters of the upper-cased name, or `N/A` for an empty name.
pub fn derive_modality(study_name: &str) -> String {
    let name = study_name.to_uppercase();
    let has = |needle: &str| name.contains(needle);
    if has("TOMOGRAFIA") || has("TAC") {
        "TAC".to_string()
    } else if has("ECOGRAFIA") {
        "ECO".to_string()
    } else if has("RESONANCIA") || has("RMN") {
        "RMN".to_string()
    } else if has("RAYOS X") || has("RX") {
        "RX".to_string()
    } else if name.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        name.chars().take(3).collect()
    }
}

/// Upper-cases a service code and rewrites `C.EXT` to the display form `C. EXT`.
pub fn normalize_service(service: &str) -> String {
    let upper = service.trim().to_uppercase();
    match upper.as_str() {
        "" => NOT_AVAILABLE.to_string(),
        "C.EXT" => "C. EXT".to_string(),
        _ => upper,
    }
}

/// A study reshaped for the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayStudy {
    pub id: RecordId,
    pub status: StudyStatus,
    /// Normalized service area.
    pub service: String,
    pub patient: OrderPatient,
    /// Whole years at the reference date.
    pub age: Option<u32>,
    pub study_name: String,
    pub cups: String,
    pub modality: String,
    pub diagnosis: Diagnosis,
    pub request_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<CancellationReason>,
}

impl DisplayStudy {
    pub fn from_record(record: &TrackedStudy, today: NaiveDate) -> Self {
        let first = record.studies.first();
        let study_name = first
            .map(|s| s.nombre.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Self {
            id: record.id,
            status: record.status,
            service: normalize_service(&record.service),
            patient: record.patient.clone(),
            age: record.patient.birth_date.years_until(today),
            modality: derive_modality(first.map(|s| s.nombre.as_str()).unwrap_or("")),
            study_name,
            cups: first
                .map(|s| s.cups.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            diagnosis: record.diagnosis.clone(),
            request_date: record.request_date,
            completion_date: record.completion_date,
            cancellation_reason: record.cancellation_reason,
        }
    }
}

/// Active filter selections. An empty selection or unset bound matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FeedFilters {
    /// Case-insensitive substring of the patient's full name or id.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub modalities: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<StudyStatus>,
    /// Inclusive lower bound on the request date (UTC calendar day).
    #[serde(default)]
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the request date (UTC calendar day).
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl FeedFilters {
    pub fn matches_search(&self, study: &DisplayStudy) -> bool {
        let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let term = term.to_lowercase();
        study.patient.full_name.as_str().to_lowercase().contains(&term)
            || study.patient.id.as_str().to_lowercase().contains(&term)
    }

    pub fn matches_modality(&self, study: &DisplayStudy) -> bool {
        self.modalities.is_empty()
            || self
                .modalities
                .iter()
                .any(|m| m.trim().eq_ignore_ascii_case(&study.modality))
    }

    pub fn matches_service(&self, study: &DisplayStudy) -> bool {
        self.services.is_empty()
            || self
                .services
                .iter()
                .any(|s| normalize_service(s) == study.service)
    }

    pub fn matches_status(&self, study: &DisplayStudy) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&study.status)
    }

    pub fn matches_date(&self, study: &DisplayStudy) -> bool {
        let day = study.request_date.date_naive();
        self.from.is_none_or(|from| day >= from) && self.to.is_none_or(|to| day <= to)
    }

    pub fn matches(&self, study: &DisplayStudy) -> bool {
        self.matches_search(study)
            && self.matches_modality(study)
            && self.matches_service(study)
            && self.matches_status(study)
            && self.matches_date(study)
    }
}

/// Count of pending studies in one fixed bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryBucket {
    pub key: String,
    pub count: usize,
}

/// One recomputation of the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    /// Filtered display records, newest request first.
    pub studies: Vec<DisplayStudy>,
    /// Number of records before filtering.
    pub total: usize,
    /// Pendiente counts by modality over the unfiltered set.
    pub modality_summary: Vec<SummaryBucket>,
    /// Pendiente counts by normalized service over the unfiltered set.
    pub service_summary: Vec<SummaryBucket>,
}

impl FeedView {
    pub fn modality_count(&self, key: &str) -> usize {
        bucket_count(&self.modality_summary, key)
    }

    pub fn service_count(&self, key: &str) -> usize {
        bucket_count(&self.service_summary, key)
    }
}

fn bucket_count(buckets: &[SummaryBucket], key: &str) -> usize {
    buckets
        .iter()
        .find(|b| b.key == key)
        .map(|b| b.count)
        .unwrap_or(0)
}

fn summarize<'a>(keys: &[&str], values: impl Iterator<Item = &'a str> + Clone) -> Vec<SummaryBucket> {
    keys.iter()
        .map(|key| SummaryBucket {
            key: (*key).to_string(),
            count: values.clone().filter(|v| v == key).count(),
        })
        .collect()
}

/// Reshapes, filters and summarizes a full snapshot of records.
///
/// Records that match no fixed bucket still appear in `studies`; they are only left out of the
/// summaries.
pub fn compute_view(records: &[TrackedStudy], filters: &FeedFilters, today: NaiveDate) -> FeedView {
    let all: Vec<DisplayStudy> = records
        .iter()
        .map(|r| DisplayStudy::from_record(r, today))
        .collect();

    let pending = all.iter().filter(|s| s.status == StudyStatus::Pendiente);
    let modality_summary = summarize(&MODALITY_BUCKETS, pending.clone().map(|s| s.modality.as_str()));
    let service_summary = summarize(&SERVICE_BUCKETS, pending.map(|s| s.service.as_str()));

    let total = all.len();
    let mut studies: Vec<DisplayStudy> = all.into_iter().filter(|s| filters.matches(s)).collect();
    // stable, so equal request dates keep store order
    studies.sort_by(|a, b| b.request_date.cmp(&a.request_date));

    FeedView {
        studies,
        total,
        modality_summary,
        service_summary,
    }
}

/// Live view over the study collection.
#[derive(Clone)]
pub struct StudyFeed {
    store: Arc<dyn DocumentStore>,
}

impl StudyFeed {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The current view under `filters`.
    pub async fn snapshot(&self, filters: &FeedFilters) -> StudyResult<FeedView> {
        load_view(self.store.as_ref(), filters).await
    }

    /// A stream yielding the current view immediately and again after every store change.
    ///
    /// Changes that land while a view is being computed are folded into the next one, so a
    /// slow consumer sees the latest state rather than every intermediate one.
    pub fn live(
        &self,
        filters: FeedFilters,
    ) -> impl Stream<Item = StudyResult<FeedView>> + Send + 'static {
        let store = Arc::clone(&self.store);
        let changes = store.subscribe();
        stream::unfold(
            (store, changes, filters, true),
            |(store, mut changes, filters, first)| async move {
                if !first && changes.changed().await.is_err() {
                    return None;
                }
                changes.borrow_and_update();
                let view = load_view(store.as_ref(), &filters).await;
                if let Err(e) = &view {
                    tracing::error!("failed to refresh study feed: {}", e);
                }
                Some((view, (store, changes, filters, false)))
            },
        )
    }
}

async fn load_view(store: &dyn DocumentStore, filters: &FeedFilters) -> StudyResult<FeedView> {
    let records = store.list_studies().await?;
    Ok(compute_view(&records, filters, Utc::now().date_naive()))
}
