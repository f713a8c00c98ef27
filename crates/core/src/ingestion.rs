//! Turning validated orders into tracked studies.

use crate::config::CoreConfig;
use crate::constants::NOT_AVAILABLE;
use crate::store::DocumentStore;
use crate::study::{AuthorizationRecord, TrackedStudy};
use crate::validation::validate_service;
use crate::StudyResult;
use chrono::Utc;
use futures_util::future::join_all;
use orders::ExtractedOrder;
use radtrack_uuid::RecordId;
use serde_json::Value;
use std::sync::Arc;

/// One entry of a batch ingestion. The order is untyped and validated per item.
#[derive(Clone, Debug)]
pub struct BatchItem {
    pub order: Value,
    pub service: Option<String>,
    pub document_generated: bool,
}

/// Per-item outcomes of a batch ingestion, in input order.
#[derive(Debug)]
pub struct BatchIngestReport {
    pub outcomes: Vec<StudyResult<RecordId>>,
}

impl BatchIngestReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

#[derive(Clone)]
pub struct IngestionService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn DocumentStore>,
}

impl IngestionService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn DocumentStore>) -> Self {
        Self { cfg, store }
    }

    /// Persists a new `Pendiente` study and returns its id.
    ///
    /// `service` falls back to the configured default when absent or blank. When
    /// `document_generated` is set an authorization audit entry is also written; that write is
    /// best-effort and its failure is logged without undoing the study.
    ///
    /// # Errors
    ///
    /// Returns an input error for a malformed service code, or a store error if the study
    /// could not be written.
    pub async fn create_study(
        &self,
        order: ExtractedOrder,
        service: Option<&str>,
        document_generated: bool,
    ) -> StudyResult<RecordId> {
        let service = match service.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => validate_service(s)?,
            None => self.cfg.default_service().to_string(),
        };

        let now = Utc::now();
        let study = TrackedStudy::new(order, service, now);
        if let Err(e) = self.store.insert_study(&study).await {
            tracing::error!(patient_id = %study.patient.id, "failed to persist study: {}", e);
            return Err(e.into());
        }
        tracing::info!(study_id = %study.id, service = %study.service, "study created");

        if document_generated {
            let record = AuthorizationRecord {
                study_id: study.id,
                patient_id: study.patient.id.to_string(),
                patient_full_name: study.patient.full_name.to_string(),
                study_name: study
                    .studies
                    .first()
                    .map(|s| s.nombre.to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                generated_at: now,
            };
            if let Err(e) = self.store.insert_authorization(&record).await {
                tracing::warn!(study_id = %study.id, "authorization audit write failed: {}", e);
            }
        }

        Ok(study.id)
    }

    /// Validates an untyped order and creates a study from it.
    pub async fn create_study_from_value(
        &self,
        order: Value,
        service: Option<&str>,
        document_generated: bool,
    ) -> StudyResult<RecordId> {
        let order = ExtractedOrder::from_value(order)?;
        self.create_study(order, service, document_generated).await
    }

    /// Creates one study per item, concurrently. A failing item never stops the others.
    pub async fn create_batch(&self, items: Vec<BatchItem>) -> BatchIngestReport {
        let outcomes = join_all(items.into_iter().map(|item| async move {
            self.create_study_from_value(
                item.order,
                item.service.as_deref(),
                item.document_generated,
            )
            .await
        }))
        .await;

        let report = BatchIngestReport { outcomes };
        tracing::info!(
            success = report.success_count(),
            errors = report.error_count(),
            "batch ingestion finished"
        );
        report
    }
}
