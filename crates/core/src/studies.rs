//! Operations on existing study records: lookup, status changes, edits and document export.

use crate::lifecycle::apply_transition;
use crate::store::DocumentStore;
use crate::study::{CancellationReason, StudyStatus, TrackedStudy};
use crate::validation::validate_service;
use crate::{StudyError, StudyResult};
use chrono::Utc;
use documents::{DocumentKind, DocumentOptions};
use orders::ExtractedOrder;
use radtrack_uuid::RecordId;
use serde_json::Value;
use std::sync::Arc;

/// A rendered authorization document ready for download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Renders the authorization document for an order.
pub fn render_authorization(
    order: &ExtractedOrder,
    kind: DocumentKind,
) -> StudyResult<RenderedDocument> {
    let options = DocumentOptions {
        kind,
        generated_at: Some(Utc::now()),
    };
    let bytes = documents::render(order, &options)?;
    Ok(RenderedDocument {
        file_name: kind.file_name(order.patient.id.as_str()),
        bytes,
    })
}

#[derive(Clone)]
pub struct StudyService {
    store: Arc<dyn DocumentStore>,
}

impl StudyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Loads a study by its textual id.
    ///
    /// # Errors
    ///
    /// [`StudyError::InvalidId`] if `id` is not canonical, [`StudyError::NotFound`] if no
    /// such study exists.
    pub async fn get(&self, id: &str) -> StudyResult<TrackedStudy> {
        let id = RecordId::parse(id)?;
        self.store
            .get_study(&id)
            .await?
            .ok_or_else(|| StudyError::NotFound(id.to_string()))
    }

    /// Moves a study to `status`.
    ///
    /// `reason` must name one of the fixed cancellation reasons and is only accepted when
    /// cancelling. Concurrent writers are not detected; the last write wins.
    pub async fn change_status(
        &self,
        id: &str,
        status: StudyStatus,
        reason: Option<&str>,
    ) -> StudyResult<TrackedStudy> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::parse::<CancellationReason>)
            .transpose()?;

        let mut study = self.get(id).await?;
        let from = study.status;
        apply_transition(&mut study, status, reason, Utc::now())?;
        self.persist(&study).await?;
        tracing::info!(study_id = %study.id, "status changed {} -> {}", from, status);
        Ok(study)
    }

    /// Marks a pending study as completed.
    pub async fn complete(&self, id: &str) -> StudyResult<TrackedStudy> {
        self.change_status(id, StudyStatus::Completado, None).await
    }

    /// Replaces the order data of a study, and its service when one is given.
    ///
    /// The order is validated all-or-nothing before anything is written. Identity, status
    /// and dates are left alone.
    pub async fn edit(
        &self,
        id: &str,
        order: Value,
        service: Option<&str>,
    ) -> StudyResult<TrackedStudy> {
        let order = ExtractedOrder::from_value(order)?;
        let service = service
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(validate_service)
            .transpose()?;

        let mut study = self.get(id).await?;
        study.replace_order(order);
        if let Some(service) = service {
            study.service = service;
        }
        self.persist(&study).await?;
        tracing::info!(study_id = %study.id, "study edited");
        Ok(study)
    }

    /// Renders the authorization document from a stored study's order data.
    pub async fn authorization_document(
        &self,
        id: &str,
        kind: DocumentKind,
    ) -> StudyResult<RenderedDocument> {
        let study = self.get(id).await?;
        render_authorization(&study.to_order(), kind)
    }

    async fn persist(&self, study: &TrackedStudy) -> StudyResult<()> {
        self.store.update_study(study).await.map_err(|e| {
            tracing::error!(study_id = %study.id, "failed to update study: {}", e);
            StudyError::Store(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::study::tests::study;
    use serde_json::json;

    async fn seeded(status: StudyStatus) -> (StudyService, String) {
        let store = Arc::new(MemoryStore::new());
        let s = study(status, "URG", "RX DE TORAX");
        store.insert_study(&s).await.unwrap();
        (StudyService::new(store), s.id.to_string())
    }

    #[tokio::test]
    async fn get_rejects_bad_and_unknown_ids() {
        let (svc, _) = seeded(StudyStatus::Pendiente).await;
        assert!(matches!(svc.get("nope").await, Err(StudyError::InvalidId(_))));
        assert!(matches!(
            svc.get(&RecordId::new().to_string()).await,
            Err(StudyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn quick_complete_sets_completion_date() {
        let (svc, id) = seeded(StudyStatus::Pendiente).await;
        let done = svc.complete(&id).await.unwrap();
        assert_eq!(done.status, StudyStatus::Completado);
        assert!(done.completion_date.is_some());
        assert_eq!(svc.get(&id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn cancel_with_reason_then_reopen() {
        let (svc, id) = seeded(StudyStatus::Pendiente).await;
        let cancelled = svc
            .change_status(&id, StudyStatus::Cancelado, Some("requiere sedación"))
            .await
            .unwrap();
        assert_eq!(
            cancelled.cancellation_reason,
            Some(CancellationReason::RequiereSedacion)
        );

        let reopened = svc
            .change_status(&id, StudyStatus::Pendiente, None)
            .await
            .unwrap();
        assert!(reopened.completion_date.is_none());
        assert!(reopened.cancellation_reason.is_none());
    }

    #[tokio::test]
    async fn invalid_status_changes_write_nothing() {
        let (svc, id) = seeded(StudyStatus::Pendiente).await;
        assert!(matches!(
            svc.change_status(&id, StudyStatus::Cancelado, None).await,
            Err(StudyError::MissingCancellationReason)
        ));
        assert!(matches!(
            svc.change_status(&id, StudyStatus::Cancelado, Some("Lluvia")).await,
            Err(StudyError::UnknownCancellationReason(_))
        ));
        assert_eq!(svc.get(&id).await.unwrap().status, StudyStatus::Pendiente);

        let (svc, id) = seeded(StudyStatus::Completado).await;
        assert!(matches!(
            svc.change_status(&id, StudyStatus::Leido, None).await,
            Err(StudyError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn edit_revalidates_and_keeps_lifecycle() {
        let (svc, id) = seeded(StudyStatus::Completado).await;
        let before = svc.get(&id).await.unwrap();

        let mut order = serde_json::to_value(before.to_order()).unwrap();
        order["patient"]["fullName"] = json!("JUAN P. PEREZ");
        order["studies"][0]["nombre"] = json!("ECOGRAFIA ABDOMINAL");
        let edited = svc.edit(&id, order.clone(), Some("HOSP")).await.unwrap();
        assert_eq!(edited.patient.full_name.as_str(), "JUAN P. PEREZ");
        assert_eq!(edited.service, "HOSP");
        assert_eq!(edited.status, before.status);
        assert_eq!(edited.request_date, before.request_date);
        assert_eq!(edited.completion_date, before.completion_date);

        order["studies"] = json!([]);
        assert!(matches!(
            svc.edit(&id, order, None).await,
            Err(StudyError::Validation(_))
        ));
        assert_eq!(svc.get(&id).await.unwrap(), edited);
    }

    #[tokio::test]
    async fn authorization_document_uses_patient_id_in_file_name() {
        let (svc, id) = seeded(StudyStatus::Pendiente).await;
        let doc = svc
            .authorization_document(&id, DocumentKind::Own)
            .await
            .unwrap();
        assert_eq!(doc.file_name, "Autorizacion-propia-123.pdf");
        assert!(doc.bytes.starts_with(b"%PDF"));
    }
}
