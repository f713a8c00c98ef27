//! Persistent study records.

use chrono::{DateTime, Utc};
use orders::{Diagnosis, ExtractedOrder, OrderInfo, OrderPatient, Physician, RequestedStudy};
use radtrack_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::StudyError;

/// Lifecycle state of a tracked study.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StudyStatus {
    Pendiente,
    Completado,
    #[serde(rename = "Leído", alias = "Leido")]
    Leido,
    Cancelado,
}

impl StudyStatus {
    pub const ALL: [StudyStatus; 4] = [
        StudyStatus::Pendiente,
        StudyStatus::Completado,
        StudyStatus::Leido,
        StudyStatus::Cancelado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StudyStatus::Pendiente => "Pendiente",
            StudyStatus::Completado => "Completado",
            StudyStatus::Leido => "Leído",
            StudyStatus::Cancelado => "Cancelado",
        }
    }
}

impl fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyStatus {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pendiente" => Ok(StudyStatus::Pendiente),
            "completado" => Ok(StudyStatus::Completado),
            "leído" | "leido" => Ok(StudyStatus::Leido),
            "cancelado" => Ok(StudyStatus::Cancelado),
            _ => Err(StudyError::InvalidInput(format!("unknown status '{s}'"))),
        }
    }
}

/// Why a study was cancelled. The list is fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancellationReason {
    #[serde(rename = "Creatinina elevada")]
    CreatininaElevada,
    #[serde(rename = "Sin ayuno")]
    SinAyuno,
    #[serde(rename = "Requiere sedación")]
    RequiereSedacion,
    #[serde(rename = "Estudio cancelado por médico")]
    CanceladoPorMedico,
    #[serde(rename = "Estudio mal cargado")]
    MalCargado,
}

impl CancellationReason {
    pub const ALL: [CancellationReason; 5] = [
        CancellationReason::CreatininaElevada,
        CancellationReason::SinAyuno,
        CancellationReason::RequiereSedacion,
        CancellationReason::CanceladoPorMedico,
        CancellationReason::MalCargado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CancellationReason::CreatininaElevada => "Creatinina elevada",
            CancellationReason::SinAyuno => "Sin ayuno",
            CancellationReason::RequiereSedacion => "Requiere sedación",
            CancellationReason::CanceladoPorMedico => "Estudio cancelado por médico",
            CancellationReason::MalCargado => "Estudio mal cargado",
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CancellationReason {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StudyError::UnknownCancellationReason(wanted.to_string()))
    }
}

/// One imaging order placed with the department.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedStudy {
    pub id: RecordId,
    pub status: StudyStatus,
    pub service: String,
    pub patient: OrderPatient,
    pub studies: Vec<RequestedStudy>,
    pub diagnosis: Diagnosis,
    pub physician: Physician,
    pub order: OrderInfo,
    pub request_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<CancellationReason>,
}

impl TrackedStudy {
    /// A new Pendiente study built from a validated order.
    pub fn new(order: ExtractedOrder, service: String, request_date: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            status: StudyStatus::Pendiente,
            service,
            patient: order.patient,
            studies: order.studies,
            diagnosis: order.diagnosis,
            physician: order.physician,
            order: order.order,
            request_date,
            completion_date: None,
            cancellation_reason: None,
        }
    }

    /// The order data embedded in this record.
    pub fn to_order(&self) -> ExtractedOrder {
        ExtractedOrder {
            patient: self.patient.clone(),
            studies: self.studies.clone(),
            diagnosis: self.diagnosis.clone(),
            physician: self.physician.clone(),
            order: self.order.clone(),
        }
    }

    /// Replaces the order sections, leaving identity, status and dates alone.
    pub fn replace_order(&mut self, order: ExtractedOrder) {
        self.patient = order.patient;
        self.studies = order.studies;
        self.diagnosis = order.diagnosis;
        self.physician = order.physician;
        self.order = order.order;
    }

    /// Checks the record-level invariants that every store enforces before writing.
    ///
    /// Returns a description of the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.studies.is_empty() {
            return Err("study record must contain at least one requested study".into());
        }
        if self.service.trim().is_empty() {
            return Err("service cannot be empty".into());
        }
        if self.cancellation_reason.is_some() && self.status != StudyStatus::Cancelado {
            return Err(format!(
                "cancellation reason present on a {} study",
                self.status
            ));
        }
        match self.status {
            StudyStatus::Cancelado if self.cancellation_reason.is_none() => {
                Err("Cancelado study without cancellation reason".into())
            }
            StudyStatus::Completado | StudyStatus::Cancelado if self.completion_date.is_none() => {
                Err(format!("{} study without completion date", self.status))
            }
            StudyStatus::Pendiente if self.completion_date.is_some() => {
                Err("Pendiente study with completion date".into())
            }
            _ => Ok(()),
        }
    }
}

/// Audit entry written when an authorization document was generated for a new study.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRecord {
    pub study_id: RecordId,
    pub patient_id: String,
    pub patient_full_name: String,
    pub study_name: String,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    pub(crate) fn order_named(patient_id: &str, full_name: &str, study: &str) -> ExtractedOrder {
        ExtractedOrder::from_value(json!({
            "patient": {
                "id": patient_id,
                "fullName": full_name,
                "birthDate": "1980-06-15",
                "sex": "M",
                "entidad": "NUEVA EPS"
            },
            "studies": [{ "cups": "871121", "nombre": study }],
            "diagnosis": { "code": "R05X", "description": "TOS" },
            "physician": {
                "fullName": "ANA GOMEZ",
                "registryNumber": "RM-5521",
                "specialty": "MEDICINA GENERAL"
            },
            "order": { "date": "2024-05-02", "institutionName": "HOSPITAL SAN JOSE" }
        }))
        .expect("fixture order is valid")
    }

    pub(crate) fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    pub(crate) fn study(status: StudyStatus, service: &str, name: &str) -> TrackedStudy {
        let mut s = TrackedStudy::new(order_named("123", "JUAN PEREZ", name), service.into(), at(2, 8));
        s.status = status;
        match status {
            StudyStatus::Completado => s.completion_date = Some(at(2, 10)),
            StudyStatus::Cancelado => {
                s.completion_date = Some(at(2, 10));
                s.cancellation_reason = Some(CancellationReason::SinAyuno);
            }
            _ => {}
        }
        s
    }

    #[test]
    fn status_serialises_with_accent() {
        assert_eq!(serde_json::to_value(StudyStatus::Leido).unwrap(), json!("Leído"));
        let parsed: StudyStatus = serde_json::from_value(json!("Leido")).unwrap();
        assert_eq!(parsed, StudyStatus::Leido);
        assert_eq!("cancelado".parse::<StudyStatus>().unwrap(), StudyStatus::Cancelado);
        assert!("Archivado".parse::<StudyStatus>().is_err());
    }

    #[test]
    fn cancellation_reasons_are_the_fixed_list() {
        let names: Vec<&str> = CancellationReason::ALL.iter().map(|r| r.as_str()).collect();
        assert_eq!(
            names,
            [
                "Creatinina elevada",
                "Sin ayuno",
                "Requiere sedación",
                "Estudio cancelado por médico",
                "Estudio mal cargado"
            ]
        );
        assert_eq!(
            "sin ayuno".parse::<CancellationReason>().unwrap(),
            CancellationReason::SinAyuno
        );
        assert!(matches!(
            "Paciente no asistió".parse::<CancellationReason>(),
            Err(StudyError::UnknownCancellationReason(_))
        ));
    }

    #[test]
    fn new_study_is_pending_without_completion() {
        let s = study(StudyStatus::Pendiente, "URG", "RX DE TORAX");
        assert_eq!(s.status, StudyStatus::Pendiente);
        assert!(s.completion_date.is_none());
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn invariants_catch_inconsistent_records() {
        let mut s = study(StudyStatus::Pendiente, "URG", "RX DE TORAX");
        s.cancellation_reason = Some(CancellationReason::SinAyuno);
        assert!(s.check_invariants().is_err());

        let mut s = study(StudyStatus::Cancelado, "URG", "RX DE TORAX");
        s.cancellation_reason = None;
        assert!(s.check_invariants().is_err());

        let mut s = study(StudyStatus::Completado, "URG", "RX DE TORAX");
        s.completion_date = None;
        assert!(s.check_invariants().is_err());

        let mut s = study(StudyStatus::Pendiente, "URG", "RX DE TORAX");
        s.studies.clear();
        assert!(s.check_invariants().is_err());
    }

    #[test]
    fn record_serialises_with_camel_case_and_null_completion() {
        let s = study(StudyStatus::Pendiente, "URG", "RX DE TORAX");
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["status"], "Pendiente");
        assert_eq!(value["patient"]["fullName"], "JUAN PEREZ");
        assert!(value["completionDate"].is_null());
        assert!(value.get("cancellationReason").is_none());
        assert!(value.get("requestDate").is_some());

        let back: TrackedStudy = serde_json::from_value(value).unwrap();
        assert_eq!(back, s);
    }
}
