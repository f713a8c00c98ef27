//! Lenient read model of an order.
//!
//! Every field is optional here so that deserialisation only fails on type mismatches. The
//! required-field and date checks then run in field-table order over the parsed structure,
//! which keeps error reporting deterministic.

use crate::order::{
    Diagnosis, ExtractedOrder, OrderInfo, OrderPatient, Physician, RequestedStudy,
};
use crate::{ValidationError, ValidationResult};
use radtrack_types::{IsoDate, NonEmptyText};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct OrderWire {
    patient: Option<PatientWire>,
    studies: Option<Vec<StudyWire>>,
    diagnosis: Option<DiagnosisWire>,
    physician: Option<PhysicianWire>,
    order: Option<OrderInfoWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PatientWire {
    id: Option<String>,
    full_name: Option<String>,
    birth_date: Option<String>,
    sex: Option<String>,
    entidad: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StudyWire {
    cups: Option<String>,
    nombre: Option<String>,
    details: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DiagnosisWire {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PhysicianWire {
    full_name: Option<String>,
    registry_number: Option<String>,
    specialty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OrderInfoWire {
    date: Option<String>,
    institution_name: Option<String>,
    admission_number: Option<String>,
}

fn section<T>(value: Option<T>, key: &str) -> ValidationResult<T> {
    value.ok_or_else(|| ValidationError::MissingField { field: key.into() })
}

fn required(value: Option<String>, field: &str) -> ValidationResult<NonEmptyText> {
    value
        .and_then(|v| NonEmptyText::new(v).ok())
        .ok_or_else(|| ValidationError::MissingField {
            field: field.into(),
        })
}

fn optional(value: Option<String>) -> Option<NonEmptyText> {
    value.and_then(|v| NonEmptyText::new(v).ok())
}

fn date(value: Option<String>, field: &str) -> ValidationResult<IsoDate> {
    let text = required(value, field)?;
    IsoDate::parse(text.as_str()).map_err(|_| ValidationError::MalformedDate {
        field: field.into(),
        value: text.into_inner(),
    })
}

impl OrderWire {
    pub(crate) fn into_domain(self) -> ValidationResult<ExtractedOrder> {
        let p = section(self.patient, "patient")?;
        let patient = OrderPatient {
            id: required(p.id, "patient.id")?,
            full_name: required(p.full_name, "patient.fullName")?,
            birth_date: date(p.birth_date, "patient.birthDate")?,
            sex: required(p.sex, "patient.sex")?,
            entidad: required(p.entidad, "patient.entidad")?,
        };

        let raw_studies = section(self.studies, "studies")?;
        if raw_studies.is_empty() {
            return Err(ValidationError::NoStudies);
        }
        let studies = raw_studies
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                Ok(RequestedStudy {
                    cups: required(s.cups, &format!("studies[{i}].cups"))?,
                    nombre: required(s.nombre, &format!("studies[{i}].nombre"))?,
                    details: optional(s.details),
                })
            })
            .collect::<ValidationResult<Vec<_>>>()?;

        let d = section(self.diagnosis, "diagnosis")?;
        let diagnosis = Diagnosis {
            code: required(d.code, "diagnosis.code")?,
            description: required(d.description, "diagnosis.description")?,
        };

        let ph = section(self.physician, "physician")?;
        let physician = Physician {
            full_name: required(ph.full_name, "physician.fullName")?,
            registry_number: required(ph.registry_number, "physician.registryNumber")?,
            specialty: required(ph.specialty, "physician.specialty")?,
        };

        let o = section(self.order, "order")?;
        let order = OrderInfo {
            date: date(o.date, "order.date")?,
            institution_name: required(o.institution_name, "order.institutionName")?,
            admission_number: optional(o.admission_number),
        };

        Ok(ExtractedOrder {
            patient,
            studies,
            diagnosis,
            physician,
            order,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::order::tests::sample_value;
    use crate::{ExtractedOrder, ValidationError};
    use serde_json::json;

    #[test]
    fn first_violation_in_table_order_wins() {
        let mut value = sample_value();
        value["physician"]["fullName"] = json!("");
        value["patient"]["sex"] = json!("");
        assert_eq!(
            ExtractedOrder::from_value(value).unwrap_err().field(),
            "patient.sex"
        );
    }

    #[test]
    fn type_errors_are_reported_before_missing_fields() {
        let mut value = sample_value();
        value["patient"]["id"] = json!("");
        value["order"]["institutionName"] = json!(["HOSPITAL"]);
        assert!(matches!(
            ExtractedOrder::from_value(value).unwrap_err(),
            ValidationError::WrongType { ref field, .. } if field == "order.institutionName"
        ));
    }

    #[test]
    fn later_study_entries_are_indexed() {
        let mut value = sample_value();
        value["studies"] = json!([
            { "cups": "871121", "nombre": "RX DE TORAX" },
            { "cups": "883101" }
        ]);
        assert_eq!(
            ExtractedOrder::from_value(value).unwrap_err(),
            ValidationError::MissingField {
                field: "studies[1].nombre".into()
            }
        );
    }
}
