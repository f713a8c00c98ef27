//! The field table of an imaging order.
//!
//! One entry per leaf field, in the order the extraction instruction enumerates them. The
//! extraction client renders both its natural-language prompt and the response schema from
//! this table, so the two can never disagree about which fields exist.

/// Top-level section of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Patient,
    /// The only repeated section: an array of requested studies.
    Studies,
    Diagnosis,
    Physician,
    Order,
}

impl Section {
    /// All sections in document order.
    pub const ALL: [Section; 5] = [
        Section::Patient,
        Section::Studies,
        Section::Diagnosis,
        Section::Physician,
        Section::Order,
    ];

    /// JSON key of the section.
    pub fn key(self) -> &'static str {
        match self {
            Section::Patient => "patient",
            Section::Studies => "studies",
            Section::Diagnosis => "diagnosis",
            Section::Physician => "physician",
            Section::Order => "order",
        }
    }

    /// Whether the section is an array of objects rather than a single object.
    pub fn is_repeated(self) -> bool {
        matches!(self, Section::Studies)
    }
}

/// Value shape of a leaf field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// `YYYY-MM-DD`
    Date,
}

/// One leaf field of the order schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderField {
    pub section: Section,
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

impl OrderField {
    /// Dotted path, e.g. `patient.fullName` or `studies.cups`.
    pub fn path(&self) -> String {
        format!("{}.{}", self.section.key(), self.name)
    }
}

/// Description of the `studies` array itself.
pub const STUDIES_DESCRIPTION: &str = "Un array de estudios solicitados en la orden.";

const fn text(
    section: Section,
    name: &'static str,
    required: bool,
    description: &'static str,
) -> OrderField {
    OrderField {
        section,
        name,
        kind: FieldKind::Text,
        required,
        description,
    }
}

const fn date(section: Section, name: &'static str, description: &'static str) -> OrderField {
    OrderField {
        section,
        name,
        kind: FieldKind::Date,
        required: true,
        description,
    }
}

/// Every leaf field, in prompt order.
pub const ORDER_FIELDS: &[OrderField] = &[
    text(Section::Patient, "id", true, "Número de documento del paciente."),
    text(
        Section::Patient,
        "fullName",
        true,
        "Nombres y apellidos completos del paciente.",
    ),
    date(
        Section::Patient,
        "birthDate",
        "Fecha de nacimiento del paciente en formato AAAA-MM-DD.",
    ),
    text(Section::Patient, "sex", true, "Sexo del paciente."),
    text(
        Section::Patient,
        "entidad",
        true,
        "Nombre de la administradora o aseguradora.",
    ),
    text(
        Section::Studies,
        "cups",
        true,
        "El código del estudio solicitado (CUPS).",
    ),
    text(
        Section::Studies,
        "nombre",
        true,
        "El nombre del estudio solicitado.",
    ),
    text(
        Section::Studies,
        "details",
        false,
        "Información adicional como si es simple, contrastado, etc.",
    ),
    text(
        Section::Diagnosis,
        "code",
        true,
        "El código CIE-10 del diagnóstico (ej. R51X).",
    ),
    text(
        Section::Diagnosis,
        "description",
        true,
        "La descripción del diagnóstico (ej. CEFALEA).",
    ),
    text(
        Section::Physician,
        "fullName",
        true,
        "Nombre del profesional que ordena el estudio.",
    ),
    text(
        Section::Physician,
        "registryNumber",
        true,
        "Número de registro médico del profesional.",
    ),
    text(
        Section::Physician,
        "specialty",
        true,
        "Especialidad del profesional.",
    ),
    date(
        Section::Order,
        "date",
        "Fecha de la orden en formato AAAA-MM-DD.",
    ),
    text(
        Section::Order,
        "institutionName",
        true,
        "Nombre de la institución que emite la orden.",
    ),
    text(
        Section::Order,
        "admissionNumber",
        false,
        "El número de admisión o referencia, si está disponible.",
    ),
];

/// Fields of one section, in table order.
pub fn fields_of(section: Section) -> impl Iterator<Item = &'static OrderField> {
    ORDER_FIELDS.iter().filter(move |f| f.section == section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_details_and_admission_number_are_optional() {
        let optional: Vec<String> = ORDER_FIELDS
            .iter()
            .filter(|f| !f.required)
            .map(OrderField::path)
            .collect();
        assert_eq!(optional, vec!["studies.details", "order.admissionNumber"]);
    }

    #[test]
    fn dates_are_birth_date_and_order_date() {
        let dates: Vec<String> = ORDER_FIELDS
            .iter()
            .filter(|f| f.kind == FieldKind::Date)
            .map(OrderField::path)
            .collect();
        assert_eq!(dates, vec!["patient.birthDate", "order.date"]);
    }

    #[test]
    fn every_section_has_fields() {
        for section in Section::ALL {
            assert!(fields_of(section).count() > 0, "{:?} has no fields", section);
        }
    }
}
