//! Extraction instruction and response schema.
//!
//! Both are rendered from [`orders::ORDER_FIELDS`], so the fields named in the instruction
//! are exactly the fields of the schema the model's output is constrained to.

use orders::{fields_of, Section, STUDIES_DESCRIPTION};
use serde_json::{json, Map, Value};

const PREAMBLE: &str = "Eres un asistente de inteligencia artificial especializado en procesar \
órdenes médicas de imágenes diagnósticas en Colombia. Tu tarea es extraer la información clave \
de la siguiente orden y estructurarla en un formato JSON.

Analiza la orden que te proporcionaré y extrae los siguientes campos. Asegúrate de devolver las \
fechas en formato AAAA-MM-DD.";

const CLOSING: &str = "Aquí está la orden médica:";

/// The natural-language instruction sent alongside every order file.
pub fn instruction() -> String {
    let mut out = String::from(PREAMBLE);
    out.push('\n');

    for section in Section::ALL {
        out.push('\n');
        if section.is_repeated() {
            out.push_str(&format!(
                "- **{}**: {} Para cada estudio, extrae:\n",
                section.key(),
                STUDIES_DESCRIPTION
            ));
            for field in fields_of(section) {
                out.push_str(&format!("  - **{}**: {}\n", field.path(), field.description));
            }
        } else {
            for field in fields_of(section) {
                out.push_str(&format!("- **{}**: {}\n", field.path(), field.description));
            }
        }
    }

    out.push('\n');
    out.push_str(CLOSING);
    out
}

/// JSON schema (OpenAPI subset, as accepted by Gemini's `responseSchema`) of an order.
///
/// Strings carry no `format`: Gemini only accepts `enum` and `date-time` there. Date fields
/// state `AAAA-MM-DD` in their description instead.
pub fn response_schema() -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for section in Section::ALL {
        let object = section_schema(section);
        let schema = if section.is_repeated() {
            json!({
                "type": "ARRAY",
                "description": STUDIES_DESCRIPTION,
                "items": object,
            })
        } else {
            object
        };
        properties.insert(section.key().to_string(), schema);
        required.push(Value::from(section.key()));
    }

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

fn section_schema(section: Section) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in fields_of(section) {
        let schema = json!({
            "type": "STRING",
            "description": field.description,
        });
        properties.insert(field.name.to_string(), schema);
        if field.required {
            required.push(Value::from(field.name));
        }
    }

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orders::{FieldKind, ORDER_FIELDS};

    fn string_formats(schema: &Value, path: &str, found: &mut Vec<(String, String)>) {
        match schema {
            Value::Object(map) => {
                if map.get("type") == Some(&json!("STRING")) {
                    if let Some(format) = map.get("format").and_then(Value::as_str) {
                        found.push((path.to_string(), format.to_string()));
                    }
                }
                for (key, child) in map {
                    string_formats(child, &format!("{path}/{key}"), found);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    string_formats(child, &format!("{path}/{i}"), found);
                }
            }
            _ => {}
        }
    }

    #[test]
    fn instruction_names_every_field_once() {
        let text = instruction();
        for field in ORDER_FIELDS {
            let marker = format!("**{}**:", field.path());
            assert_eq!(text.matches(&marker).count(), 1, "{marker}");
            assert!(text.contains(field.description));
        }
        assert!(text.contains("AAAA-MM-DD"));
        assert!(text.ends_with(CLOSING));
    }

    #[test]
    fn schema_marks_optional_fields() {
        let schema = response_schema();
        let studies_required = &schema["properties"]["studies"]["items"]["required"];
        assert_eq!(studies_required, &json!(["cups", "nombre"]));

        let order_required = &schema["properties"]["order"]["required"];
        assert_eq!(order_required, &json!(["date", "institutionName"]));

        assert_eq!(
            schema["required"],
            json!(["patient", "studies", "diagnosis", "physician", "order"])
        );
    }

    #[test]
    fn schema_uses_only_string_formats_gemini_accepts() {
        let mut found = Vec::new();
        string_formats(&response_schema(), "", &mut found);
        for (path, format) in &found {
            assert!(
                format == "enum" || format == "date-time",
                "{path} has unsupported format {format:?}"
            );
        }
    }

    #[test]
    fn date_fields_describe_their_format() {
        let schema = response_schema();
        let birth_date = &schema["properties"]["patient"]["properties"]["birthDate"];
        assert!(birth_date.get("format").is_none());

        for field in ORDER_FIELDS.iter().filter(|f| f.kind == FieldKind::Date) {
            assert!(field.description.contains("AAAA-MM-DD"), "{}", field.path());
        }
    }
}
