use crate::layout::{layout, DrawOp, FontStyle, MARGIN, PAGE_HEIGHT, PAGE_WIDTH};
use crate::{DocumentError, DocumentOptions, DocumentResult};
use orders::ExtractedOrder;
use printpdf::{
    BuiltinFont, Color, CustomPdfConformance, Line, Mm, PdfConformance, PdfDocument,
    PdfLayerReference, Point, Rgb,
};
use sha2::{Digest, Sha256};
use std::io::BufWriter;

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn to_offset(options: &DocumentOptions) -> DocumentResult<time::OffsetDateTime> {
    let secs = options.generated_at.map(|t| t.timestamp()).unwrap_or(0);
    time::OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| DocumentError::Timestamp(e.to_string()))
}

/// Hex SHA-256 over the order, the kind and the generation time.
fn fingerprint(
    order: &ExtractedOrder,
    options: &DocumentOptions,
    generated: i64,
) -> DocumentResult<String> {
    let json = serde_json::to_vec(order).map_err(|e| DocumentError::Save(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    hasher.update(options.kind.title().as_bytes());
    hasher.update(generated.to_be_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Overwrites the two trailer `/ID` strings in place with `ids`, cycled to each string's length.
///
/// printpdf fills the second one with random characters on every save.
fn pin_trailer_ids(bytes: &mut [u8], ids: [&[u8]; 2]) {
    let Some(start) = (0..bytes.len().saturating_sub(3)).rev().find(|&i| {
        &bytes[i..i + 3] == b"/ID" && matches!(bytes[i + 3], b'[' | b' ' | b'\r' | b'\n')
    }) else {
        return;
    };

    let mut i = start + 3;
    let mut replaced = 0;
    while i < bytes.len() && replaced < ids.len() {
        let close = match bytes[i] {
            b'(' => b')',
            b'<' => b'>',
            b']' => break,
            _ => {
                i += 1;
                continue;
            }
        };
        let open = i + 1;
        let Some(len) = bytes[open..].iter().position(|b| *b == close) else {
            break;
        };
        let id = ids[replaced];
        for (k, b) in bytes[open..open + len].iter_mut().enumerate() {
            *b = id[k % id.len()];
        }
        i = open + len + 1;
        replaced += 1;
    }
}

fn draw_rule(layer: &PdfLayerReference, y: f32) {
    layer.set_outline_color(Color::Rgb(Rgb::new(0.8, 0.8, 0.8, None)));
    layer.set_outline_thickness(0.5);
    layer.add_line(Line {
        points: vec![
            (Point::new(mm(MARGIN), mm(y)), false),
            (Point::new(mm(PAGE_WIDTH - MARGIN), mm(y)), false),
        ],
        is_closed: false,
    });
}

/// Renders an order to PDF bytes.
///
/// The output is a pure function of the order and `options`: document ids are derived from a
/// hash of both, and the only embedded dates are [`DocumentOptions::generated_at`].
///
/// # Errors
///
/// Returns [`DocumentError`] if the built-in fonts cannot be registered or the document
/// cannot be serialised.
pub fn render(order: &ExtractedOrder, options: &DocumentOptions) -> DocumentResult<Vec<u8>> {
    let pages = layout(order, options.kind);
    let generated = to_offset(options)?;
    let title = options.kind.file_name(order.patient.id.as_str());
    let fingerprint = fingerprint(order, options, generated.unix_timestamp())?;
    let (document_id, instance_id) = fingerprint.split_at(fingerprint.len() / 2);

    let (doc, first_page, first_layer) = PdfDocument::new(
        &title,
        mm(PAGE_WIDTH),
        mm(PAGE_HEIGHT),
        "Layer 1",
    );
    // no XMP packet: it would carry a random instance id and the wall-clock metadata date
    let doc = doc
        .with_conformance(PdfConformance::Custom(CustomPdfConformance {
            requires_xmp_metadata: false,
            requires_icc_profile: false,
            allows_default_fonts: true,
            ..CustomPdfConformance::default()
        }))
        .with_document_id(document_id.to_string())
        .with_creation_date(generated)
        .with_mod_date(generated);

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| DocumentError::Font(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| DocumentError::Font(e.to_string()))?;

    for (index, page) in pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_ref, layer_ref) = doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page_ref).get_layer(layer_ref)
        };

        for op in &page.ops {
            match op {
                DrawOp::Text {
                    text,
                    x,
                    y,
                    size,
                    style,
                } => {
                    let font = match style {
                        FontStyle::Regular => &regular,
                        FontStyle::Bold => &bold,
                    };
                    layer.use_text(text.as_str(), *size, mm(*x), mm(*y), font);
                }
                DrawOp::Rule { y } => draw_rule(&layer, *y),
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| DocumentError::Save(e.to_string()))?;
    let mut bytes = buf
        .into_inner()
        .map_err(|e| DocumentError::Save(e.to_string()))?;
    pin_trailer_ids(&mut bytes, [document_id.as_bytes(), instance_id.as_bytes()]);

    tracing::info!(
        patient_id = %order.patient.id,
        pages = pages.len(),
        bytes = bytes.len(),
        "rendered authorization"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentKind;
    use chrono::TimeZone;
    use serde_json::json;

    fn order(studies: usize) -> ExtractedOrder {
        let studies: Vec<_> = (0..studies)
            .map(|i| json!({ "cups": format!("87{i:04}"), "nombre": "RX DE TORAX" }))
            .collect();
        ExtractedOrder::from_value(json!({
            "patient": {
                "id": "123",
                "fullName": "JUAN PEREZ",
                "birthDate": "1980-06-15",
                "sex": "M",
                "entidad": "NUEVA EPS"
            },
            "studies": studies,
            "diagnosis": { "code": "R05X", "description": "TOS" },
            "physician": {
                "fullName": "ANA GOMEZ",
                "registryNumber": "RM-5521",
                "specialty": "MEDICINA GENERAL"
            },
            "order": { "date": "2024-05-02", "institutionName": "HOSPITAL SAN JOSE" }
        }))
        .unwrap()
    }

    #[test]
    fn renders_pdf_bytes() {
        let options = DocumentOptions {
            kind: DocumentKind::Standard,
            generated_at: Some(chrono::Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap()),
        };
        let bytes = render(&order(1), &options).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn same_input_renders_same_bytes() {
        let at = |h| DocumentOptions {
            kind: DocumentKind::Own,
            generated_at: Some(chrono::Utc.with_ymd_and_hms(2024, 5, 2, h, 30, 0).unwrap()),
        };
        let a = render(&order(3), &at(8)).unwrap();
        let b = render(&order(3), &at(8)).unwrap();
        assert_eq!(a, b);

        let later = render(&order(3), &at(9)).unwrap();
        assert_ne!(a, later);
    }

    #[test]
    fn trailer_ids_are_overwritten_in_place() {
        let mut bytes = b"trailer\n<</Size 9/ID[(ABCDEF)(xyz123)]>>\nstartxref\n42\n%%EOF".to_vec();
        let len = bytes.len();
        pin_trailer_ids(&mut bytes, [b"0123", b"ab"]);
        assert_eq!(bytes.len(), len);
        assert_eq!(
            bytes,
            b"trailer\n<</Size 9/ID[(012301)(ababab)]>>\nstartxref\n42\n%%EOF".to_vec()
        );

        let mut hex = b"/ID [<9F3A> <77AB>]".to_vec();
        pin_trailer_ids(&mut hex, [b"00", b"11"]);
        assert_eq!(hex, b"/ID [<0000> <1111>]".to_vec());
    }

    #[test]
    fn renders_multi_page_documents() {
        let one = render(&order(1), &DocumentOptions::default()).unwrap();
        let many = render(&order(60), &DocumentOptions::default()).unwrap();
        assert!(many.len() > one.len());
    }
}
