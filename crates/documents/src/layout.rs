//! Page layout of an authorization.
//!
//! Coordinates are PDF points with the origin at the bottom-left corner of an A4 page.

use crate::metrics::wrap;
use crate::DocumentKind;
use orders::{ExtractedOrder, RequestedStudy};

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 50.0;

const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 12.0;
const TITLE_SIZE: f32 = 16.0;
const FOOTER_SIZE: f32 = 8.0;
const ROW_STEP: f32 = 15.0;
const FOOTER_STEP: f32 = 10.0;

const FOOTER: &str = "Este documento es una autorización generada automáticamente y no requiere \
firma manual. Válido para los servicios descritos.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
}

/// One positioned drawing operation.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        style: FontStyle,
    },
    /// Horizontal separator from margin to margin.
    Rule { y: f32 },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageLayout {
    pub ops: Vec<DrawOp>,
}

impl PageLayout {
    /// All text on the page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Rule { .. } => None,
        })
    }
}

const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
/// Left column of a pair, leaving a gutter before the page centre.
const LEFT_COLUMN: f32 = PAGE_WIDTH / 2.0 - MARGIN - 10.0;
/// Right column of a pair, from the page centre to the right margin.
const RIGHT_COLUMN: f32 = PAGE_WIDTH / 2.0 - MARGIN;

struct Cursor {
    pages: Vec<PageLayout>,
    y: f32,
    /// Heading repeated at the top of every page opened while set.
    continuation: Option<&'static str>,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            y: PAGE_HEIGHT - MARGIN,
            continuation: None,
        }
    }

    fn page(&mut self) -> &mut PageLayout {
        // the cursor always holds at least one page
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn text(&mut self, text: impl Into<String>, x: f32, size: f32, style: FontStyle) {
        let y = self.y;
        self.page().ops.push(DrawOp::Text {
            text: text.into(),
            x,
            y,
            size,
            style,
        });
    }

    /// Starts a new page unless `height` still fits above the bottom margin.
    fn ensure(&mut self, height: f32) {
        if !self.fits(height) {
            self.new_page();
        }
    }

    /// A separator; dropped when it would be the first thing on a new page.
    fn rule(&mut self) {
        if !self.fits(10.0) {
            self.new_page();
            return;
        }
        let y = self.y;
        self.page().ops.push(DrawOp::Rule { y });
        self.y -= 10.0;
    }

    /// A section heading, kept on the same page as the line that follows it.
    fn heading(&mut self, text: &str) {
        self.ensure(HEADING_SIZE + 9.0 + ROW_STEP);
        self.text(text, MARGIN, HEADING_SIZE, FontStyle::Bold);
        self.y -= HEADING_SIZE + 4.0 + 5.0;
    }

    /// A label/value row, wrapped to the content width and broken across pages by line.
    fn row(&mut self, text: &str) {
        for line in wrap(text, BODY_SIZE, CONTENT_WIDTH) {
            self.ensure(ROW_STEP);
            self.text(line, MARGIN, BODY_SIZE, FontStyle::Regular);
            self.y -= ROW_STEP;
        }
    }

    /// Two values side by side, the second starting at the page centre.
    ///
    /// Each value wraps within its own column.
    fn pair(&mut self, left: &str, right: &str) {
        let left = wrap(left, BODY_SIZE, LEFT_COLUMN);
        let right = wrap(right, BODY_SIZE, RIGHT_COLUMN);
        for i in 0..left.len().max(right.len()) {
            self.ensure(ROW_STEP);
            if let Some(line) = left.get(i) {
                self.text(line.as_str(), MARGIN, BODY_SIZE, FontStyle::Regular);
            }
            if let Some(line) = right.get(i) {
                self.text(line.as_str(), PAGE_WIDTH / 2.0, BODY_SIZE, FontStyle::Regular);
            }
            self.y -= ROW_STEP;
        }
    }

    fn fits(&self, height: f32) -> bool {
        self.y - height >= MARGIN
    }

    fn new_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.y = PAGE_HEIGHT - MARGIN;
        if let Some(heading) = self.continuation {
            self.text(heading, MARGIN, HEADING_SIZE, FontStyle::Bold);
            self.y -= HEADING_SIZE + 4.0 + 5.0;
        }
    }
}

fn study_rows(study: &RequestedStudy) -> Vec<String> {
    let mut rows = vec![
        format!("CUPS: {}", study.cups),
        format!("Nombre: {}", study.nombre),
    ];
    if let Some(details) = &study.details {
        rows.push(format!("Detalles: {details}"));
    }
    rows
}

fn rows_height(rows: &[String]) -> f32 {
    rows.iter()
        .map(|r| wrap(r, BODY_SIZE, CONTENT_WIDTH).len() as f32 * ROW_STEP)
        .sum()
}

/// Lays out an order as one or more pages.
///
/// Every line is checked against the bottom margin before it is placed, so long values in
/// any block flow onto further pages. A study whose rows do not fit on the current page
/// moves whole to a new page headed by a continuation title; only a study taller than a
/// full page is broken between lines. The footer is never split.
pub fn layout(order: &ExtractedOrder, kind: DocumentKind) -> Vec<PageLayout> {
    let mut c = Cursor::new();

    c.text(kind.title(), MARGIN, TITLE_SIZE, FontStyle::Bold);
    c.y -= TITLE_SIZE + 4.0 + 20.0;

    c.pair(
        &format!("Institución: {}", order.order.institution_name),
        &format!("Fecha Orden: {}", order.order.date),
    );
    if let Some(admission) = &order.order.admission_number {
        c.row(&format!("Admisión: {admission}"));
    }
    c.y -= 5.0;
    c.rule();

    c.heading("DATOS DEL PACIENTE");
    c.pair(
        &format!("Nombre: {}", order.patient.full_name),
        &format!("ID: {}", order.patient.id),
    );
    c.pair(
        &format!("Fecha Nacimiento: {}", order.patient.birth_date),
        &format!("Sexo: {}", order.patient.sex),
    );
    c.row(&format!("Aseguradora: {}", order.patient.entidad));
    c.y -= 5.0;
    c.rule();

    c.heading("DIAGNÓSTICO");
    c.row(&format!("CIE-10: {}", order.diagnosis.code));
    c.row(&format!("Descripción: {}", order.diagnosis.description));
    c.y -= 5.0;
    c.rule();

    c.heading("MÉDICO QUE ORDENA");
    c.row(&format!("Nombre: {}", order.physician.full_name));
    c.pair(
        &format!("Registro: {}", order.physician.registry_number),
        &format!("Especialidad: {}", order.physician.specialty),
    );
    c.y -= 5.0;
    c.rule();

    c.heading("ESTUDIOS SOLICITADOS");
    c.continuation = Some("ESTUDIOS SOLICITADOS (continuación)");
    let fresh_page = PAGE_HEIGHT - 2.0 * MARGIN - (HEADING_SIZE + 9.0);
    for study in &order.studies {
        let rows = study_rows(study);
        let height = rows_height(&rows);
        if !c.fits(height) && height <= fresh_page {
            c.new_page();
        }
        for row in &rows {
            c.row(row);
        }
    }
    c.continuation = None;
    c.y -= 10.0;
    c.rule();

    let footer = wrap(FOOTER, FOOTER_SIZE, CONTENT_WIDTH);
    let footer_height = 20.0 + footer.len() as f32 * FOOTER_STEP;
    if !c.fits(footer_height) {
        c.new_page();
    }
    c.y -= 20.0;
    for line in footer {
        c.text(line, MARGIN, FOOTER_SIZE, FontStyle::Regular);
        c.y -= FOOTER_STEP;
    }

    c.pages
}
