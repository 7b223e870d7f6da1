use anyhow::{anyhow, Context, Result};
use printpdf::image_crate::DynamicImage;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::calc::Status;
use crate::chart;
use crate::normalize::ScoreRecord;
use crate::rtl::reshape;

const PAGE_W: f64 = 210.0;
const PAGE_H: f64 = 297.0;
const MARGIN: f64 = 18.0;
const ROW_STEP: f64 = 8.0;
/// Fixed padding added to the widest measured cell of each column.
const COLUMN_PADDING: f64 = 6.0;
const TITLE_SIZE: f64 = 18.0;
const HEADER_SIZE: f64 = 12.0;
const BODY_SIZE: f64 = 11.0;
const PT_TO_MM: f64 = 0.352_778;

/// One table row of the rendered report card.
#[derive(Debug, Clone)]
pub struct ReportCardLine {
    pub lesson: String,
    pub average: f64,
    pub class_average: Option<f64>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone)]
pub struct RenderSummary {
    pub path: PathBuf,
    pub lessons: usize,
    pub charts: usize,
}

/// Deterministic artifact name derived from the display name.
pub fn report_file_name(student: &str) -> String {
    let safe: String = student
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            other => other,
        })
        .collect();
    format!("report_card_{}.pdf", safe)
}

enum PageFont {
    /// Embedded TTF plus its parsed glyph table for measurement.
    Embedded(IndirectFontRef, rusttype::Font<'static>),
    /// Builtin Helvetica; widths are estimated, RTL output is best-effort.
    Builtin(IndirectFontRef),
}

impl PageFont {
    fn pdf_font(&self) -> &IndirectFontRef {
        match self {
            PageFont::Embedded(f, _) => f,
            PageFont::Builtin(f) => f,
        }
    }

    fn text_width_mm(&self, text: &str, size: f64) -> f64 {
        match self {
            PageFont::Embedded(_, metrics) => {
                let scale = rusttype::Scale::uniform(size as f32);
                let width_pt: f32 = text
                    .chars()
                    .map(|c| metrics.glyph(c).scaled(scale).h_metrics().advance_width)
                    .sum();
                f64::from(width_pt) * PT_TO_MM
            }
            PageFont::Builtin(_) => text.chars().count() as f64 * size * 0.5 * PT_TO_MM,
        }
    }
}

/// Lexicographically first TTF under `<workspace>/fonts`, if any.
fn find_report_font(workspace: &Path) -> Option<PathBuf> {
    let dir = workspace.join("fonts");
    let mut best: Option<PathBuf> = None;
    for ent in std::fs::read_dir(dir).ok()?.flatten() {
        let p = ent.path();
        if !p.is_file() {
            continue;
        }
        let is_ttf = p
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("ttf"))
            .unwrap_or(false);
        if is_ttf && best.as_ref().map(|b| p < *b).unwrap_or(true) {
            best = Some(p);
        }
    }
    best
}

fn load_font(doc: &printpdf::PdfDocumentReference, workspace: &Path) -> Result<PageFont> {
    if let Some(path) = find_report_font(workspace) {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read font {}", path.to_string_lossy()))?;
        let pdf_font = doc
            .add_external_font(bytes.as_slice())
            .map_err(|e| anyhow!("{:?}", e))?;
        if let Some(metrics) = rusttype::Font::try_from_vec(bytes) {
            return Ok(PageFont::Embedded(pdf_font, metrics));
        }
        tracing::warn!(font = %path.to_string_lossy(), "font not parseable for metrics, using builtin");
    }
    let builtin = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("{:?}", e))?;
    Ok(PageFont::Builtin(builtin))
}

fn fmt_avg(v: f64) -> String {
    format!("{:.2}", v)
}

fn status_text(status: Option<Status>) -> &'static str {
    match status {
        Some(s) => s.label(),
        None => "unknown",
    }
}

struct Page<'a> {
    doc: &'a printpdf::PdfDocumentReference,
    layer: PdfLayerReference,
    y: f64,
}

impl<'a> Page<'a> {
    /// Start a fresh page when fewer than `needed` millimeters remain.
    fn ensure_room(&mut self, needed: f64) {
        if self.y - needed < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_W as f32), Mm(PAGE_H as f32), "content");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_H - MARGIN;
        }
    }

    fn text(&self, font: &PageFont, text: &str, size: f64, x: f64) {
        self.layer
            .use_text(reshape(text), size as f32, Mm(x as f32), Mm(self.y as f32), font.pdf_font());
    }
}

/// Render one student's report card into `<workspace>/reports/`.
///
/// The table column widths follow the widest rendered cell per column plus
/// fixed padding; every drawn string is reshaped for RTL presentation just
/// before drawing. An empty card still produces a document with the title and
/// signature. Inputs are borrowed immutably and never altered.
pub fn render_report_card(
    workspace: &Path,
    student: &str,
    lines: &[ReportCardLine],
    student_records: &[ScoreRecord],
) -> Result<RenderSummary> {
    let reports_dir = workspace.join("reports");
    std::fs::create_dir_all(&reports_dir).with_context(|| {
        format!(
            "failed to create reports directory {}",
            reports_dir.to_string_lossy()
        )
    })?;
    let out_path = reports_dir.join(report_file_name(student));

    let title = format!("Student Report Card - {}", student);
    let (doc, page_idx, layer_idx) =
        PdfDocument::new(title.as_str(), Mm(PAGE_W as f32), Mm(PAGE_H as f32), "content");
    let font = load_font(&doc, workspace)?;

    let mut page = Page {
        doc: &doc,
        layer: doc.get_page(page_idx).get_layer(layer_idx),
        y: PAGE_H - MARGIN - 10.0,
    };

    let title_w = font.text_width_mm(&title, TITLE_SIZE);
    page.text(&font, &title, TITLE_SIZE, (PAGE_W - title_w).max(0.0) / 2.0);
    page.y -= 16.0;

    let mut charts = 0usize;
    if !lines.is_empty() {
        draw_table(&mut page, &font, lines);

        match chart::line_trend(student_records, "Weekly score trend", 600, 300) {
            Ok(img) => {
                embed_chart(&mut page, img);
                charts += 1;
            }
            Err(e) => tracing::warn!(error = %e, "trend chart skipped"),
        }

        let card_rows: Vec<crate::calc::ReportRow> = lines
            .iter()
            .map(|l| crate::calc::ReportRow {
                lesson: l.lesson.clone(),
                average: l.average,
                status: l.status,
            })
            .collect();
        match chart::status_distribution(&card_rows, "Status by lesson", 420, 280) {
            Ok(img) => {
                embed_chart(&mut page, img);
                charts += 1;
            }
            Err(e) => tracing::warn!(error = %e, "distribution chart skipped"),
        }
    }

    // Signature footer pinned to the bottom of the last page.
    let signature = "Prepared with care by the homeroom teacher";
    let sig_w = font.text_width_mm(signature, BODY_SIZE);
    page.y = 15.0;
    page.text(&font, signature, BODY_SIZE, (PAGE_W - sig_w).max(0.0) / 2.0);

    let file = File::create(&out_path)
        .with_context(|| format!("failed to create {}", out_path.to_string_lossy()))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| anyhow!("{:?}", e))?;

    Ok(RenderSummary {
        path: out_path,
        lessons: lines.len(),
        charts,
    })
}

fn draw_table(page: &mut Page<'_>, font: &PageFont, lines: &[ReportCardLine]) {
    let has_class_avg = lines.iter().any(|l| l.class_average.is_some());

    let mut headers = vec!["Lesson", "Average"];
    if has_class_avg {
        headers.push("Class Average");
    }
    headers.push("Status");

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(lines.len());
    for l in lines {
        let mut row = vec![l.lesson.clone(), fmt_avg(l.average)];
        if has_class_avg {
            row.push(l.class_average.map(fmt_avg).unwrap_or_default());
        }
        row.push(status_text(l.status).to_string());
        cells.push(row);
    }

    // Column width = widest rendered cell (header or data) + fixed padding.
    let mut widths: Vec<f64> = headers
        .iter()
        .map(|h| font.text_width_mm(h, HEADER_SIZE))
        .collect();
    for row in &cells {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(font.text_width_mm(cell, BODY_SIZE));
        }
    }
    for w in &mut widths {
        *w += COLUMN_PADDING;
    }

    let mut x_offsets = Vec::with_capacity(widths.len());
    let mut x = MARGIN;
    for w in &widths {
        x_offsets.push(x);
        x += w;
    }

    page.ensure_room(ROW_STEP * 2.0);
    for (col, header) in headers.iter().enumerate() {
        page.text(font, header, HEADER_SIZE, x_offsets[col]);
    }
    page.y -= ROW_STEP;

    for row in &cells {
        page.ensure_room(ROW_STEP);
        for (col, cell) in row.iter().enumerate() {
            page.text(font, cell, BODY_SIZE, x_offsets[col]);
        }
        page.y -= ROW_STEP;
    }
    page.y -= 6.0;
}

fn embed_chart(page: &mut Page<'_>, img: printpdf::image_crate::RgbImage) {
    // 110 dpi: a 600 px chart comes out a little under the printable width.
    let dpi = 110.0;
    let h_mm = f64::from(img.height()) / dpi * 25.4;
    page.ensure_room(h_mm + 6.0);
    page.y -= h_mm;

    let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(img));
    image.add_to_layer(
        page.layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(MARGIN as f32)),
            translate_y: Some(Mm(page.y as f32)),
            dpi: Some(dpi as f32),
            ..Default::default()
        },
    );
    page.y -= 8.0;
}
