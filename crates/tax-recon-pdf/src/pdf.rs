//! Writing a laid out [`Document`] as PDF with the built-in Helvetica fonts.

use crate::layout::{Color, Document, Element, Font, PAGE_HEIGHT, PAGE_WIDTH};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Point, Polygon};
use std::path::{Path, PathBuf};

const LAYER: &str = "Layer 1";

/// `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.pdf`
pub fn output_path(dir: &Path, prefix: &str, now: NaiveDateTime) -> PathBuf {
    dir.join(format!("{prefix}_{}.pdf", now.format("%Y%m%d_%H%M%S")))
}

pub fn render(document: &Document) -> Result<Vec<u8>> {
    let (pdf, first_page, first_layer) = PdfDocument::new(
        document.title.clone(),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        LAYER,
    );
    let regular = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|err| anyhow!("failed to load Helvetica: {err:?}"))?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|err| anyhow!("failed to load Helvetica-Bold: {err:?}"))?;

    for (index, page) in document.pages.iter().enumerate() {
        let layer = if index == 0 {
            pdf.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
            pdf.get_page(page).get_layer(layer)
        };
        for element in &page.elements {
            draw(&layer, element, &regular, &bold);
        }
    }

    pdf.save_to_bytes()
        .map_err(|err| anyhow!("failed to encode PDF: {err:?}"))
}

/// Render `document` into `dir`, creating it if needed, and return the file's path.
pub fn write(document: &Document, dir: &Path, prefix: &str, now: NaiveDateTime) -> Result<PathBuf> {
    let bytes = render(document)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let path = output_path(dir, prefix, now);
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write PDF: {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        pages = document.pages.len(),
        "wrote PDF report"
    );
    Ok(path)
}

fn draw(
    layer: &PdfLayerReference,
    element: &Element,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    match element {
        Element::Text {
            x,
            y,
            size,
            font,
            color,
            text,
        } => {
            let font = match font {
                Font::Regular => regular,
                Font::Bold => bold,
            };
            layer.set_fill_color(pdf_color(*color));
            layer.use_text(text.as_str(), *size, Mm(*x), Mm(PAGE_HEIGHT - y), font);
        }
        Element::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        } => {
            let mode = match (fill, stroke) {
                (Some(_), true) => PaintMode::FillStroke,
                (Some(_), false) => PaintMode::Fill,
                (None, _) => PaintMode::Stroke,
            };
            if let Some(fill) = fill {
                layer.set_fill_color(pdf_color(*fill));
            }
            layer.set_outline_color(pdf_color(Color::BLACK));
            layer.set_outline_thickness(0.5);

            let top = PAGE_HEIGHT - y;
            let bottom = top - height;
            let corners = [
                (*x, bottom),
                (x + width, bottom),
                (x + width, top),
                (*x, top),
            ];
            layer.add_polygon(Polygon {
                rings: vec![
                    corners
                        .iter()
                        .map(|&(px, py)| (Point::new(Mm(px), Mm(py)), false))
                        .collect(),
                ],
                mode,
                winding_order: WindingOrder::NonZero,
            });
        }
    }
}

fn pdf_color(Color(r, g, b): Color) -> printpdf::Color {
    printpdf::Color::Rgb(printpdf::Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn output_file_name_carries_the_timestamp() {
        let now = NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        let path = output_path(Path::new("reports"), "Transaction_Tax_Analysis", now);
        assert_eq!(
            path,
            Path::new("reports/Transaction_Tax_Analysis_20250901_140509.pdf")
        );
    }
}
