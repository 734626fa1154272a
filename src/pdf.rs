//! PDF backend drawn through `printpdf`, one page with the built-in Helvetica.

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    calculate_points_for_circle, BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Polygon, Pt, Rgb, TextMatrix,
};

use crate::error::{DotplotError, Result};
use crate::plot::{Canvas, Color, Stroke, TextStyle};
use crate::vector::text_offsets;

/// Helvetica advance widths in 1/1000 em for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Width of `text` set in Helvetica at `size` points.
fn helvetica_width(text: &str, size: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            32..=126 => HELVETICA_WIDTHS[(c as u32 - 32) as usize] as u32,
            _ => 556,
        })
        .sum();
    units as f64 / 1000.0 * size
}

/// Baseline origin of a label after alignment, in bottom-left page space.
fn text_origin(at: (f64, f64), text: &str, style: &TextStyle) -> (f64, f64) {
    let (k, dy) = text_offsets(style);
    let (ox, oy) = (k * helvetica_width(text, style.size), dy * style.size);
    let (sin, cos) = style.rotation.to_radians().sin_cos();
    (at.0 + ox * cos - oy * sin, at.1 + ox * sin + oy * cos)
}

fn pdf_color(c: Color) -> printpdf::Color {
    let (r, g, b) = c.over_white();
    printpdf::Color::Rgb(Rgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, None))
}

fn pdf_error(e: printpdf::Error) -> DotplotError {
    DotplotError::Pdf(e.to_string())
}

/// Translucent colors are flattened against the white page.
pub struct PdfCanvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    size: f64,
}

impl PdfCanvas {
    pub fn new(size: f64) -> Result<Self> {
        let side = Mm::from(Pt(size as f32));
        let (doc, page, layer) = PdfDocument::new("qadot", side, side, "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(PdfCanvas { doc, layer, font, size })
    }

    /// Figure points (top-left origin) to a page point.
    fn point(&self, p: (f64, f64)) -> Point {
        Point::new(Mm::from(Pt(p.0 as f32)), Mm::from(Pt((self.size - p.1) as f32)))
    }

    fn set_stroke(&self, stroke: Stroke) {
        self.layer.set_outline_color(pdf_color(stroke.color));
        self.layer.set_outline_thickness(stroke.width as f32);
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}

impl Canvas for PdfCanvas {
    fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: Stroke) {
        self.set_stroke(stroke);
        self.layer.add_line(Line {
            points: vec![(self.point(from), false), (self.point(to), false)],
            is_closed: false,
        });
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, stroke: Stroke) {
        self.set_stroke(stroke);
        let corners = [(x, y), (x + width, y), (x + width, y + height), (x, y + height)];
        self.layer.add_line(Line {
            points: corners.iter().map(|&c| (self.point(c), false)).collect(),
            is_closed: true,
        });
    }

    fn dot(&mut self, center: (f64, f64), radius: f64, color: Color) {
        self.layer.set_fill_color(pdf_color(color));
        let ring = calculate_points_for_circle(
            Pt(radius as f32),
            Pt(center.0 as f32),
            Pt((self.size - center.1) as f32),
        );
        self.layer.add_polygon(Polygon {
            rings: vec![ring],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }

    fn text(&mut self, at: (f64, f64), text: &str, style: &TextStyle) {
        let (x, y) = text_origin((at.0, self.size - at.1), text, style);
        self.layer.set_fill_color(pdf_color(style.color));
        self.layer.begin_text_section();
        self.layer.set_font(&self.font, style.size as f32);
        self.layer
            .set_text_matrix(TextMatrix::TranslateRotate(Pt(x as f32), Pt(y as f32), style.rotation as f32));
        self.layer.write_text(text, &self.font);
        self.layer.end_text_section();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::{HAlign, VAlign, BLACK, GREEN};

    fn tick(h_align: HAlign) -> TextStyle {
        TextStyle { size: 10.0, color: BLACK, rotation: 0.0, h_align, v_align: VAlign::Baseline }
    }

    #[test]
    fn digits_use_helvetica_advance() {
        assert!((helvetica_width("100", 10.0) - 16.68).abs() < 1e-9);
        assert!((helvetica_width("chr1", 10.0) - (5.0 + 5.56 + 3.33 + 5.56)).abs() < 1e-9);
    }

    #[test]
    fn aligned_text_shifts_by_its_width() {
        let left = text_origin((50.0, 20.0), "100", &tick(HAlign::Left));
        let center = text_origin((50.0, 20.0), "100", &tick(HAlign::Center));
        let right = text_origin((50.0, 20.0), "100", &tick(HAlign::Right));
        assert_eq!(left, (50.0, 20.0));
        assert!((center.0 - (50.0 - 8.34)).abs() < 1e-9);
        assert!((right.0 - (50.0 - 16.68)).abs() < 1e-9);
        assert_eq!(right.1, 20.0);
    }

    #[test]
    fn rotated_text_shifts_along_its_baseline() {
        let style = TextStyle { rotation: 90.0, ..tick(HAlign::Right) };
        let (x, y) = text_origin((30.0, 30.0), "100", &style);
        assert!((x - 30.0).abs() < 1e-9);
        assert!((y - (30.0 - 16.68)).abs() < 1e-9);
    }

    #[test]
    fn writes_a_pdf_document() {
        let mut c = PdfCanvas::new(200.0).unwrap();
        c.line((10.0, 20.0), (10.0, 80.0), Stroke { color: GREEN.with_alpha(0.5), width: 1.0 });
        c.rect(20.0, 20.0, 100.0, 100.0, Stroke { color: BLACK, width: 0.8 });
        c.dot((50.0, 50.0), 1.0, BLACK);
        c.text((20.0, 20.0), "chr(1)", &tick(HAlign::Center));
        let pdf = c.finish().unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert!(pdf.windows(10).any(|w| w == b"/Helvetica"));
    }
}
