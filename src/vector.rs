//! Vector backends: SVG and PostScript/EPS pages.
//!
//! Output carries no timestamps, so the same plot always produces the same bytes.

use crate::plot::{Canvas, Color, HAlign, Stroke, TextStyle, VAlign};

const FONT_FAMILY: &str = "Helvetica, Arial, sans-serif";

/// Escape special XML characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub struct SvgCanvas {
    svg: String,
}

impl SvgCanvas {
    pub fn new(size: f64) -> Self {
        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{size}pt" height="{size}pt" viewBox="0 0 {size} {size}">
<rect width="100%" height="100%" fill="white"/>
"#
        ));
        SvgCanvas { svg }
    }

    pub fn finish(mut self) -> String {
        self.svg.push_str("</svg>\n");
        self.svg
    }
}

fn svg_rgb(c: Color) -> String {
    format!("rgb({},{},{})", c.r, c.g, c.b)
}

impl Canvas for SvgCanvas {
    fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: Stroke) {
        self.svg.push_str(&format!(
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-opacity="{}" stroke-width="{}"/>"#,
            from.0,
            from.1,
            to.0,
            to.1,
            svg_rgb(stroke.color),
            stroke.color.alpha,
            stroke.width
        ));
        self.svg.push('\n');
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, stroke: Stroke) {
        self.svg.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="{}" stroke-opacity="{}" stroke-width="{}"/>"#,
            x,
            y,
            width,
            height,
            svg_rgb(stroke.color),
            stroke.color.alpha,
            stroke.width
        ));
        self.svg.push('\n');
    }

    fn dot(&mut self, center: (f64, f64), radius: f64, color: Color) {
        self.svg.push_str(&format!(
            r#"<circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}" fill-opacity="{}"/>"#,
            center.0,
            center.1,
            radius,
            svg_rgb(color),
            color.alpha
        ));
        self.svg.push('\n');
    }

    fn text(&mut self, at: (f64, f64), text: &str, style: &TextStyle) {
        let anchor = match style.h_align {
            HAlign::Left => "start",
            HAlign::Center => "middle",
            HAlign::Right => "end",
        };
        let baseline = match style.v_align {
            VAlign::Baseline => "auto",
            VAlign::Center => "central",
            VAlign::Top => "hanging",
        };
        let transform = if style.rotation != 0.0 {
            format!(r#" transform="rotate({} {:.2} {:.2})""#, -style.rotation, at.0, at.1)
        } else {
            String::new()
        };
        self.svg.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{}" fill="{}" fill-opacity="{}" text-anchor="{}" dominant-baseline="{}"{}>{}</text>"#,
            at.0,
            at.1,
            FONT_FAMILY,
            style.size,
            svg_rgb(style.color),
            style.color.alpha,
            anchor,
            baseline,
            transform,
            escape_xml(text)
        ));
        self.svg.push('\n');
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDialect {
    Ps,
    Eps,
}

/// PostScript page. Coordinates are flipped to a bottom-left origin and
/// translucent colors are flattened against the white page.
pub struct PageCanvas {
    dialect: PageDialect,
    size: f64,
    ops: String,
}

/// Horizontal offset as a fraction of text width, vertical offset as a fraction of size.
pub fn text_offsets(style: &TextStyle) -> (f64, f64) {
    let k = match style.h_align {
        HAlign::Left => 0.0,
        HAlign::Center => -0.5,
        HAlign::Right => -1.0,
    };
    let dy = match style.v_align {
        VAlign::Baseline => 0.0,
        VAlign::Center => -0.35,
        VAlign::Top => -0.75,
    };
    (k, dy)
}

/// Escape a string for a `( ... )` literal; non-ASCII becomes `?`.
fn escape_ps(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn unit_rgb(c: Color) -> (f64, f64, f64) {
    let (r, g, b) = c.over_white();
    (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
}

impl PageCanvas {
    pub fn new(dialect: PageDialect, size: f64) -> Self {
        PageCanvas { dialect, size, ops: String::new() }
    }

    fn flip(&self, p: (f64, f64)) -> (f64, f64) {
        (p.0, self.size - p.1)
    }

    fn set_stroke(&mut self, stroke: Stroke) {
        let (r, g, b) = unit_rgb(stroke.color);
        self.ops.push_str(&format!(
            "{:.3} {:.3} {:.3} setrgbcolor {:.2} setlinewidth\n",
            r, g, b, stroke.width
        ));
    }

    fn set_fill(&mut self, color: Color) {
        let (r, g, b) = unit_rgb(color);
        self.ops.push_str(&format!("{:.3} {:.3} {:.3} setrgbcolor\n", r, g, b));
    }

    pub fn finish(self) -> Vec<u8> {
        let size = self.size;
        let mut doc = String::new();
        match self.dialect {
            PageDialect::Eps => doc.push_str("%!PS-Adobe-3.0 EPSF-3.0\n"),
            PageDialect::Ps => doc.push_str("%!PS-Adobe-3.0\n"),
        }
        doc.push_str("%%Creator: qadot\n");
        doc.push_str(&format!("%%BoundingBox: 0 0 {} {}\n", size.ceil(), size.ceil()));
        match self.dialect {
            PageDialect::Ps => doc.push_str("%%Pages: 1\n%%EndComments\n%%Page: 1 1\n"),
            PageDialect::Eps => doc.push_str("%%EndComments\n"),
        }
        doc.push_str(&format!("1 1 1 setrgbcolor 0 0 {:.2} {:.2} rectfill\n", size, size));
        doc.push_str(&self.ops);
        doc.push_str("showpage\n%%EOF\n");
        doc.into_bytes()
    }
}

impl Canvas for PageCanvas {
    fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: Stroke) {
        self.set_stroke(stroke);
        let (a, b) = (self.flip(from), self.flip(to));
        self.ops.push_str(&format!(
            "newpath {:.2} {:.2} moveto {:.2} {:.2} lineto stroke\n",
            a.0, a.1, b.0, b.1
        ));
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, stroke: Stroke) {
        self.set_stroke(stroke);
        let (x, bottom) = self.flip((x, y + height));
        self.ops.push_str(&format!("{:.2} {:.2} {:.2} {:.2} rectstroke\n", x, bottom, width, height));
    }

    fn dot(&mut self, center: (f64, f64), radius: f64, color: Color) {
        self.set_fill(color);
        let (x, y) = self.flip(center);
        self.ops.push_str(&format!("newpath {:.3} {:.3} {:.3} 0 360 arc fill\n", x, y, radius));
    }

    fn text(&mut self, at: (f64, f64), text: &str, style: &TextStyle) {
        self.set_fill(style.color);
        let (x, y) = self.flip(at);
        let (k, dy) = text_offsets(style);
        self.ops.push_str(&format!(
            "gsave {:.2} {:.2} translate {} rotate /Helvetica findfont {} scalefont setfont 0 0 moveto \
             ({}) dup stringwidth pop {} mul {:.2} rmoveto show grestore\n",
            x,
            y,
            style.rotation,
            style.size,
            escape_ps(text),
            k,
            dy * style.size
        ));
    }
}
