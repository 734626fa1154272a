//! Dotplot drawing on top of a small `Canvas` abstraction.
//!
//! All drawing happens in points (1/72 inch) with the origin at the top left
//! of the figure; each backend converts to its own device space.

use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use log::debug;

use crate::error::{DotplotError, Result};
use crate::layout::AxisLayout;
use crate::pdf::PdfCanvas;
use crate::qa::{BoundingBox, PointPair};
use crate::raster::RasterCanvas;
use crate::vector::{PageCanvas, PageDialect, SvgCanvas};

pub const POINTS_PER_INCH: f64 = 72.0;

/// Fraction of the figure left around the plot area on every side.
const MARGIN: f64 = 0.1;
const LABEL_SIZE: f64 = 9.0;
const TICK_SIZE: f64 = 10.0;
const TITLE_SIZE: f64 = 11.0;
const DOT_RADIUS: f64 = 0.16;
const DESIRED_TICKS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Png,
    Pdf,
    Ps,
    Eps,
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Ps => "ps",
            OutputFormat::Eps => "eps",
            OutputFormat::Svg => "svg",
        }
    }
}

/// Genomes whose chromosome breaks and labels are left out of the plot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveSet {
    pub query: bool,
    pub subject: bool,
}

impl FromStr for RemoveSet {
    type Err = DotplotError;

    /// Any combination of `q` and `s`; order and repetition do not matter.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(DotplotError::InvalidRemove(s.to_string()));
        }
        let mut set = RemoveSet::default();
        for c in s.chars() {
            match c.to_ascii_lowercase() {
                'q' => set.query = true,
                's' => set.subject = true,
                _ => return Err(DotplotError::InvalidRemove(s.to_string())),
            }
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f64,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, alpha: 1.0 }
    }

    pub const fn with_alpha(self, alpha: f64) -> Self {
        Color { alpha, ..self }
    }

    /// The opaque color seen when drawn over white.
    pub fn over_white(self) -> (u8, u8, u8) {
        let mix = |c: u8| (c as f64 * self.alpha + 255.0 * (1.0 - self.alpha)).round() as u8;
        (mix(self.r), mix(self.g), mix(self.b))
    }
}

pub const BLACK: Color = Color::rgb(0, 0, 0);
pub const BLUE: Color = Color::rgb(0, 0, 255);
pub const GREEN: Color = Color::rgb(0, 128, 0);
pub const GRAY: Color = Color::rgb(128, 128, 128);

#[derive(Debug, Clone, Copy)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Baseline,
    Center,
    Top,
}

#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub size: f64,
    pub color: Color,
    /// Counter-clockwise, in degrees.
    pub rotation: f64,
    pub h_align: HAlign,
    pub v_align: VAlign,
}

/// Drawing surface in figure points, origin at the top left.
pub trait Canvas {
    fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: Stroke);
    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, stroke: Stroke);
    fn dot(&mut self, center: (f64, f64), radius: f64, color: Color);
    fn text(&mut self, at: (f64, f64), text: &str, style: &TextStyle);
}

#[derive(Debug, Clone, Copy)]
pub struct PlotStyle {
    pub size_inches: f64,
    pub dpi: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        PlotStyle { size_inches: 8.0, dpi: 600 }
    }
}

/// Everything needed to draw one dotplot.
pub struct Dotplot<'a> {
    pub points: &'a [PointPair],
    pub boxes: &'a [BoundingBox],
    pub query: &'a AxisLayout,
    pub subject: &'a AxisLayout,
    pub remove: RemoveSet,
    pub query_name: String,
    pub subject_name: String,
}

/// Maps data and figure-fraction coordinates to figure points.
struct Frame {
    size: f64,
    xsize: f64,
    ysize: f64,
}

impl Frame {
    fn left(&self) -> f64 {
        MARGIN * self.size
    }

    fn bottom(&self) -> f64 {
        (1.0 - MARGIN) * self.size
    }

    fn span(&self) -> f64 {
        (1.0 - 2.0 * MARGIN) * self.size
    }

    fn data(&self, x: f64, y: f64) -> (f64, f64) {
        (self.left() + x / self.xsize * self.span(), self.bottom() - y / self.ysize * self.span())
    }

    fn figure(&self, fx: f64, fy: f64) -> (f64, f64) {
        (fx * self.size, (1.0 - fy) * self.size)
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.xsize).contains(&x) && (0.0..=self.ysize).contains(&y)
    }
}

/// Clamp `[lo, hi]` to `[0, max]`, or `None` if they do not overlap.
fn clip_span(lo: f64, hi: f64, max: f64) -> Option<(f64, f64)> {
    if hi < 0.0 || lo > max {
        None
    } else {
        Some((lo.max(0.0), hi.min(max)))
    }
}

/// A "nice" step (1, 2 or 5 times a power of ten) of at least `raw`.
fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 {
        return 1.0;
    }
    let base = 10f64.powi(raw.log10().floor() as i32);
    let frac = raw / base;
    let nice = if frac <= 1.0 {
        1.0
    } else if frac <= 2.0 {
        2.0
    } else if frac <= 5.0 {
        5.0
    } else {
        10.0
    };
    (nice * base).max(1.0)
}

/// Tick positions from 0 up to `max` at a nice step.
pub fn nice_ticks(max: f64, desired: usize) -> Vec<f64> {
    let step = nice_step(max.max(1.0) / desired as f64);
    let count = (max / step + 1e-9).floor() as usize;
    (0..=count).map(|i| i as f64 * step).collect()
}

pub fn draw_dotplot(plot: &Dotplot, canvas: &mut dyn Canvas, size_points: f64) {
    let frame = Frame {
        size: size_points,
        xsize: plot.query.total_length.max(1) as f64,
        ysize: plot.subject.total_length.max(1) as f64,
    };

    // hits outside the axis extents are clipped away
    let box_stroke = Stroke { color: BLUE, width: 0.2 };
    for b in plot.boxes {
        let Some((x_min, x_max)) = clip_span(b.x_min as f64, b.x_max as f64, frame.xsize) else {
            continue;
        };
        let Some((y_min, y_max)) = clip_span(b.y_min as f64, b.y_max as f64, frame.ysize) else {
            continue;
        };
        let (x0, y0) = frame.data(x_min, y_max);
        let (x1, y1) = frame.data(x_max, y_min);
        canvas.rect(x0, y0, x1 - x0, y1 - y0, box_stroke);
    }

    let dot_color = BLACK.with_alpha(0.9);
    let mut clipped = 0usize;
    for p in plot.points {
        let (x, y) = (p.x as f64, p.y as f64);
        if frame.contains(x, y) {
            canvas.dot(frame.data(x, y), DOT_RADIUS, dot_color);
        } else {
            clipped += 1;
        }
    }
    if clipped > 0 {
        debug!("{} points fall outside the axes and are not drawn", clipped);
    }

    let break_stroke = Stroke { color: GREEN.with_alpha(0.5), width: 1.0 };
    let label_color = BLUE.with_alpha(0.5);

    if !plot.remove.query {
        for b in &plot.query.breaks {
            let x = b.boundary_start as f64;
            canvas.line(frame.data(x, 0.0), frame.data(x, frame.ysize), break_stroke);
        }
        let style = TextStyle {
            size: LABEL_SIZE,
            color: label_color,
            rotation: 45.0,
            h_align: HAlign::Left,
            v_align: VAlign::Baseline,
        };
        for b in &plot.query.breaks {
            let fx = MARGIN + plot.query.fraction(b.midpoint) * (1.0 - 2.0 * MARGIN);
            canvas.text(frame.figure(fx, 0.93), &b.sequence_id, &style);
        }
    }

    if !plot.remove.subject {
        for b in &plot.subject.breaks {
            let y = b.boundary_start as f64;
            canvas.line(frame.data(0.0, y), frame.data(frame.xsize, y), break_stroke);
        }
        let style = TextStyle {
            size: LABEL_SIZE,
            color: label_color,
            rotation: 0.0,
            h_align: HAlign::Left,
            v_align: VAlign::Center,
        };
        for b in &plot.subject.breaks {
            let fy = MARGIN + plot.subject.fraction(b.midpoint) * (1.0 - 2.0 * MARGIN);
            canvas.text(frame.figure(0.91, fy), &b.sequence_id, &style);
        }
    }

    draw_axes(plot, canvas, &frame);
}

fn draw_axes(plot: &Dotplot, canvas: &mut dyn Canvas, frame: &Frame) {
    let top = frame.bottom() - frame.span();
    canvas.rect(frame.left(), top, frame.span(), frame.span(), Stroke { color: BLACK, width: 0.8 });

    let mut tick = TextStyle {
        size: TICK_SIZE,
        color: GRAY,
        rotation: 0.0,
        h_align: HAlign::Center,
        v_align: VAlign::Top,
    };
    for t in nice_ticks(frame.xsize, DESIRED_TICKS) {
        let (x, y) = frame.data(t, 0.0);
        canvas.text((x, y + 4.0), &format!("{}", t as u64), &tick);
    }
    tick.h_align = HAlign::Right;
    tick.v_align = VAlign::Center;
    for t in nice_ticks(frame.ysize, DESIRED_TICKS) {
        let (x, y) = frame.data(0.0, t);
        canvas.text((x - 4.0, y), &format!("{}", t as u64), &tick);
    }

    let mut title = TextStyle {
        size: TITLE_SIZE,
        color: BLACK,
        rotation: 0.0,
        h_align: HAlign::Center,
        v_align: VAlign::Top,
    };
    let mid = frame.left() + frame.span() / 2.0;
    canvas.text((mid, frame.bottom() + 4.0 + TICK_SIZE + 6.0), &plot.query_name, &title);
    title.rotation = 90.0;
    title.v_align = VAlign::Baseline;
    let y_mid = frame.bottom() - frame.span() / 2.0;
    canvas.text((frame.left() * 0.4, y_mid), &plot.subject_name, &title);
}

/// Render the plot in `format` and return the encoded file contents.
pub fn render(plot: &Dotplot, style: &PlotStyle, format: OutputFormat) -> Result<Vec<u8>> {
    let size_points = style.size_inches * POINTS_PER_INCH;
    debug!(
        "Drawing {} points, {} boxes, {} x {} breaks",
        plot.points.len(),
        plot.boxes.len(),
        plot.query.breaks.len(),
        plot.subject.breaks.len()
    );

    match format {
        OutputFormat::Png => {
            let mut canvas = RasterCanvas::new(style.size_inches, style.dpi);
            draw_dotplot(plot, &mut canvas, size_points);
            canvas.encode_png()
        }
        OutputFormat::Svg => {
            let mut canvas = SvgCanvas::new(size_points);
            draw_dotplot(plot, &mut canvas, size_points);
            Ok(canvas.finish().into_bytes())
        }
        OutputFormat::Pdf => {
            let mut canvas = PdfCanvas::new(size_points)?;
            draw_dotplot(plot, &mut canvas, size_points);
            canvas.finish()
        }
        OutputFormat::Ps | OutputFormat::Eps => {
            let dialect = if format == OutputFormat::Eps { PageDialect::Eps } else { PageDialect::Ps };
            let mut canvas = PageCanvas::new(dialect, size_points);
            draw_dotplot(plot, &mut canvas, size_points);
            Ok(canvas.finish())
        }
    }
}

pub fn render_to_file(plot: &Dotplot, style: &PlotStyle, format: OutputFormat, path: &Path) -> Result<()> {
    let bytes = render(plot, style, format)?;
    std::fs::write(path, bytes).map_err(|e| DotplotError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Extent;
    use image::GenericImageView;

    #[derive(Default)]
    struct Recorder {
        lines: Vec<((f64, f64), (f64, f64))>,
        rects: Vec<(f64, f64, f64, f64)>,
        dots: Vec<(f64, f64)>,
        texts: Vec<(String, (f64, f64))>,
    }

    impl Canvas for Recorder {
        fn line(&mut self, from: (f64, f64), to: (f64, f64), _stroke: Stroke) {
            self.lines.push((from, to));
        }

        fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, _stroke: Stroke) {
            self.rects.push((x, y, w, h));
        }

        fn dot(&mut self, center: (f64, f64), _radius: f64, _color: Color) {
            self.dots.push(center);
        }

        fn text(&mut self, at: (f64, f64), text: &str, _style: &TextStyle) {
            self.texts.push((text.to_string(), at));
        }
    }

    fn layouts() -> (AxisLayout, AxisLayout) {
        let query = AxisLayout::from_extents(&[Extent::new("q1", 1, 50), Extent::new("q2", 1, 50)]).unwrap();
        let subject = AxisLayout::from_extents(&[Extent::new("s1", 1, 100)]).unwrap();
        (query, subject)
    }

    fn draw(remove: RemoveSet) -> Recorder {
        let (query, subject) = layouts();
        let points = [PointPair { x: 0, y: 0 }, PointPair { x: 100, y: 100 }];
        let boxes = [BoundingBox { x_min: 10, x_max: 20, y_min: 10, y_max: 20 }];
        let plot = Dotplot {
            points: &points,
            boxes: &boxes,
            query: &query,
            subject: &subject,
            remove,
            query_name: "grape".to_string(),
            subject_name: "peach".to_string(),
        };
        let mut recorder = Recorder::default();
        draw_dotplot(&plot, &mut recorder, 100.0);
        recorder
    }

    #[test]
    fn remove_set_is_unordered() {
        let both = RemoveSet { query: true, subject: true };
        assert_eq!("qs".parse::<RemoveSet>().unwrap(), both);
        assert_eq!("sq".parse::<RemoveSet>().unwrap(), both);
        assert_eq!("q".parse::<RemoveSet>().unwrap(), RemoveSet { query: true, subject: false });
        assert_eq!("s".parse::<RemoveSet>().unwrap(), RemoveSet { query: false, subject: true });
        assert!("x".parse::<RemoveSet>().is_err());
        assert!("".parse::<RemoveSet>().is_err());
    }

    #[test]
    fn ticks_use_nice_steps() {
        assert_eq!(nice_ticks(100.0, 6), vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0]);
        assert_eq!(nice_ticks(3.0, 6), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(nice_ticks(1_000_000.0, 6).len(), 6);
    }

    #[test]
    fn points_map_into_plot_area() {
        let r = draw(RemoveSet::default());
        assert_eq!(r.dots, vec![(10.0, 90.0), (90.0, 10.0)]);
        // cluster box plus frame
        assert_eq!(r.rects.len(), 2);
    }

    #[test]
    fn hits_outside_the_axes_are_clipped() {
        let axis = AxisLayout::from_extents(&[Extent::new("c1", 1, 100)]).unwrap();
        let points = [PointPair { x: 500, y: 50 }, PointPair { x: 50, y: -3 }, PointPair { x: 50, y: 50 }];
        let boxes = [
            BoundingBox { x_min: 50, x_max: 400, y_min: 40, y_max: 60 },
            BoundingBox { x_min: 200, x_max: 300, y_min: 10, y_max: 20 },
        ];
        let plot = Dotplot {
            points: &points,
            boxes: &boxes,
            query: &axis,
            subject: &axis,
            remove: RemoveSet::default(),
            query_name: "a".to_string(),
            subject_name: "b".to_string(),
        };
        let mut r = Recorder::default();
        draw_dotplot(&plot, &mut r, 100.0);

        assert_eq!(r.dots, vec![(50.0, 50.0)]);
        // the partly visible box stops at the right edge of the frame, the other is dropped
        assert_eq!(r.rects[0], (50.0, 42.0, 40.0, 16.0));
        assert_eq!(r.rects.len(), 2);
        for &(x, y, w, h) in &r.rects {
            assert!(x >= 10.0 && x + w <= 90.0);
            assert!(y >= 10.0 && y + h <= 90.0);
        }
    }

    #[test]
    fn breaks_and_labels_follow_remove_set() {
        let all = draw(RemoveSet::default());
        assert_eq!(all.lines.len(), 3);
        assert!(all.texts.iter().any(|(t, _)| t == "q2"));
        assert!(all.texts.iter().any(|(t, _)| t == "s1"));

        let no_query = draw(RemoveSet { query: true, subject: false });
        assert_eq!(no_query.lines.len(), 1);
        assert!(!no_query.texts.iter().any(|(t, _)| t.starts_with('q')));
        assert!(no_query.texts.iter().any(|(t, _)| t == "s1"));

        let none = draw(RemoveSet { query: true, subject: true });
        assert!(none.lines.is_empty());
        assert!(!none.texts.iter().any(|(t, _)| t == "s1"));
    }

    #[test]
    fn query_label_sits_over_its_chromosome() {
        let r = draw(RemoveSet::default());
        let (_, at) = r.texts.iter().find(|(t, _)| t == "q2").unwrap();
        // q2 spans 50..100 of 100, midpoint at 0.75 of the plot width
        assert!((at.0 - (10.0 + 0.75 * 80.0)).abs() < 1e-9);
        assert!((at.1 - 7.0).abs() < 1e-9);
    }

    #[test]
    fn vector_output_is_deterministic() {
        let (query, subject) = layouts();
        let points = [PointPair { x: 5, y: 7 }];
        let plot = Dotplot {
            points: &points,
            boxes: &[],
            query: &query,
            subject: &subject,
            remove: RemoveSet::default(),
            query_name: "a".to_string(),
            subject_name: "b".to_string(),
        };
        let style = PlotStyle::default();
        for format in [OutputFormat::Svg, OutputFormat::Ps, OutputFormat::Eps] {
            let first = render(&plot, &style, format).unwrap();
            let second = render(&plot, &style, format).unwrap();
            assert!(!first.is_empty());
            assert_eq!(first, second, "{:?} output differs", format);
        }
    }

    #[test]
    fn pdf_output_is_a_document() {
        let (query, subject) = layouts();
        let points = [PointPair { x: 5, y: 7 }];
        let plot = Dotplot {
            points: &points,
            boxes: &[],
            query: &query,
            subject: &subject,
            remove: RemoveSet::default(),
            query_name: "a".to_string(),
            subject_name: "b".to_string(),
        };
        let bytes = render(&plot, &PlotStyle::default(), OutputFormat::Pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn png_has_requested_resolution() {
        let (query, subject) = layouts();
        let plot = Dotplot {
            points: &[],
            boxes: &[],
            query: &query,
            subject: &subject,
            remove: RemoveSet::default(),
            query_name: "a".to_string(),
            subject_name: "b".to_string(),
        };
        let style = PlotStyle { size_inches: 2.0, dpi: 50 };
        let bytes = render(&plot, &style, OutputFormat::Png).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!(img.dimensions(), (100, 100));
    }
}
