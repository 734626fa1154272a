//! PNG backend: an RGB pixel buffer with alpha blending and a 5x8 bitmap font.

use image::{Rgb, RgbImage};
use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::plot::{Canvas, Color, HAlign, Stroke, TextStyle, VAlign, POINTS_PER_INCH};

/// 5x8 bitmap font, one byte per row, glyph in the top five bits.
const FONT_5X8: [[u8; 8]; 128] = {
    let mut font = [[0u8; 8]; 128];
    font[b' ' as usize] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    font[b'!' as usize] = [0x20, 0x20, 0x20, 0x20, 0x20, 0x00, 0x20, 0x00];
    font[b'"' as usize] = [0x50, 0x50, 0x50, 0x00, 0x00, 0x00, 0x00, 0x00];
    font[b'#' as usize] = [0x50, 0x50, 0xF8, 0x50, 0xF8, 0x50, 0x50, 0x00];
    font[b'$' as usize] = [0x20, 0x78, 0xA0, 0x70, 0x28, 0xF0, 0x20, 0x00];
    font[b'%' as usize] = [0xC0, 0xC8, 0x10, 0x20, 0x40, 0x98, 0x18, 0x00];
    font[b'&' as usize] = [0x40, 0xA0, 0xA0, 0x40, 0xA8, 0x90, 0x68, 0x00];
    font[b'\'' as usize] = [0x20, 0x20, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00];
    font[b'(' as usize] = [0x10, 0x20, 0x40, 0x40, 0x40, 0x20, 0x10, 0x00];
    font[b')' as usize] = [0x40, 0x20, 0x10, 0x10, 0x10, 0x20, 0x40, 0x00];
    font[b'*' as usize] = [0x00, 0x20, 0xA8, 0x70, 0xA8, 0x20, 0x00, 0x00];
    font[b'+' as usize] = [0x00, 0x20, 0x20, 0xF8, 0x20, 0x20, 0x00, 0x00];
    font[b',' as usize] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x20, 0x20, 0x40];
    font[b'-' as usize] = [0x00, 0x00, 0x00, 0xF8, 0x00, 0x00, 0x00, 0x00];
    font[b'.' as usize] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x20, 0x20, 0x00];
    font[b'/' as usize] = [0x00, 0x08, 0x10, 0x20, 0x40, 0x80, 0x00, 0x00];
    font[b'0' as usize] = [0x70, 0x88, 0x98, 0xA8, 0xC8, 0x88, 0x70, 0x00];
    font[b'1' as usize] = [0x20, 0x60, 0x20, 0x20, 0x20, 0x20, 0x70, 0x00];
    font[b'2' as usize] = [0x70, 0x88, 0x08, 0x30, 0x40, 0x80, 0xF8, 0x00];
    font[b'3' as usize] = [0xF8, 0x10, 0x20, 0x10, 0x08, 0x88, 0x70, 0x00];
    font[b'4' as usize] = [0x10, 0x30, 0x50, 0x90, 0xF8, 0x10, 0x10, 0x00];
    font[b'5' as usize] = [0xF8, 0x80, 0xF0, 0x08, 0x08, 0x88, 0x70, 0x00];
    font[b'6' as usize] = [0x30, 0x40, 0x80, 0xF0, 0x88, 0x88, 0x70, 0x00];
    font[b'7' as usize] = [0xF8, 0x08, 0x10, 0x20, 0x40, 0x40, 0x40, 0x00];
    font[b'8' as usize] = [0x70, 0x88, 0x88, 0x70, 0x88, 0x88, 0x70, 0x00];
    font[b'9' as usize] = [0x70, 0x88, 0x88, 0x78, 0x08, 0x10, 0x60, 0x00];
    font[b':' as usize] = [0x00, 0x00, 0x20, 0x00, 0x00, 0x20, 0x00, 0x00];
    font[b';' as usize] = [0x00, 0x00, 0x20, 0x00, 0x00, 0x20, 0x20, 0x40];
    font[b'<' as usize] = [0x08, 0x10, 0x20, 0x40, 0x20, 0x10, 0x08, 0x00];
    font[b'=' as usize] = [0x00, 0x00, 0xF8, 0x00, 0xF8, 0x00, 0x00, 0x00];
    font[b'>' as usize] = [0x80, 0x40, 0x20, 0x10, 0x20, 0x40, 0x80, 0x00];
    font[b'?' as usize] = [0x70, 0x88, 0x08, 0x10, 0x20, 0x00, 0x20, 0x00];
    font[b'@' as usize] = [0x70, 0x88, 0xB8, 0xA8, 0xB8, 0x80, 0x70, 0x00];
    font[b'A' as usize] = [0x70, 0x88, 0x88, 0xF8, 0x88, 0x88, 0x88, 0x00];
    font[b'B' as usize] = [0xF0, 0x88, 0x88, 0xF0, 0x88, 0x88, 0xF0, 0x00];
    font[b'C' as usize] = [0x70, 0x88, 0x80, 0x80, 0x80, 0x88, 0x70, 0x00];
    font[b'D' as usize] = [0xE0, 0x90, 0x88, 0x88, 0x88, 0x90, 0xE0, 0x00];
    font[b'E' as usize] = [0xF8, 0x80, 0x80, 0xF0, 0x80, 0x80, 0xF8, 0x00];
    font[b'F' as usize] = [0xF8, 0x80, 0x80, 0xF0, 0x80, 0x80, 0x80, 0x00];
    font[b'G' as usize] = [0x70, 0x88, 0x80, 0xB8, 0x88, 0x88, 0x70, 0x00];
    font[b'H' as usize] = [0x88, 0x88, 0x88, 0xF8, 0x88, 0x88, 0x88, 0x00];
    font[b'I' as usize] = [0x70, 0x20, 0x20, 0x20, 0x20, 0x20, 0x70, 0x00];
    font[b'J' as usize] = [0x38, 0x10, 0x10, 0x10, 0x10, 0x90, 0x60, 0x00];
    font[b'K' as usize] = [0x88, 0x90, 0xA0, 0xC0, 0xA0, 0x90, 0x88, 0x00];
    font[b'L' as usize] = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0xF8, 0x00];
    font[b'M' as usize] = [0x88, 0xD8, 0xA8, 0xA8, 0x88, 0x88, 0x88, 0x00];
    font[b'N' as usize] = [0x88, 0xC8, 0xA8, 0x98, 0x88, 0x88, 0x88, 0x00];
    font[b'O' as usize] = [0x70, 0x88, 0x88, 0x88, 0x88, 0x88, 0x70, 0x00];
    font[b'P' as usize] = [0xF0, 0x88, 0x88, 0xF0, 0x80, 0x80, 0x80, 0x00];
    font[b'Q' as usize] = [0x70, 0x88, 0x88, 0x88, 0xA8, 0x90, 0x68, 0x00];
    font[b'R' as usize] = [0xF0, 0x88, 0x88, 0xF0, 0xA0, 0x90, 0x88, 0x00];
    font[b'S' as usize] = [0x70, 0x88, 0x80, 0x70, 0x08, 0x88, 0x70, 0x00];
    font[b'T' as usize] = [0xF8, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x00];
    font[b'U' as usize] = [0x88, 0x88, 0x88, 0x88, 0x88, 0x88, 0x70, 0x00];
    font[b'V' as usize] = [0x88, 0x88, 0x88, 0x88, 0x88, 0x50, 0x20, 0x00];
    font[b'W' as usize] = [0x88, 0x88, 0x88, 0xA8, 0xA8, 0xD8, 0x88, 0x00];
    font[b'X' as usize] = [0x88, 0x88, 0x50, 0x20, 0x50, 0x88, 0x88, 0x00];
    font[b'Y' as usize] = [0x88, 0x88, 0x50, 0x20, 0x20, 0x20, 0x20, 0x00];
    font[b'Z' as usize] = [0xF8, 0x08, 0x10, 0x20, 0x40, 0x80, 0xF8, 0x00];
    font[b'[' as usize] = [0x70, 0x40, 0x40, 0x40, 0x40, 0x40, 0x70, 0x00];
    font[b'\\' as usize] = [0x00, 0x80, 0x40, 0x20, 0x10, 0x08, 0x00, 0x00];
    font[b']' as usize] = [0x70, 0x10, 0x10, 0x10, 0x10, 0x10, 0x70, 0x00];
    font[b'^' as usize] = [0x20, 0x50, 0x88, 0x00, 0x00, 0x00, 0x00, 0x00];
    font[b'_' as usize] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF8, 0x00];
    font[b'`' as usize] = [0x40, 0x20, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00];
    font[b'a' as usize] = [0x00, 0x00, 0x70, 0x08, 0x78, 0x88, 0x78, 0x00];
    font[b'b' as usize] = [0x80, 0x80, 0xB0, 0xC8, 0x88, 0x88, 0xF0, 0x00];
    font[b'c' as usize] = [0x00, 0x00, 0x70, 0x80, 0x80, 0x88, 0x70, 0x00];
    font[b'd' as usize] = [0x08, 0x08, 0x68, 0x98, 0x88, 0x88, 0x78, 0x00];
    font[b'e' as usize] = [0x00, 0x00, 0x70, 0x88, 0xF8, 0x80, 0x70, 0x00];
    font[b'f' as usize] = [0x30, 0x48, 0x40, 0xE0, 0x40, 0x40, 0x40, 0x00];
    font[b'g' as usize] = [0x00, 0x00, 0x78, 0x88, 0x78, 0x08, 0x70, 0x00];
    font[b'h' as usize] = [0x80, 0x80, 0xB0, 0xC8, 0x88, 0x88, 0x88, 0x00];
    font[b'i' as usize] = [0x20, 0x00, 0x60, 0x20, 0x20, 0x20, 0x70, 0x00];
    font[b'j' as usize] = [0x10, 0x00, 0x30, 0x10, 0x10, 0x90, 0x60, 0x00];
    font[b'k' as usize] = [0x80, 0x80, 0x90, 0xA0, 0xC0, 0xA0, 0x90, 0x00];
    font[b'l' as usize] = [0x60, 0x20, 0x20, 0x20, 0x20, 0x20, 0x70, 0x00];
    font[b'm' as usize] = [0x00, 0x00, 0xD0, 0xA8, 0xA8, 0xA8, 0xA8, 0x00];
    font[b'n' as usize] = [0x00, 0x00, 0xB0, 0xC8, 0x88, 0x88, 0x88, 0x00];
    font[b'o' as usize] = [0x00, 0x00, 0x70, 0x88, 0x88, 0x88, 0x70, 0x00];
    font[b'p' as usize] = [0x00, 0x00, 0xF0, 0x88, 0xF0, 0x80, 0x80, 0x00];
    font[b'q' as usize] = [0x00, 0x00, 0x78, 0x88, 0x78, 0x08, 0x08, 0x00];
    font[b'r' as usize] = [0x00, 0x00, 0xB0, 0xC8, 0x80, 0x80, 0x80, 0x00];
    font[b's' as usize] = [0x00, 0x00, 0x70, 0x80, 0x70, 0x08, 0xF0, 0x00];
    font[b't' as usize] = [0x40, 0x40, 0xE0, 0x40, 0x40, 0x48, 0x30, 0x00];
    font[b'u' as usize] = [0x00, 0x00, 0x88, 0x88, 0x88, 0x98, 0x68, 0x00];
    font[b'v' as usize] = [0x00, 0x00, 0x88, 0x88, 0x88, 0x50, 0x20, 0x00];
    font[b'w' as usize] = [0x00, 0x00, 0x88, 0x88, 0xA8, 0xA8, 0x50, 0x00];
    font[b'x' as usize] = [0x00, 0x00, 0x88, 0x50, 0x20, 0x50, 0x88, 0x00];
    font[b'y' as usize] = [0x00, 0x00, 0x88, 0x88, 0x78, 0x08, 0x70, 0x00];
    font[b'z' as usize] = [0x00, 0x00, 0xF8, 0x10, 0x20, 0x40, 0xF8, 0x00];
    font[b'{' as usize] = [0x10, 0x20, 0x20, 0x40, 0x20, 0x20, 0x10, 0x00];
    font[b'|' as usize] = [0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x00];
    font[b'}' as usize] = [0x40, 0x20, 0x20, 0x10, 0x20, 0x20, 0x40, 0x00];
    font[b'~' as usize] = [0x00, 0x00, 0x40, 0xA8, 0x10, 0x00, 0x00, 0x00];
    font
};

const GLYPH_ROWS: u32 = 8;
const GLYPH_ADVANCE: u32 = 6;
const METERS_PER_INCH: f64 = 0.0254;

pub struct RasterCanvas {
    img: RgbImage,
    /// Pixels per figure point.
    scale: f64,
    dpi: u32,
}

impl RasterCanvas {
    pub fn new(size_inches: f64, dpi: u32) -> Self {
        let pixels = ((size_inches * dpi as f64).round() as u32).max(1);
        RasterCanvas {
            img: RgbImage::from_pixel(pixels, pixels, Rgb([255, 255, 255])),
            scale: dpi as f64 / POINTS_PER_INCH,
            dpi,
        }
    }

    fn to_px(&self, p: (f64, f64)) -> (f64, f64) {
        (p.0 * self.scale, p.1 * self.scale)
    }

    fn blend(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= self.img.width() as i64 || y >= self.img.height() as i64 {
            return;
        }
        let px = self.img.get_pixel_mut(x as u32, y as u32);
        let a = color.alpha.clamp(0.0, 1.0);
        for (dst, src) in px.0.iter_mut().zip([color.r, color.g, color.b]) {
            *dst = (src as f64 * a + *dst as f64 * (1.0 - a)).round() as u8;
        }
    }

    /// Blend every pixel whose center lies within `reach` of the segment `a`-`b`.
    fn fill_near_segment(&mut self, a: (f64, f64), b: (f64, f64), reach: f64, color: Color) {
        let x0 = (a.0.min(b.0) - reach).floor() as i64;
        let x1 = (a.0.max(b.0) + reach).ceil() as i64;
        let y0 = (a.1.min(b.1) - reach).floor() as i64;
        let y1 = (a.1.max(b.1) + reach).ceil() as i64;
        let x0 = x0.max(0);
        let y0 = y0.max(0);
        let x1 = x1.min(self.img.width() as i64 - 1);
        let y1 = y1.min(self.img.height() as i64 - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let c = (x as f64 + 0.5, y as f64 + 0.5);
                if segment_distance(c, a, b) <= reach {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// PNG bytes with the resolution recorded in a `pHYs` chunk.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let ppm = (self.dpi as f64 / METERS_PER_INCH).round() as u32;
        let mut bytes = Vec::new();
        let mut encoder = png::Encoder::new(&mut bytes, self.img.width(), self.img.height());
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(Some(png::PixelDimensions { xppu: ppm, yppu: ppm, unit: png::Unit::Meter }));
        let mut writer = encoder.write_header()?;
        writer.write_image_data(self.img.as_raw())?;
        writer.finish()?;
        Ok(bytes)
    }
}

fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

fn glyph(c: char) -> &'static [u8; 8] {
    let code = c as usize;
    if code < 128 {
        &FONT_5X8[code]
    } else {
        &FONT_5X8[b'?' as usize]
    }
}

impl Canvas for RasterCanvas {
    fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: Stroke) {
        let reach = (stroke.width * self.scale).max(1.0) / 2.0;
        let (a, b) = (self.to_px(from), self.to_px(to));
        self.fill_near_segment(a, b, reach, stroke.color);
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, stroke: Stroke) {
        let corners = [(x, y), (x + width, y), (x + width, y + height), (x, y + height)];
        for i in 0..4 {
            self.line(corners[i], corners[(i + 1) % 4], stroke);
        }
    }

    fn dot(&mut self, center: (f64, f64), radius: f64, color: Color) {
        // at least one pixel for any center position
        let reach = (radius * self.scale).max(0.75);
        let c = self.to_px(center);
        self.fill_near_segment(c, c, reach, color);
    }

    fn text(&mut self, at: (f64, f64), text: &str, style: &TextStyle) {
        let ratio = ((style.size * self.scale / GLYPH_ROWS as f64).round() as u32).max(1);
        let n_chars = text.chars().count() as u32;
        let width = (n_chars * GLYPH_ADVANCE * ratio) as f64;
        let ox = match style.h_align {
            HAlign::Left => 0.0,
            HAlign::Center => -width / 2.0,
            HAlign::Right => -width,
        };
        let oy = match style.v_align {
            VAlign::Baseline => -7.0 * ratio as f64,
            VAlign::Center => -4.0 * ratio as f64,
            VAlign::Top => 0.0,
        };
        let (sin, cos) = style.rotation.to_radians().sin_cos();
        let (ax, ay) = self.to_px(at);

        // Each bit is sampled at half-pixel steps so rotated glyphs have no holes;
        // the set keeps overlapping samples from blending twice.
        let mut covered: FxHashSet<(i64, i64)> = FxHashSet::default();
        let steps = 2 * ratio;
        for (i, c) in text.chars().enumerate() {
            let base_x = ox + (i as u32 * GLYPH_ADVANCE * ratio) as f64;
            for (j, row) in glyph(c).iter().enumerate() {
                for z in (0..8i32).rev() {
                    if (row >> z) & 1 == 0 {
                        continue;
                    }
                    let cell_x = base_x + ((7 - z) as u32 * ratio) as f64;
                    let cell_y = oy + (j as u32 * ratio) as f64;
                    for sy in 0..steps {
                        for sx in 0..steps {
                            let lx = cell_x + (sx as f64 + 0.5) / 2.0;
                            let ly = cell_y + (sy as f64 + 0.5) / 2.0;
                            let dx = lx * cos + ly * sin;
                            let dy = -lx * sin + ly * cos;
                            covered.insert(((ax + dx).floor() as i64, (ay + dy).floor() as i64));
                        }
                    }
                }
            }
        }

        let mut pixels: Vec<(i64, i64)> = covered.into_iter().collect();
        pixels.sort_unstable();
        for (x, y) in pixels {
            self.blend(x, y, style.color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::{BLACK, BLUE};

    fn canvas() -> RasterCanvas {
        // one pixel per point
        RasterCanvas::new(1.0, 72)
    }

    fn pixel(c: &RasterCanvas, x: u32, y: u32) -> [u8; 3] {
        c.img.get_pixel(x, y).0
    }

    #[test]
    fn size_follows_dpi() {
        let c = RasterCanvas::new(8.0, 600);
        assert_eq!(c.img.dimensions(), (4800, 4800));
    }

    #[test]
    fn vertical_line_is_one_pixel_wide() {
        let mut c = canvas();
        c.line((10.2, 5.0), (10.2, 20.0), Stroke { color: BLACK, width: 1.0 });
        assert_eq!(pixel(&c, 10, 12), [0, 0, 0]);
        assert_eq!(pixel(&c, 9, 12), [255, 255, 255]);
        assert_eq!(pixel(&c, 11, 12), [255, 255, 255]);
    }

    #[test]
    fn alpha_blends_over_white() {
        let mut c = canvas();
        c.dot((30.5, 30.5), 0.1, BLUE.with_alpha(0.5));
        assert_eq!(pixel(&c, 30, 30), [128, 128, 255]);
    }

    #[test]
    fn dot_on_pixel_corner_is_visible() {
        let mut c = canvas();
        c.dot((40.0, 40.0), 0.01, BLACK);
        let dark = (39..=40).flat_map(|x| (39..=40).map(move |y| (x, y))).filter(|&(x, y)| pixel(&c, x, y) == [0, 0, 0]).count();
        assert!(dark >= 1);
    }

    #[test]
    fn text_marks_pixels_and_stays_in_bounds() {
        let mut c = canvas();
        let style = TextStyle {
            size: 8.0,
            color: BLACK,
            rotation: 45.0,
            h_align: HAlign::Left,
            v_align: VAlign::Baseline,
        };
        c.text((20.0, 60.0), "chr1", &style);
        c.text((0.0, 0.0), "edge", &style);
        let dark = c.img.pixels().filter(|p| p.0 == [0, 0, 0]).count();
        assert!(dark > 10);
    }

    #[test]
    fn png_encodes() {
        let bytes = canvas().encode_png().unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn png_records_resolution() {
        let bytes = RasterCanvas::new(1.0, 600).encode_png().unwrap();
        let reader = png::Decoder::new(std::io::Cursor::new(bytes)).read_info().unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (600, 600));
        // 600 / 0.0254 pixels per meter
        assert_eq!(
            info.pixel_dims,
            Some(png::PixelDimensions { xppu: 23622, yppu: 23622, unit: png::Unit::Meter })
        );
    }
}
