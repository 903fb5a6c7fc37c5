//! RGBA drawing surface with anti-aliased polyline strokes.
//!
//! Strokes are rasterised into a coverage mask first (distance to the
//! nearest segment, which gives round caps and joins for free) and composited
//! once, so overlapping segments of a translucent stroke do not double up.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Opacity in `[0, 1]`.
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 1.0);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 1.0);

    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba,
    pub width: f32,
}

/// Layout size of the element that hosts the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutSize {
    pub width: u32,
    pub height: u32,
}

impl LayoutSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    coverage: Vec<f32>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![0; len * 4],
            coverage: vec![0.0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw RGBA bytes, row-major, no padding.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Re-derives the pixel dimensions from the container's layout size.
    /// Like a canvas, changing the size clears the contents.
    pub fn fit_to(&mut self, container: LayoutSize) {
        if container.width == self.width && container.height == self.height {
            return;
        }
        log::debug!(
            "Surface resized {}x{} -> {}x{}",
            self.width,
            self.height,
            container.width,
            container.height
        );
        *self = Surface::new(container.width, container.height);
    }

    pub fn fill(&mut self, color: Rgba) {
        let a = (color.a.clamp(0.0, 1.0) * 255.0).round() as u8;
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, a]);
        }
    }

    /// Strokes the open polyline through `points`.
    pub fn stroke_polyline(&mut self, points: &[Point], style: StrokeStyle) {
        if self.is_empty() || points.is_empty() || style.width <= 0.0 {
            return;
        }

        let half = style.width / 2.0;
        let reach = half + 1.0;
        let mut dirty: Option<(u32, u32, u32, u32)> = None;

        let segments: Vec<(Point, Point)> = if points.len() == 1 {
            vec![(points[0], points[0])]
        } else {
            points.windows(2).map(|w| (w[0], w[1])).collect()
        };

        for (a, b) in segments {
            let Some((x0, y0, x1, y1)) = self.clip_box(
                a.x.min(b.x) - reach,
                a.y.min(b.y) - reach,
                a.x.max(b.x) + reach,
                a.y.max(b.y) + reach,
            ) else {
                continue;
            };

            for py in y0..=y1 {
                let row = py as usize * self.width as usize;
                for px in x0..=x1 {
                    let center = Point::new(px as f32 + 0.5, py as f32 + 0.5);
                    let d = distance_to_segment(center, a, b);
                    let cov = (half + 0.5 - d).clamp(0.0, 1.0);
                    let slot = &mut self.coverage[row + px as usize];
                    if cov > *slot {
                        *slot = cov;
                    }
                }
            }

            dirty = Some(match dirty {
                None => (x0, y0, x1, y1),
                Some((dx0, dy0, dx1, dy1)) => (dx0.min(x0), dy0.min(y0), dx1.max(x1), dy1.max(y1)),
            });
        }

        if let Some((x0, y0, x1, y1)) = dirty {
            self.composite_coverage(x0, y0, x1, y1, style.color);
        }
    }

    /// Straight line between two points.
    pub fn stroke_line(&mut self, from: Point, to: Point, style: StrokeStyle) {
        self.stroke_polyline(&[from, to], style);
    }

    fn clip_box(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Option<(u32, u32, u32, u32)> {
        let max_x = self.width as f32 - 1.0;
        let max_y = self.height as f32 - 1.0;
        if x1 < 0.0 || y1 < 0.0 || x0 > max_x || y0 > max_y {
            return None;
        }
        Some((
            x0.floor().max(0.0) as u32,
            y0.floor().max(0.0) as u32,
            x1.ceil().min(max_x) as u32,
            y1.ceil().min(max_y) as u32,
        ))
    }

    /// Source-over blend of `color` through the coverage mask; clears the
    /// mask inside the box.
    fn composite_coverage(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba) {
        let opacity = color.a.clamp(0.0, 1.0);
        for py in y0..=y1 {
            let row = py as usize * self.width as usize;
            for px in x0..=x1 {
                let i = row + px as usize;
                let cov = std::mem::take(&mut self.coverage[i]);
                if cov <= 0.0 {
                    continue;
                }
                let a = cov * opacity;
                let inv_a = 1.0 - a;
                let idx = i * 4;
                let p = &mut self.pixels[idx..idx + 4];
                p[0] = (color.r as f32 * a + p[0] as f32 * inv_a).round() as u8;
                p[1] = (color.g as f32 * a + p[1] as f32 * inv_a).round() as u8;
                p[2] = (color.b as f32 * a + p[2] as f32 * inv_a).round() as u8;
                let dst_a = p[3] as f32 / 255.0;
                p[3] = ((a + dst_a * inv_a) * 255.0).round() as u8;
            }
        }
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(width: f32) -> StrokeStyle {
        StrokeStyle {
            color: Rgba::WHITE,
            width,
        }
    }

    #[test]
    fn fit_to_matches_container() {
        let mut surface = Surface::new(0, 0);
        surface.fit_to(LayoutSize::new(640, 320));
        assert_eq!((surface.width(), surface.height()), (640, 320));
        assert_eq!(surface.pixels().len(), 640 * 320 * 4);
    }

    #[test]
    fn fill_then_horizontal_stroke() {
        let mut surface = Surface::new(20, 20);
        surface.fill(Rgba::BLACK);
        surface.stroke_line(Point::new(0.0, 10.5), Point::new(20.0, 10.5), white(1.0));

        assert_eq!(surface.pixel(5, 10), [255, 255, 255, 255]);
        assert_eq!(surface.pixel(5, 2), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(5, 12), [0, 0, 0, 255]);
    }

    #[test]
    fn translucent_stroke_blends_once_at_joins() {
        let mut surface = Surface::new(20, 20);
        surface.fill(Rgba::BLACK);
        let style = StrokeStyle {
            color: Rgba::WHITE.with_alpha(0.5),
            width: 2.0,
        };
        surface.stroke_polyline(
            &[Point::new(2.0, 10.5), Point::new(10.5, 10.5), Point::new(18.0, 10.5)],
            style,
        );
        // Pixel at the shared vertex sees one blend, same as mid-segment
        assert_eq!(surface.pixel(10, 10), surface.pixel(5, 10));
        assert_eq!(surface.pixel(10, 10)[0], 128);
    }

    #[test]
    fn strokes_outside_are_clipped() {
        let mut surface = Surface::new(10, 10);
        surface.fill(Rgba::BLACK);
        surface.stroke_line(Point::new(-50.0, -50.0), Point::new(-20.0, -20.0), white(3.0));
        surface.stroke_line(Point::new(-5.0, 5.5), Point::new(50.0, 5.5), white(1.0));
        assert!(surface.pixels().chunks(4).all(|p| p[3] == 255));
        assert_eq!(surface.pixel(9, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn empty_surface_ignores_drawing() {
        let mut surface = Surface::new(0, 0);
        surface.fill(Rgba::BLACK);
        surface.stroke_line(Point::new(0.0, 0.0), Point::new(1.0, 1.0), white(1.0));
        assert!(surface.pixels().is_empty());
    }
}
