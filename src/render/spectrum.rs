//! Mirrored dual-band trace painter.
//!
//! The low band hangs below the center line, the high band rises above it,
//! and a faint divider plus a dimmed copy of the high trace sit on top.

use super::surface::{Point, Rgba, StrokeStyle, Surface};
use super::RenderError;

/// Fraction of the half-height a full-scale bin may reach.
pub const HEADROOM: f32 = 0.9;
/// Magnitude scale of the glow copy of the high trace.
pub const GLOW_SCALE: f32 = 0.7;

pub const TRACE_STYLE: StrokeStyle = StrokeStyle {
    color: Rgba::WHITE,
    width: 1.5,
};
pub const DIVIDER_STYLE: StrokeStyle = StrokeStyle {
    color: Rgba::WHITE.with_alpha(0.15),
    width: 1.0,
};
pub const GLOW_STYLE: StrokeStyle = StrokeStyle {
    color: Rgba::WHITE.with_alpha(0.3),
    width: 0.5,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceDirection {
    /// Larger magnitudes sit higher on the surface.
    Up,
    /// Larger magnitudes sit lower on the surface.
    Down,
}

/// Vertical position of one bin.
pub fn trace_y(magnitude: u8, center_y: f32, direction: TraceDirection, scale: f32) -> f32 {
    let offset = (magnitude as f32 / 255.0) * scale * center_y * HEADROOM;
    match direction {
        TraceDirection::Up => center_y - offset,
        TraceDirection::Down => center_y + offset,
    }
}

pub fn trace_points(
    snapshot: &[u8],
    slice_width: f32,
    center_y: f32,
    direction: TraceDirection,
    scale: f32,
) -> Vec<Point> {
    snapshot
        .iter()
        .enumerate()
        .map(|(i, &m)| Point::new(i as f32 * slice_width, trace_y(m, center_y, direction, scale)))
        .collect()
}

/// Everything one frame draws, in surface coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumGeometry {
    pub center_y: f32,
    pub slice_width: f32,
    pub low: Vec<Point>,
    pub high: Vec<Point>,
    pub divider: [Point; 2],
    pub glow: Vec<Point>,
}

pub fn layout(high: &[u8], low: &[u8], width: u32, height: u32) -> Result<SpectrumGeometry, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::EmptySurface { width, height });
    }
    if high.len() != low.len() {
        return Err(RenderError::MismatchedBins {
            high: high.len(),
            low: low.len(),
        });
    }
    if high.len() < 2 {
        return Err(RenderError::TooFewBins(high.len()));
    }

    let width = width as f32;
    let center_y = height as f32 / 2.0;
    let slice_width = width / (high.len() - 1) as f32;

    Ok(SpectrumGeometry {
        center_y,
        slice_width,
        low: trace_points(low, slice_width, center_y, TraceDirection::Down, 1.0),
        high: trace_points(high, slice_width, center_y, TraceDirection::Up, 1.0),
        divider: [Point::new(0.0, center_y), Point::new(width, center_y)],
        glow: trace_points(high, slice_width, center_y, TraceDirection::Up, GLOW_SCALE),
    })
}

/// Paints one frame from the two snapshots and returns what was drawn.
pub fn paint_dual_spectrum(
    surface: &mut Surface,
    high: &[u8],
    low: &[u8],
) -> Result<SpectrumGeometry, RenderError> {
    let geometry = layout(high, low, surface.width(), surface.height())?;

    surface.fill(Rgba::BLACK);
    surface.stroke_polyline(&geometry.low, TRACE_STYLE);
    surface.stroke_polyline(&geometry.high, TRACE_STYLE);
    let [from, to] = geometry.divider;
    surface.stroke_line(from, to, DIVIDER_STYLE);
    surface.stroke_polyline(&geometry.glow, GLOW_STYLE);

    Ok(geometry)
}
