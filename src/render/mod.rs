pub mod render_loop;
pub mod spectrum;
pub mod surface;
pub mod text;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("surface has no area ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },
    #[error("branch bin counts differ (high {high}, low {low})")]
    MismatchedBins { high: usize, low: usize },
    #[error("at least 2 bins are needed to span the surface, got {0}")]
    TooFewBins(usize),
}
