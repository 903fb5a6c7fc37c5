//! Cooperative frame loop.
//!
//! Each painted frame asks for exactly one follow-up frame, and only while
//! the loop is running. `stop()` drops the outstanding request, so the next
//! tick of the frame clock finds nothing to do. A frame that is already
//! being painted always completes.

use crate::audio::analyser::{Analyser, FrequencySnapshot};

use super::spectrum::{paint_dual_spectrum, SpectrumGeometry};
use super::surface::Surface;
use super::RenderError;

/// Ticket for the next scheduled frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRequest(u64);

#[derive(Default)]
pub struct RenderLoop {
    running: bool,
    pending: Option<FrameRequest>,
    next_request: u64,
    frames_painted: u64,
    high: FrequencySnapshot,
    low: FrequencySnapshot,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn frames_painted(&self) -> u64 {
        self.frames_painted
    }

    /// Byte snapshots used by the last painted frame, high first.
    pub fn last_snapshots(&self) -> (&[u8], &[u8]) {
        (&self.high, &self.low)
    }

    /// Marks the loop running and schedules the first frame.
    pub fn start(&mut self) {
        self.running = true;
        self.schedule();
    }

    /// Cancels the pending frame. Stopping a stopped loop does nothing.
    pub fn stop(&mut self) {
        if self.running || self.pending.is_some() {
            log::debug!("Render loop stopped after {} frames", self.frames_painted);
        }
        self.running = false;
        self.pending = None;
    }

    fn schedule(&mut self) {
        if self.pending.is_none() {
            self.next_request += 1;
            self.pending = Some(FrameRequest(self.next_request));
        }
    }

    /// Frame clock callback. Runs the pending frame, if any; returns whether
    /// a frame was painted. A surface with no area skips painting but keeps
    /// the chain alive, so the loop picks up again after a resize.
    pub fn on_frame(
        &mut self,
        high: &mut Analyser,
        low: &mut Analyser,
        surface: &mut Surface,
    ) -> Result<bool, RenderError> {
        let Some(FrameRequest(request)) = self.pending.take() else {
            return Ok(false);
        };
        if surface.is_empty() {
            log::trace!("Frame request #{} skipped on an empty surface", request);
            if self.running {
                self.schedule();
            }
            return Ok(false);
        }
        if let Err(err) = self.render_frame(high, low, surface) {
            if self.running {
                self.schedule();
            }
            return Err(err);
        }
        Ok(true)
    }

    /// Pulls both snapshots, paints them and reschedules while running.
    pub fn render_frame(
        &mut self,
        high: &mut Analyser,
        low: &mut Analyser,
        surface: &mut Surface,
    ) -> Result<SpectrumGeometry, RenderError> {
        self.high.resize(high.frequency_bin_count(), 0);
        self.low.resize(low.frequency_bin_count(), 0);
        high.get_byte_frequency_data(&mut self.high);
        low.get_byte_frequency_data(&mut self.low);

        let geometry = paint_dual_spectrum(surface, &self.high, &self.low)?;
        self.frames_painted += 1;
        log::trace!(
            "Painted frame {} (center {:.1}, slice {:.2})",
            self.frames_painted,
            geometry.center_y,
            geometry.slice_width
        );

        if self.running {
            self.schedule();
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysers() -> (Analyser, Analyser) {
        (
            Analyser::new(256, 0.85).unwrap(),
            Analyser::new(256, 0.85).unwrap(),
        )
    }

    #[test]
    fn runs_one_frame_per_tick_while_running() {
        let (mut high, mut low) = analysers();
        let mut surface = Surface::new(64, 32);
        let mut frames = RenderLoop::new();

        assert!(!frames.on_frame(&mut high, &mut low, &mut surface).unwrap());
        frames.start();
        frames.start();
        for _ in 0..5 {
            assert!(frames.on_frame(&mut high, &mut low, &mut surface).unwrap());
            assert!(frames.pending().is_some());
        }
        assert_eq!(frames.frames_painted(), 5);
    }

    #[test]
    fn stop_cancels_next_frame() {
        let (mut high, mut low) = analysers();
        let mut surface = Surface::new(64, 32);
        let mut frames = RenderLoop::new();

        frames.start();
        frames.on_frame(&mut high, &mut low, &mut surface).unwrap();
        frames.stop();
        assert!(frames.pending().is_none());
        assert!(!frames.on_frame(&mut high, &mut low, &mut surface).unwrap());
        assert_eq!(frames.frames_painted(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut frames = RenderLoop::new();
        frames.stop();
        frames.stop();
        assert!(!frames.is_running());
        assert!(frames.pending().is_none());
    }

    #[test]
    fn frame_in_flight_completes_without_rescheduling() {
        let (mut high, mut low) = analysers();
        let mut surface = Surface::new(64, 32);
        let mut frames = RenderLoop::new();

        frames.start();
        frames.stop();
        // A frame dispatched before the stop still paints but asks for no successor
        frames.render_frame(&mut high, &mut low, &mut surface).unwrap();
        assert_eq!(frames.frames_painted(), 1);
        assert!(frames.pending().is_none());
    }

    #[test]
    fn exposes_the_painted_snapshots() {
        let (mut high, mut low) = analysers();
        let mut surface = Surface::new(64, 32);
        let mut frames = RenderLoop::new();
        frames.start();
        frames.on_frame(&mut high, &mut low, &mut surface).unwrap();

        let (h, l) = frames.last_snapshots();
        assert_eq!(h.len(), 128);
        assert_eq!(l.len(), 128);
    }

    #[test]
    fn empty_surface_skips_painting_but_keeps_running() {
        let (mut high, mut low) = analysers();
        let mut surface = Surface::new(0, 0);
        let mut frames = RenderLoop::new();
        frames.start();

        assert_eq!(frames.on_frame(&mut high, &mut low, &mut surface), Ok(false));
        assert!(frames.is_running());
        assert!(frames.pending().is_some());
        assert_eq!(frames.frames_painted(), 0);

        let mut surface = Surface::new(64, 32);
        assert_eq!(frames.on_frame(&mut high, &mut low, &mut surface), Ok(true));
        assert_eq!(frames.frames_painted(), 1);
    }

    #[test]
    fn painting_an_empty_surface_directly_is_an_error() {
        let (mut high, mut low) = analysers();
        let mut surface = Surface::new(0, 0);
        let mut frames = RenderLoop::new();
        assert_eq!(
            frames.render_frame(&mut high, &mut low, &mut surface).map(|_| ()),
            Err(RenderError::EmptySurface { width: 0, height: 0 })
        );
    }

    #[test]
    fn failed_frame_leaves_a_request_while_running() {
        let mut high = Analyser::new(256, 0.85).unwrap();
        let mut low = Analyser::new(512, 0.85).unwrap();
        let mut surface = Surface::new(64, 32);
        let mut frames = RenderLoop::new();
        frames.start();

        assert_eq!(
            frames.on_frame(&mut high, &mut low, &mut surface),
            Err(RenderError::MismatchedBins { high: 128, low: 256 })
        );
        assert!(frames.is_running());
        assert!(frames.pending().is_some());
    }
}
