//! Frequency-domain analyser modelled on the Web Audio `AnalyserNode`.
//!
//! The analyser keeps the most recent `fft_size` mono samples. Each call to
//! [`Analyser::get_byte_frequency_data`] windows them (Blackman), runs a
//! forward FFT, blends the magnitudes with the previous call's result using
//! the smoothing time constant and maps the decibel value onto `0..=255`.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use thiserror::Error;

pub const MIN_FFT_SIZE: usize = 2;
pub const MAX_FFT_SIZE: usize = 32_768;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

const BLACKMAN_ALPHA: f32 = 0.16;

/// One frame's worth of byte magnitudes, one per bin.
pub type FrequencySnapshot = Vec<u8>;

#[derive(Debug, Error, PartialEq)]
pub enum AnalyserError {
    #[error("fft size {0} must be a power of two in [2, 32768]")]
    InvalidFftSize(usize),
    #[error("smoothing time constant {0} must be in [0, 1)")]
    InvalidSmoothing(f32),
}

pub fn validate_fft_size(fft_size: usize) -> Result<(), AnalyserError> {
    if fft_size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
        Ok(())
    } else {
        Err(AnalyserError::InvalidFftSize(fft_size))
    }
}

pub fn validate_smoothing(smoothing: f32) -> Result<(), AnalyserError> {
    if (0.0..1.0).contains(&smoothing) {
        Ok(())
    } else {
        Err(AnalyserError::InvalidSmoothing(smoothing))
    }
}

pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Ring buffer of the latest `fft_size` input samples.
    history: Vec<f32>,
    write_pos: usize,
    /// Smoothed linear magnitudes from the previous frequency query.
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl Analyser {
    pub fn new(fft_size: usize, smoothing: f32) -> Result<Self, AnalyserError> {
        validate_fft_size(fft_size)?;
        validate_smoothing(smoothing)?;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft_size,
            smoothing,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
            fft,
            window: blackman_window(fft_size),
            history: vec![0.0; fft_size],
            write_pos: 0,
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Appends mono samples to the analysis window.
    pub fn push(&mut self, samples: &[f32]) {
        // Only the tail can survive in the window
        let tail = &samples[samples.len().saturating_sub(self.fft_size)..];
        for &s in tail {
            self.history[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Copies the most recent `fft_size` samples, oldest first, into `out`.
    fn ordered_history(&self, out: &mut [f32]) {
        let (newer, older) = self.history.split_at(self.write_pos);
        out[..older.len()].copy_from_slice(older);
        out[older.len()..].copy_from_slice(newer);
    }

    fn update_smoothed(&mut self) {
        let mut ordered = vec![0.0f32; self.fft_size];
        self.ordered_history(&mut ordered);

        for (dst, (&s, &w)) in self.scratch.iter_mut().zip(ordered.iter().zip(&self.window)) {
            *dst = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (prev, bin) in self.smoothed.iter_mut().zip(&self.scratch) {
            let magnitude = bin.norm() * scale;
            let next = tau * *prev + (1.0 - tau) * magnitude;
            *prev = if next.is_finite() { next } else { 0.0 };
        }
    }

    /// Decibel magnitudes, one per bin; `out` is truncated to the bin count.
    #[cfg(test)]
    pub fn get_float_frequency_data(&mut self, out: &mut [f32]) {
        self.update_smoothed();
        for (dst, &mag) in out.iter_mut().zip(&self.smoothed) {
            *dst = linear_to_decibels(mag);
        }
    }

    pub fn get_byte_frequency_data(&mut self, out: &mut [u8]) {
        self.update_smoothed();
        let range = self.max_decibels - self.min_decibels;
        for (dst, &mag) in out.iter_mut().zip(&self.smoothed) {
            let db = linear_to_decibels(mag);
            let scaled = (255.0 / range) * (db - self.min_decibels);
            *dst = scaled.floor().clamp(0.0, 255.0) as u8;
        }
    }

    /// Byte waveform: `128 * (1 + sample)`, clamped.
    pub fn get_byte_time_domain_data(&self, out: &mut [u8]) {
        let mut ordered = vec![0.0f32; self.fft_size];
        self.ordered_history(&mut ordered);
        for (dst, &s) in out.iter_mut().zip(&ordered) {
            *dst = (128.0 * (s + 1.0)).floor().clamp(0.0, 255.0) as u8;
        }
    }

    /// Fresh byte snapshot sized to the bin count.
    #[cfg(test)]
    pub fn snapshot(&mut self) -> FrequencySnapshot {
        let mut data = vec![0u8; self.frequency_bin_count()];
        self.get_byte_frequency_data(&mut data);
        data
    }
}

fn linear_to_decibels(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let a0 = 0.5 * (1.0 - BLACKMAN_ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * BLACKMAN_ALPHA;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / n;
            a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
        })
        .collect()
}
