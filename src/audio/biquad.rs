//! Second-order IIR filters with Web Audio `BiquadFilterNode` coefficients.

use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    HighPass,
    LowPass,
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterKind::HighPass => write!(f, "highpass"),
            FilterKind::LowPass => write!(f, "lowpass"),
        }
    }
}

/// Transposed direct form II biquad.
#[derive(Clone, Debug)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// `q` is in dB for both kinds, matching the Web Audio resonance model.
    /// The cutoff is clamped to `[0, nyquist]`.
    pub fn new(kind: FilterKind, cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        let nyquist = sample_rate / 2.0;
        let f0 = (cutoff_hz / nyquist).clamp(0.0, 1.0);

        let (b, a) = if f0 >= 1.0 {
            match kind {
                FilterKind::LowPass => ([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
                FilterKind::HighPass => ([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            }
        } else if f0 <= 0.0 {
            match kind {
                FilterKind::LowPass => ([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
                FilterKind::HighPass => ([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            }
        } else {
            let w0 = PI * f0;
            let cos_w0 = w0.cos();
            let alpha = w0.sin() / (2.0 * 10f64.powf(q / 20.0));
            let a = [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha];
            let b = match kind {
                FilterKind::LowPass => {
                    let k = 1.0 - cos_w0;
                    [k / 2.0, k, k / 2.0]
                }
                FilterKind::HighPass => {
                    let k = 1.0 + cos_w0;
                    [k / 2.0, -k, k / 2.0]
                }
            };
            (b, a)
        };

        Self::from_coefficients(b, a)
    }

    fn from_coefficients(b: [f64; 3], a: [f64; 3]) -> Self {
        debug_assert!(a[0] != 0.0, "digital biquad a0 must be non-zero");
        let inv_a0 = 1.0 / a[0];

        Self {
            b0: b[0] * inv_a0,
            b1: b[1] * inv_a0,
            b2: b[2] * inv_a0,
            a1: a[1] * inv_a0,
            a2: a[2] * inv_a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let x = sample as f64;
        let y = x * self.b0 + self.z1;
        self.z1 = x * self.b1 + self.z2 - self.a1 * y;
        self.z2 = x * self.b2 - self.a2 * y;
        y as f32
    }

    /// Filters `input` into `output`; both must have the same length.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            *out = self.process(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn sine_wave(freq: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / SR).sin())
            .collect()
    }

    fn steady_state_peak(filter: &mut Biquad, input: &[f32]) -> f32 {
        let mut out = vec![0.0; input.len()];
        filter.process_block(input, &mut out);
        out[input.len() / 2..]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn lowpass_passes_bass_and_rejects_treble() {
        let lowpass = || Biquad::new(FilterKind::LowPass, 2000.0, 0.7, SR as f64);
        let low = steady_state_peak(&mut lowpass(), &sine_wave(100.0, 9600));
        let high = steady_state_peak(&mut lowpass(), &sine_wave(12_000.0, 9600));

        assert!((low - 1.0).abs() < 0.05, "low = {low}");
        assert!(high < 0.1, "high = {high}");
    }

    #[test]
    fn highpass_passes_treble_and_rejects_bass() {
        let highpass = || Biquad::new(FilterKind::HighPass, 2000.0, 0.7, SR as f64);
        let low = steady_state_peak(&mut highpass(), &sine_wave(100.0, 9600));
        let high = steady_state_peak(&mut highpass(), &sine_wave(12_000.0, 9600));

        assert!(low < 0.05, "low = {low}");
        assert!((high - 1.0).abs() < 0.1, "high = {high}");
    }

    #[test]
    fn cutoff_above_nyquist_degenerates() {
        let mut lp = Biquad::new(FilterKind::LowPass, 96_000.0, 0.7, SR as f64);
        assert_eq!(lp.process(0.5), 0.5);

        let mut hp = Biquad::new(FilterKind::HighPass, 96_000.0, 0.7, SR as f64);
        assert_eq!(hp.process(0.5), 0.0);
    }
}
