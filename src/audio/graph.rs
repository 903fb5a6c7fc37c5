//! Routing graph: media element → {high-pass → analyser, low-pass →
//! analyser, destination}.
//!
//! The graph is built once per element. Binding an element to a context is a
//! one-time operation, so a second [`build_graph`] on the same element fails
//! and leaves the first graph untouched.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::analyser::{Analyser, AnalyserError};
use super::biquad::{Biquad, FilterKind};
use super::decode::AudioData;
use super::sink::Destination;

pub const MIN_SAMPLE_RATE: u32 = 3_000;
pub const MAX_SAMPLE_RATE: u32 = 768_000;

pub const DEFAULT_CUTOFF_HZ: f32 = 2000.0;
pub const DEFAULT_Q: f32 = 0.7;
pub const DEFAULT_FFT_SIZE: usize = 256;
pub const DEFAULT_SMOOTHING: f32 = 0.85;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error, PartialEq)]
pub enum GraphConstructionError {
    #[error("audio context is closed")]
    ContextClosed,
    #[error("sample rate {0} Hz is outside [3000, 768000]")]
    UnsupportedSampleRate(u32),
    #[error("media element is already bound to audio context #{0}")]
    ElementAlreadyBound(u64),
    #[error("{kind} cutoff {cutoff_hz} Hz must be positive and finite")]
    InvalidCutoff { kind: FilterKind, cutoff_hz: f32 },
    #[error("branch fft sizes differ (high {high}, low {low})")]
    MismatchedFftSize { high: usize, low: usize },
    #[error("{kind} analyser: {source}")]
    Analyser {
        kind: FilterKind,
        #[source]
        source: AnalyserError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Processing context shared by every node of one graph.
#[derive(Debug)]
pub struct AudioContext {
    id: u64,
    sample_rate: u32,
    state: ContextState,
}

impl AudioContext {
    /// New contexts start suspended, the way a page context does before a
    /// user gesture resumes it.
    pub fn new(sample_rate: u32) -> Result<Self, GraphConstructionError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(GraphConstructionError::UnsupportedSampleRate(sample_rate));
        }
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        log::info!("Audio context #{} opened at {}Hz", id, sample_rate);
        Ok(Self {
            id,
            sample_rate,
            state: ContextState::Suspended,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Returns true when the context actually changed state.
    pub fn resume(&mut self) -> bool {
        if self.state == ContextState::Suspended {
            self.state = ContextState::Running;
            log::debug!("Audio context #{} resumed", self.id);
            true
        } else {
            false
        }
    }

    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state != ContextState::Closed {
            self.state = ContextState::Closed;
            log::info!("Audio context #{} closed", self.id);
        }
    }
}

/// Playback element: owns the current source and the play cursor.
#[derive(Debug)]
pub struct MediaElement {
    source: Option<AudioData>,
    cursor: usize,
    volume: f32,
    paused: bool,
    ended: bool,
    bound_context: Option<u64>,
}

impl Default for MediaElement {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement {
    pub fn new() -> Self {
        Self {
            source: None,
            cursor: 0,
            volume: 1.0,
            paused: true,
            ended: false,
            bound_context: None,
        }
    }

    /// Replaces the current source; the old one is dropped.
    pub fn load(&mut self, source: AudioData) {
        self.source = Some(source);
        self.cursor = 0;
        self.paused = true;
        self.ended = false;
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn channels(&self) -> usize {
        self.source.as_ref().map_or(1, |s| s.channels)
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.source.as_ref().map(|s| s.sample_rate)
    }

    pub fn duration(&self) -> f64 {
        self.source.as_ref().map_or(0.0, AudioData::duration)
    }

    pub fn current_time(&self) -> f64 {
        match &self.source {
            Some(s) if s.sample_rate > 0 => self.cursor as f64 / s.sample_rate as f64,
            _ => 0.0,
        }
    }

    /// Moves the cursor, clamped to the media bounds; returns the new time.
    /// Landing on the end pauses the element as if it had played out.
    pub fn seek(&mut self, seconds: f64) -> f64 {
        if let Some(source) = &self.source {
            let target = (seconds.max(0.0) * source.sample_rate as f64).round() as usize;
            self.cursor = target.min(source.frames());
            self.ended = self.cursor >= source.frames();
            if self.ended {
                self.paused = true;
            }
        }
        self.current_time()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    #[cfg(test)]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Starts playback; restarts from the top after the media ended.
    pub fn play(&mut self) {
        if self.ended {
            self.cursor = 0;
            self.ended = false;
        }
        self.paused = false;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    #[cfg(test)]
    pub fn bound_context(&self) -> Option<u64> {
        self.bound_context
    }

    /// Fills `out` with `frames` interleaved frames. A paused, ended or empty
    /// element emits silence. Returns how many frames came from the media.
    pub fn read_block(&mut self, frames: usize, out: &mut Vec<f32>) -> usize {
        let channels = self.channels();
        out.clear();
        out.resize(frames * channels, 0.0);

        let Some(source) = &self.source else {
            return 0;
        };
        if self.paused || self.ended {
            return 0;
        }

        let available = source.frames().saturating_sub(self.cursor);
        let take = frames.min(available);
        let start = self.cursor * channels;
        out[..take * channels].copy_from_slice(&source.samples[start..start + take * channels]);

        self.cursor += take;
        if self.cursor >= source.frames() {
            self.ended = true;
            self.paused = true;
        }
        take
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchConfig {
    pub kind: FilterKind,
    pub cutoff_hz: f32,
    pub q: f32,
    pub fft_size: usize,
    pub smoothing: f32,
}

impl BranchConfig {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            q: DEFAULT_Q,
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub high: BranchConfig,
    pub low: BranchConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            high: BranchConfig::new(FilterKind::HighPass),
            low: BranchConfig::new(FilterKind::LowPass),
        }
    }
}

impl GraphConfig {
    /// Symmetric high/low split around a single crossover.
    pub fn split(cutoff_hz: f32, q: f32, fft_size: usize, smoothing: f32) -> Self {
        let branch = |kind| BranchConfig {
            kind,
            cutoff_hz,
            q,
            fft_size,
            smoothing,
        };
        Self {
            high: branch(FilterKind::HighPass),
            low: branch(FilterKind::LowPass),
        }
    }
}

/// One filter feeding one analyser.
pub struct Branch {
    config: BranchConfig,
    filter: Biquad,
    analyser: Analyser,
}

impl Branch {
    fn new(config: &BranchConfig, sample_rate: u32) -> Result<Self, GraphConstructionError> {
        if !config.cutoff_hz.is_finite() || config.cutoff_hz <= 0.0 {
            return Err(GraphConstructionError::InvalidCutoff {
                kind: config.kind,
                cutoff_hz: config.cutoff_hz,
            });
        }
        let analyser = Analyser::new(config.fft_size, config.smoothing).map_err(|source| {
            GraphConstructionError::Analyser {
                kind: config.kind,
                source,
            }
        })?;
        let filter = Biquad::new(
            config.kind,
            config.cutoff_hz as f64,
            config.q as f64,
            sample_rate as f64,
        );
        Ok(Self {
            config: config.clone(),
            filter,
            analyser,
        })
    }

    fn process(&mut self, mono: &[f32], scratch: &mut Vec<f32>) {
        scratch.clear();
        scratch.resize(mono.len(), 0.0);
        self.filter.process_block(mono, scratch);
        self.analyser.push(scratch);
    }
}

/// The constructed graph. Holds both analysis branches and the id of the
/// context the element was bound to.
pub struct GraphHandle {
    context_id: u64,
    high: Branch,
    low: Branch,
    mono: Vec<f32>,
    scratch: Vec<f32>,
}

impl std::fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphHandle")
            .field("context_id", &self.context_id)
            .field("high", &self.high.config)
            .field("low", &self.low.config)
            .finish()
    }
}

/// Binds `element` to `context` and wires both analysis branches plus the
/// direct output path.
pub fn build_graph(
    context: &mut AudioContext,
    element: &mut MediaElement,
    config: &GraphConfig,
) -> Result<GraphHandle, GraphConstructionError> {
    if context.state() == ContextState::Closed {
        return Err(GraphConstructionError::ContextClosed);
    }
    if let Some(bound) = element.bound_context {
        return Err(GraphConstructionError::ElementAlreadyBound(bound));
    }
    if config.high.fft_size != config.low.fft_size {
        return Err(GraphConstructionError::MismatchedFftSize {
            high: config.high.fft_size,
            low: config.low.fft_size,
        });
    }

    let high = Branch::new(&config.high, context.sample_rate())?;
    let low = Branch::new(&config.low, context.sample_rate())?;

    // Only bind once every node exists, so a failed build leaves the
    // element free for another attempt.
    element.bound_context = Some(context.id());

    log::info!(
        "Audio graph built on context #{}: {} {}Hz / {} {}Hz, fft {}",
        context.id(),
        config.high.kind,
        config.high.cutoff_hz,
        config.low.kind,
        config.low.cutoff_hz,
        config.high.fft_size
    );

    Ok(GraphHandle {
        context_id: context.id(),
        high,
        low,
        mono: Vec::new(),
        scratch: Vec::new(),
    })
}

impl GraphHandle {
    #[cfg(test)]
    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    #[cfg(test)]
    pub fn bin_count(&self) -> usize {
        self.high.analyser.frequency_bin_count()
    }

    #[cfg(test)]
    pub fn high(&mut self) -> &mut Analyser {
        &mut self.high.analyser
    }

    #[cfg(test)]
    pub fn low(&mut self) -> &mut Analyser {
        &mut self.low.analyser
    }

    /// Byte waveforms of both branches, high first, each `fft_size` long.
    pub fn time_domain(&self, high: &mut Vec<u8>, low: &mut Vec<u8>) {
        high.resize(self.high.analyser.fft_size(), 0);
        low.resize(self.low.analyser.fft_size(), 0);
        self.high.analyser.get_byte_time_domain_data(high);
        self.low.analyser.get_byte_time_domain_data(low);
    }

    /// Both analysers at once, high first.
    pub fn analysers(&mut self) -> (&mut Analyser, &mut Analyser) {
        (&mut self.high.analyser, &mut self.low.analyser)
    }

    /// Pushes one interleaved block through the graph: the mono downmix goes
    /// to both analysis branches, the untouched block goes to `destination`
    /// with `gain` applied.
    pub fn process(
        &mut self,
        block: &[f32],
        channels: usize,
        gain: f32,
        destination: &mut Destination,
    ) {
        let channels = channels.max(1);
        self.mono.clear();
        self.mono.extend(
            block
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );

        self.high.process(&self.mono, &mut self.scratch);
        self.low.process(&self.mono, &mut self.scratch);

        destination.write(block, channels, gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48_000;

    fn tone(freq: f32, seconds: f32) -> AudioData {
        let frames = (SR as f32 * seconds) as usize;
        let samples = (0..frames)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / SR as f32).sin() * 0.8)
            .collect();
        AudioData {
            samples,
            channels: 1,
            sample_rate: SR,
            file_name: "tone.wav".into(),
        }
    }

    fn energy(snapshot: &[u8]) -> u32 {
        snapshot.iter().map(|&b| b as u32).sum()
    }

    fn run(graph: &mut GraphHandle, element: &mut MediaElement, dest: &mut Destination) {
        let mut block = Vec::new();
        while !element.has_ended() {
            element.read_block(128, &mut block);
            graph.process(&block, element.channels(), element.volume(), dest);
        }
    }

    #[test]
    fn both_branches_report_equal_length_snapshots() {
        let mut size = 2;
        while size <= 4096 {
            let mut ctx = AudioContext::new(SR).unwrap();
            let mut element = MediaElement::new();
            let config = GraphConfig::split(2000.0, 0.7, size, 0.85);
            let mut graph = build_graph(&mut ctx, &mut element, &config).unwrap();
            assert_eq!(graph.bin_count(), size / 2);
            let high = graph.high().snapshot();
            let low = graph.low().snapshot();
            assert_eq!(high.len(), low.len());
            size *= 2;
        }
    }

    #[test]
    fn second_build_on_same_element_fails_and_first_survives() {
        let mut ctx = AudioContext::new(SR).unwrap();
        let mut element = MediaElement::new();
        element.load(tone(5000.0, 0.1));

        let mut first = build_graph(&mut ctx, &mut element, &GraphConfig::default()).unwrap();
        let err = build_graph(&mut ctx, &mut element, &GraphConfig::default()).unwrap_err();
        assert_eq!(err, GraphConstructionError::ElementAlreadyBound(ctx.id()));

        let mut other_ctx = AudioContext::new(SR).unwrap();
        let err = build_graph(&mut other_ctx, &mut element, &GraphConfig::default()).unwrap_err();
        assert!(matches!(err, GraphConstructionError::ElementAlreadyBound(_)));

        let mut dest = Destination::new(1, SR);
        element.play();
        run(&mut first, &mut element, &mut dest);
        assert!(energy(&first.high().snapshot()) > 0);
    }

    #[test]
    fn time_domain_follows_each_branch_filter() {
        let mut ctx = AudioContext::new(SR).unwrap();
        let mut element = MediaElement::new();
        element.load(tone(200.0, 0.5));
        let mut graph = build_graph(&mut ctx, &mut element, &GraphConfig::default()).unwrap();

        let mut dest = Destination::new(1, SR);
        let mut block = Vec::new();
        element.play();
        // Stop short of the end so the window holds steady-state tone only
        for _ in 0..150 {
            element.read_block(128, &mut block);
            graph.process(&block, 1, 1.0, &mut dest);
        }
        assert!(!element.has_ended());

        let (mut high, mut low) = (Vec::new(), Vec::new());
        graph.time_domain(&mut high, &mut low);
        assert_eq!((high.len(), low.len()), (256, 256));
        assert!(high.iter().all(|&b| (120..=136).contains(&b)), "bass leaks into high branch");
        assert!(*low.iter().max().unwrap() > 200);
        assert!(*low.iter().min().unwrap() < 56);
    }

    #[test]
    fn failed_build_leaves_element_unbound() {
        let mut ctx = AudioContext::new(SR).unwrap();
        let mut element = MediaElement::new();
        let bad = GraphConfig::split(2000.0, 0.7, 300, 0.85);
        let err = build_graph(&mut ctx, &mut element, &bad).unwrap_err();
        assert!(matches!(
            err,
            GraphConstructionError::Analyser {
                kind: FilterKind::HighPass,
                source: AnalyserError::InvalidFftSize(300)
            }
        ));
        assert_eq!(element.bound_context(), None);
        assert!(build_graph(&mut ctx, &mut element, &GraphConfig::default()).is_ok());
    }

    #[test]
    fn rejects_mismatched_sizes_and_closed_context() {
        let mut ctx = AudioContext::new(SR).unwrap();
        let mut element = MediaElement::new();
        let mut config = GraphConfig::default();
        config.low.fft_size = 512;
        assert_eq!(
            build_graph(&mut ctx, &mut element, &config).unwrap_err(),
            GraphConstructionError::MismatchedFftSize { high: 256, low: 512 }
        );

        ctx.close();
        ctx.close();
        assert_eq!(
            build_graph(&mut ctx, &mut element, &GraphConfig::default()).unwrap_err(),
            GraphConstructionError::ContextClosed
        );
    }

    #[test]
    fn rejects_bad_context_and_cutoff() {
        assert_eq!(
            AudioContext::new(100).unwrap_err(),
            GraphConstructionError::UnsupportedSampleRate(100)
        );

        let mut ctx = AudioContext::new(SR).unwrap();
        let mut element = MediaElement::new();
        let config = GraphConfig::split(0.0, 0.7, 256, 0.85);
        assert!(matches!(
            build_graph(&mut ctx, &mut element, &config).unwrap_err(),
            GraphConstructionError::InvalidCutoff { .. }
        ));
    }

    #[test]
    fn bands_split_at_crossover() {
        let mut ctx = AudioContext::new(SR).unwrap();
        let mut element = MediaElement::new();
        let mut graph = build_graph(&mut ctx, &mut element, &GraphConfig::default()).unwrap();
        let mut dest = Destination::new(1, SR);

        element.load(tone(200.0, 0.2));
        element.play();
        run(&mut graph, &mut element, &mut dest);
        let (high, low) = graph.analysers();
        // Let the smoothing settle on the steady-state window
        for _ in 0..40 {
            high.snapshot();
            low.snapshot();
        }
        assert!(energy(&low.snapshot()) > energy(&high.snapshot()));

        element.load(tone(8000.0, 0.2));
        element.play();
        run(&mut graph, &mut element, &mut dest);
        let (high, low) = graph.analysers();
        for _ in 0..40 {
            high.snapshot();
            low.snapshot();
        }
        assert!(energy(&high.snapshot()) > energy(&low.snapshot()));
    }

    #[test]
    fn destination_gets_unfiltered_audio_with_volume() {
        let mut ctx = AudioContext::new(SR).unwrap();
        let mut element = MediaElement::new();
        let mut graph = build_graph(&mut ctx, &mut element, &GraphConfig::default()).unwrap();
        let source = tone(200.0, 0.01);
        let expected: Vec<f32> = source.samples.iter().map(|s| s * 0.5).collect();

        element.load(source);
        element.set_volume(0.5);
        element.play();
        let mut dest = Destination::new(1, SR);
        let mut block = Vec::new();
        let read = element.read_block(480, &mut block);
        graph.process(&block, 1, element.volume(), &mut dest);

        assert_eq!(read, 480);
        assert_eq!(dest.samples(), expected.as_slice());
    }

    #[test]
    fn element_read_block_pads_and_ends() {
        let mut element = MediaElement::new();
        element.load(tone(440.0, 0.001)); // 48 frames
        let mut block = Vec::new();

        assert_eq!(element.read_block(32, &mut block), 0, "paused element is silent");
        element.play();
        assert_eq!(element.read_block(32, &mut block), 32);
        assert_eq!(element.read_block(32, &mut block), 16);
        assert_eq!(block.len(), 32);
        assert!(block[16..].iter().all(|&s| s == 0.0));
        assert!(element.has_ended());
        assert!(element.is_paused());

        element.play();
        assert_eq!(element.current_time(), 0.0);
        assert_eq!(element.seek(10.0), element.duration());
        assert!(element.has_ended());
        assert!(element.is_paused(), "seeking onto the end pauses like playing out");
    }
}
