//! The player ties the media element, the audio graph, the render loop and
//! the drawing surface together. All input arrives as [`PlayerEvent`]s;
//! media callbacks raised while handling one event are queued and handled
//! before `dispatch` returns.

pub mod state;

use std::collections::VecDeque;

use thiserror::Error;

use crate::audio::decode::AudioData;
use crate::audio::graph::{build_graph, AudioContext, GraphConfig, GraphHandle, MediaElement};
use crate::audio::sink::Destination;
use crate::render::render_loop::RenderLoop;
use crate::render::surface::{LayoutSize, Surface};

use state::{PlaybackState, PlayerEvent, PlayerState};

#[derive(Debug, Error, PartialEq)]
pub enum PlayerError {
    #[error("media sample rate {media} Hz does not match the output's {output} Hz")]
    SampleRateChanged { media: u32, output: u32 },
}

pub struct Player {
    graph_config: GraphConfig,
    element: MediaElement,
    context: Option<AudioContext>,
    graph: Option<GraphHandle>,
    graph_attempted: bool,
    output: Option<Destination>,
    render_loop: RenderLoop,
    surface: Surface,
    playback: PlaybackState,
    state: PlayerState,
    queue: VecDeque<PlayerEvent>,
    block: Vec<f32>,
}

impl Player {
    pub fn new(graph_config: GraphConfig, container: LayoutSize) -> Self {
        let playback = PlaybackState::default();
        let mut element = MediaElement::new();
        element.set_volume(playback.volume);

        let mut surface = Surface::new(0, 0);
        surface.fit_to(container);

        Self {
            graph_config,
            element,
            context: None,
            graph: None,
            graph_attempted: false,
            output: None,
            render_loop: RenderLoop::new(),
            surface,
            playback,
            state: PlayerState::Idle,
            queue: VecDeque::new(),
            block: Vec::new(),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[cfg(test)]
    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn graph(&self) -> Option<&GraphHandle> {
        self.graph.as_ref()
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    /// Audible output recorded so far.
    pub fn output(&self) -> Option<&Destination> {
        self.output.as_ref()
    }

    pub fn visualization_available(&self) -> bool {
        self.graph.is_some()
    }

    /// Handles `event` plus every media callback it triggers.
    pub fn dispatch(&mut self, event: PlayerEvent) -> Result<PlayerState, PlayerError> {
        self.queue.push_back(event);
        self.drain()
    }

    fn drain(&mut self) -> Result<PlayerState, PlayerError> {
        while let Some(event) = self.queue.pop_front() {
            if let Err(err) = self.handle(event) {
                self.queue.clear();
                return Err(err);
            }
        }
        Ok(self.state)
    }

    fn handle(&mut self, event: PlayerEvent) -> Result<(), PlayerError> {
        log::trace!("{:?} <- {}", self.state, event_name(&event));
        match event {
            PlayerEvent::FileSelected(data) => self.on_file_selected(data)?,
            PlayerEvent::Play => self.on_play(),
            PlayerEvent::Pause => self.on_pause(),
            PlayerEvent::TogglePlay => {
                if self.playback.is_playing {
                    self.on_pause();
                } else {
                    self.on_play();
                }
            }
            PlayerEvent::Seek(seconds) => self.on_seek(seconds),
            PlayerEvent::VolumeChange(volume) => {
                self.element.set_volume(volume);
                self.playback.volume = self.element.volume();
            }
            PlayerEvent::Resize(container) => {
                self.surface.fit_to(container);
            }
            PlayerEvent::LoadedMetadata => {
                self.playback.duration = self.element.duration();
            }
            PlayerEvent::TimeUpdate => {
                self.playback.current_time = self.element.current_time();
            }
            PlayerEvent::Ended => self.on_ended(),
            PlayerEvent::Frame => self.on_frame(),
        }
        Ok(())
    }

    pub fn on_file_selected(&mut self, data: AudioData) -> Result<(), PlayerError> {
        if let Some(output) = &self.output {
            if output.sample_rate() != data.sample_rate {
                return Err(PlayerError::SampleRateChanged {
                    media: data.sample_rate,
                    output: output.sample_rate(),
                });
            }
        }

        log::info!("Loaded {} ({:.1}s)", data.file_name, data.duration());
        self.render_loop.stop();
        self.output
            .get_or_insert_with(|| Destination::new(data.channels, data.sample_rate));
        self.playback.file_name = data.file_name.clone();
        self.playback.is_playing = false;
        self.playback.current_time = 0.0;
        self.element.load(data);
        self.state = PlayerState::Loaded;
        self.queue.push_back(PlayerEvent::LoadedMetadata);
        Ok(())
    }

    pub fn on_play(&mut self) {
        if !self.element.has_source() {
            log::debug!("Play ignored: no media loaded");
            return;
        }
        if self.state == PlayerState::Playing {
            return;
        }

        self.ensure_graph();
        if let Some(context) = self.context.as_mut() {
            context.resume();
        }

        self.element.play();
        self.playback.is_playing = true;
        self.playback.current_time = self.element.current_time();
        if self.graph.is_some() {
            self.render_loop.start();
        }
        self.state = PlayerState::Playing;
        log::info!("Playing from {:.2}s", self.playback.current_time);
    }

    pub fn on_pause(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        self.element.pause();
        self.render_loop.stop();
        self.playback.is_playing = false;
        self.state = PlayerState::Paused;
        log::info!("Paused at {:.2}s", self.element.current_time());
    }

    fn on_ended(&mut self) {
        self.render_loop.stop();
        self.playback.is_playing = false;
        self.playback.current_time = self.element.current_time();
        self.state = PlayerState::Ended;
        log::info!("Playback ended at {:.2}s", self.playback.current_time);
    }

    fn on_seek(&mut self, seconds: f64) {
        if !self.element.has_source() {
            return;
        }
        self.playback.current_time = self.element.seek(seconds);
        if self.state == PlayerState::Ended && !self.element.has_ended() {
            self.state = PlayerState::Paused;
        } else if self.state == PlayerState::Playing && self.element.has_ended() {
            self.queue.push_back(PlayerEvent::Ended);
        }
    }

    fn on_frame(&mut self) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        let (high, low) = graph.analysers();
        if let Err(err) = self.render_loop.on_frame(high, low, &mut self.surface) {
            log::error!("Frame skipped, stopping render loop: {}", err);
            self.render_loop.stop();
        }
    }

    /// Creates the context and graph on first use. Only one attempt is made;
    /// on failure playback carries on without visualization.
    fn ensure_graph(&mut self) {
        if self.graph.is_some() || self.graph_attempted {
            return;
        }
        self.graph_attempted = true;

        let Some(sample_rate) = self.element.sample_rate() else {
            return;
        };
        if self.context.is_none() {
            match AudioContext::new(sample_rate) {
                Ok(context) => self.context = Some(context),
                Err(err) => {
                    log::error!("Audio context init failed, visualization disabled: {}", err);
                    return;
                }
            }
        }
        let Some(context) = self.context.as_mut() else {
            return;
        };
        match build_graph(context, &mut self.element, &self.graph_config) {
            Ok(graph) => self.graph = Some(graph),
            Err(err) => {
                log::error!("Audio graph init failed, visualization disabled: {}", err);
            }
        }
    }

    /// Moves the media clock forward by `frames` sample frames, routing the
    /// block through the graph (or straight to the output without one).
    pub fn advance(&mut self, frames: usize) -> Result<PlayerState, PlayerError> {
        let was_ended = self.element.has_ended();
        let read = self.element.read_block(frames, &mut self.block);
        let channels = self.element.channels();
        let gain = self.element.volume();

        if let Some(output) = self.output.as_mut() {
            match self.graph.as_mut() {
                Some(graph) => graph.process(&self.block, channels, gain, output),
                None => output.write(&self.block, channels, gain),
            }
        }

        if read > 0 {
            self.queue.push_back(PlayerEvent::TimeUpdate);
        }
        if !was_ended && self.element.has_ended() {
            self.queue.push_back(PlayerEvent::Ended);
        }
        self.drain()
    }

    /// Stops the loop and releases the context. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.render_loop.stop();
        if let Some(context) = self.context.as_mut() {
            context.close();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn event_name(event: &PlayerEvent) -> &'static str {
    match event {
        PlayerEvent::FileSelected(_) => "file_selected",
        PlayerEvent::Play => "play",
        PlayerEvent::Pause => "pause",
        PlayerEvent::TogglePlay => "toggle_play",
        PlayerEvent::Seek(_) => "seek",
        PlayerEvent::VolumeChange(_) => "volume_change",
        PlayerEvent::Resize(_) => "resize",
        PlayerEvent::LoadedMetadata => "loaded_metadata",
        PlayerEvent::TimeUpdate => "time_update",
        PlayerEvent::Ended => "ended",
        PlayerEvent::Frame => "frame",
    }
}
