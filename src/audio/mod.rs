mod analyzer;
mod null_device;
mod rodio_device;
mod scripted;

pub use analyzer::{Analyzer, AnalyzerTap};
pub use null_device::NullDevice;
pub use rodio_device::RodioDevice;
pub use scripted::{HandleSnapshot, ScriptedDevice};

use crate::model::Track;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unsupported(String),
    #[error("failed to load {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },
    #[error("playback start rejected: {0}")]
    StartRejected(String),
    #[error("seek failed: {0}")]
    Seek(String),
}

/// Resource fetched ahead of time so a later `open` can skip the read.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    track_id: String,
    bytes: Option<Arc<[u8]>>,
}

impl PreparedSource {
    pub fn new(track_id: impl Into<String>, bytes: Option<Arc<[u8]>>) -> Self {
        Self {
            track_id: track_id.into(),
            bytes,
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn bytes(&self) -> Option<&Arc<[u8]>> {
        self.bytes.as_ref()
    }
}

/// One live decode/output pipeline. Dropping it releases the output.
pub trait AudioHandle {
    fn track_id(&self) -> &str;
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn seek(&mut self, position: Duration) -> Result<(), AudioError>;
    fn is_finished(&self) -> bool;
    fn analyzer(&self) -> Option<Analyzer>;
}

/// Platform audio subsystem able to open handles for tracks.
pub trait AudioDevice {
    fn name(&self) -> String;
    fn supports_analysis(&self) -> bool;
    fn prepare(&self, track: &Track) -> Result<PreparedSource, AudioError>;
    fn open(
        &mut self,
        track: &Track,
        prepared: Option<PreparedSource>,
    ) -> Result<Box<dyn AudioHandle>, AudioError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    Loaded {
        track_id: String,
        duration: Option<Duration>,
    },
    TimeUpdate {
        track_id: String,
        position: Duration,
    },
    Ended {
        track_id: String,
    },
    LoadFailed {
        track_id: String,
        error: AudioError,
    },
    StartRejected {
        track_id: String,
        error: AudioError,
    },
}

/// Owns the sounding handle and, during a crossfade, the one fading out.
///
/// Mutation is crate-private: only the player and the crossfade manager
/// drive playback. The visualizer only reads [`AudioGraph::analyzer`].
pub struct AudioGraph {
    device: Box<dyn AudioDevice>,
    current: Option<Box<dyn AudioHandle>>,
    outgoing: Option<Box<dyn AudioHandle>>,
    events: Sender<AudioEvent>,
    ended_reported: bool,
}

impl AudioGraph {
    pub fn new(device: Box<dyn AudioDevice>) -> (Self, Receiver<AudioEvent>) {
        let (events, receiver) = mpsc::channel();
        let graph = Self {
            device,
            current: None,
            outgoing: None,
            events,
            ended_reported: false,
        };
        (graph, receiver)
    }

    pub fn device_name(&self) -> String {
        self.device.name()
    }

    pub fn supports_analysis(&self) -> bool {
        self.device.supports_analysis()
    }

    /// Analyzer of the audible handle: the current one, or the outgoing one
    /// while it fades out ahead of its successor.
    pub fn analyzer(&self) -> Option<Analyzer> {
        self.current
            .as_ref()
            .or(self.outgoing.as_ref())
            .and_then(|handle| handle.analyzer())
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.current.as_ref().map(|handle| handle.track_id())
    }

    pub fn current_volume(&self) -> Option<f32> {
        self.current.as_ref().map(|handle| handle.volume())
    }

    pub fn current_finished(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|handle| handle.is_finished())
    }

    pub fn position(&self) -> Option<Duration> {
        self.current.as_ref().map(|handle| handle.position())
    }

    pub fn live_handles(&self) -> usize {
        usize::from(self.current.is_some()) + usize::from(self.outgoing.is_some())
    }

    pub fn has_outgoing(&self) -> bool {
        self.outgoing.is_some()
    }

    pub(crate) fn prepare(&self, track: &Track) -> Result<PreparedSource, AudioError> {
        self.device.prepare(track)
    }

    /// Replaces the current handle with a fresh, paused one for `track`.
    pub(crate) fn load(
        &mut self,
        track: &Track,
        prepared: Option<PreparedSource>,
        volume: f32,
    ) -> Result<(), AudioError> {
        self.release_current();
        let prepared = prepared.filter(|source| source.track_id() == track.id);
        match self.device.open(track, prepared) {
            Ok(mut handle) => {
                handle.set_volume(volume);
                let duration = handle.duration().or(track.duration);
                self.current = Some(handle);
                self.ended_reported = false;
                tracing::debug!(track = %track.id, ?duration, "audio handle opened");
                self.emit(AudioEvent::Loaded {
                    track_id: track.id.clone(),
                    duration,
                });
                Ok(())
            }
            Err(error) => {
                tracing::warn!(track = %track.id, %error, "audio handle failed to open");
                self.emit(AudioEvent::LoadFailed {
                    track_id: track.id.clone(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    pub(crate) fn start(&mut self) -> Result<(), AudioError> {
        let Some(handle) = self.current.as_mut() else {
            return Err(AudioError::StartRejected(String::from("no track loaded")));
        };
        if let Err(error) = handle.play() {
            tracing::warn!(track = handle.track_id(), %error, "playback start rejected");
            let track_id = handle.track_id().to_string();
            self.emit(AudioEvent::StartRejected {
                track_id,
                error: error.clone(),
            });
            return Err(error);
        }
        // A restarted handle that is already drained reports its end again.
        self.ended_reported = false;
        Ok(())
    }

    pub(crate) fn pause(&mut self) {
        if let Some(handle) = self.current.as_mut() {
            handle.pause();
        }
        if let Some(handle) = self.outgoing.as_mut() {
            handle.pause();
        }
    }

    pub(crate) fn seek(&mut self, position: Duration) -> Result<(), AudioError> {
        let Some(handle) = self.current.as_mut() else {
            return Ok(());
        };
        handle.seek(position)?;
        self.ended_reported = false;
        Ok(())
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        if let Some(handle) = self.current.as_mut() {
            handle.set_volume(volume.clamp(0.0, 1.0));
        }
    }

    /// Moves the current handle into the outgoing slot and returns its
    /// volume. An older outgoing handle is released first.
    pub(crate) fn begin_fade_out(&mut self) -> Option<f32> {
        let handle = self.current.take()?;
        self.release_outgoing();
        let volume = handle.volume();
        self.outgoing = Some(handle);
        Some(volume)
    }

    pub(crate) fn set_outgoing_volume(&mut self, volume: f32) {
        if let Some(handle) = self.outgoing.as_mut() {
            handle.set_volume(volume.clamp(0.0, 1.0));
        }
    }

    pub(crate) fn release_outgoing(&mut self) {
        if let Some(mut handle) = self.outgoing.take() {
            handle.stop();
            tracing::debug!(track = handle.track_id(), "outgoing handle released");
        }
    }

    pub(crate) fn release_current(&mut self) {
        if let Some(mut handle) = self.current.take() {
            handle.stop();
            tracing::debug!(track = handle.track_id(), "current handle released");
        }
        self.ended_reported = false;
    }

    pub(crate) fn release_all(&mut self) {
        self.release_outgoing();
        self.release_current();
    }

    /// Emits time updates and a single `Ended` per finished handle.
    pub(crate) fn poll(&mut self) {
        let Some(handle) = self.current.as_ref() else {
            return;
        };
        let track_id = handle.track_id().to_string();
        if !handle.is_paused() {
            let position = handle.position();
            self.emit(AudioEvent::TimeUpdate {
                track_id: track_id.clone(),
                position,
            });
        }
        if handle.is_finished() && !self.ended_reported {
            self.ended_reported = true;
            self.emit(AudioEvent::Ended { track_id });
        }
    }

    fn emit(&self, event: AudioEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.release_all();
    }
}
