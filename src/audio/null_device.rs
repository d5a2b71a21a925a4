use super::{Analyzer, AudioDevice, AudioError, AudioHandle, PreparedSource};
use crate::model::Track;
use std::time::{Duration, Instant};

/// Stand-in used when no audio subsystem is available. Handles keep a
/// wall-clock position so transport still behaves, but nothing is heard
/// and no analyzer is offered.
#[derive(Debug, Default)]
pub struct NullDevice;

impl NullDevice {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDevice for NullDevice {
    fn name(&self) -> String {
        String::from("No audio output")
    }

    fn supports_analysis(&self) -> bool {
        false
    }

    fn prepare(&self, track: &Track) -> Result<PreparedSource, AudioError> {
        Ok(PreparedSource::new(track.id.clone(), None))
    }

    fn open(
        &mut self,
        track: &Track,
        _prepared: Option<PreparedSource>,
    ) -> Result<Box<dyn AudioHandle>, AudioError> {
        Ok(Box::new(NullHandle {
            track_id: track.id.clone(),
            paused: true,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: track.duration.filter(|duration| !duration.is_zero()),
        }))
    }
}

struct NullHandle {
    track_id: String,
    paused: bool,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
}

impl NullHandle {
    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl AudioHandle for NullHandle {
    fn track_id(&self) -> &str {
        &self.track_id
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if self.paused {
            self.started_at = Some(Instant::now());
            self.paused = false;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn stop(&mut self) {
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn position(&self) -> Duration {
        self.current_position()
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek(&mut self, position: Duration) -> Result<(), AudioError> {
        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn is_finished(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        !self.paused && self.current_position() >= duration
    }

    fn analyzer(&self) -> Option<Analyzer> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::thread;

    fn track(duration: Option<Duration>) -> Track {
        Track {
            id: String::from("n"),
            title: String::from("n"),
            artist: String::from("a"),
            duration,
            source: PathBuf::from("nonexistent-track.flac"),
            cover: None,
        }
    }

    #[test]
    fn null_handle_position_advances_when_playing() {
        let mut device = NullDevice::new();
        let mut handle = device.open(&track(None), None).expect("open");
        handle.play().expect("play should still work in null mode");
        let before = handle.position();
        thread::sleep(Duration::from_millis(20));
        assert!(handle.position() > before, "position should advance while playing");
    }

    #[test]
    fn null_handle_pause_freezes_position() {
        let mut device = NullDevice::new();
        let mut handle = device.open(&track(None), None).expect("open");
        handle.play().expect("play");
        thread::sleep(Duration::from_millis(20));

        handle.pause();
        let paused = handle.position();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.position(), paused, "position should freeze while paused");

        handle.play().expect("resume");
        thread::sleep(Duration::from_millis(20));
        assert!(handle.position() > paused, "position should continue after resume");
    }

    #[test]
    fn null_handle_seek_is_clamped_to_duration() {
        let mut device = NullDevice::new();
        let mut handle = device
            .open(&track(Some(Duration::from_secs(10))), None)
            .expect("open");
        handle.seek(Duration::from_secs(12)).expect("seek");
        assert_eq!(handle.position(), Duration::from_secs(10));
    }

    #[test]
    fn null_handle_finishes_when_known_duration_elapses() {
        let mut device = NullDevice::new();
        let mut handle = device
            .open(&track(Some(Duration::from_millis(40))), None)
            .expect("open");
        handle.play().expect("play");
        thread::sleep(Duration::from_millis(80));
        assert!(handle.is_finished(), "known-duration playback should finish");
    }

    #[test]
    fn null_handle_unknown_duration_does_not_finish() {
        let mut device = NullDevice::new();
        let mut handle = device.open(&track(None), None).expect("open");
        handle.play().expect("play");
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        assert!(handle.analyzer().is_none());
        assert!(!device.supports_analysis());
    }
}
