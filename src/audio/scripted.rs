use super::{Analyzer, AudioDevice, AudioError, AudioHandle, PreparedSource};
use crate::model::Track;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

/// In-memory device whose clock and failures are driven by its owner.
///
/// Cloning shares state, so a host (or test) can keep a probe while the
/// player owns the device. Positions only move through
/// [`ScriptedDevice::set_position`]; nothing depends on wall time.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    state: Rc<RefCell<ScriptState>>,
}

#[derive(Default)]
struct ScriptState {
    next_handle: u64,
    handles: BTreeMap<u64, HandleState>,
    opened: Vec<String>,
    opened_prepared: Vec<String>,
    prepared: Vec<String>,
    fail_load: HashSet<String>,
    reject_start: HashSet<String>,
    analysis: bool,
}

#[derive(Debug, Clone)]
struct HandleState {
    track_id: String,
    volume: f32,
    playing: bool,
    position: Duration,
    duration: Option<Duration>,
    finished: bool,
    released: bool,
    volume_history: Vec<f32>,
    analyzer: Option<Analyzer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandleSnapshot {
    pub track_id: String,
    pub volume: f32,
    pub playing: bool,
    pub position: Duration,
    pub volume_history: Vec<f32>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles opened from now on expose an analyzer fed by [`Self::feed`].
    pub fn with_analysis(self) -> Self {
        self.state.borrow_mut().analysis = true;
        self
    }

    pub fn fail_load(&self, track_id: &str) {
        self.state.borrow_mut().fail_load.insert(track_id.to_string());
    }

    pub fn reject_start(&self, track_id: &str) {
        self.state
            .borrow_mut()
            .reject_start
            .insert(track_id.to_string());
    }

    pub fn allow_start(&self, track_id: &str) {
        self.state.borrow_mut().reject_start.remove(track_id);
    }

    pub fn finish(&self, track_id: &str) {
        self.update_live(track_id, |handle| {
            handle.finished = true;
            if let Some(duration) = handle.duration {
                handle.position = duration;
            }
        });
    }

    pub fn set_position(&self, track_id: &str, position: Duration) {
        self.update_live(track_id, |handle| handle.position = position);
    }

    pub fn feed(&self, track_id: &str, samples: &[f32]) {
        let state = self.state.borrow();
        for handle in state
            .handles
            .values()
            .filter(|handle| !handle.released && handle.track_id == track_id)
        {
            if let Some(analyzer) = handle.analyzer.as_ref() {
                analyzer.push_samples(samples);
            }
        }
    }

    pub fn live_handles(&self) -> Vec<HandleSnapshot> {
        self.state
            .borrow()
            .handles
            .values()
            .filter(|handle| !handle.released)
            .map(|handle| HandleSnapshot {
                track_id: handle.track_id.clone(),
                volume: handle.volume,
                playing: handle.playing,
                position: handle.position,
                volume_history: handle.volume_history.clone(),
            })
            .collect()
    }

    pub fn audible_handles(&self) -> usize {
        self.live_handles()
            .iter()
            .filter(|handle| handle.playing && handle.volume > 0.0)
            .count()
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.borrow().opened.clone()
    }

    pub fn opened_with_prepared(&self) -> Vec<String> {
        self.state.borrow().opened_prepared.clone()
    }

    pub fn prepared(&self) -> Vec<String> {
        self.state.borrow().prepared.clone()
    }

    fn update_live(&self, track_id: &str, mut update: impl FnMut(&mut HandleState)) {
        let mut state = self.state.borrow_mut();
        for handle in state
            .handles
            .values_mut()
            .filter(|handle| !handle.released && handle.track_id == track_id)
        {
            update(handle);
        }
    }
}

impl AudioDevice for ScriptedDevice {
    fn name(&self) -> String {
        String::from("Scripted output")
    }

    fn supports_analysis(&self) -> bool {
        self.state.borrow().analysis
    }

    fn prepare(&self, track: &Track) -> Result<PreparedSource, AudioError> {
        let mut state = self.state.borrow_mut();
        if state.fail_load.contains(&track.id) {
            return Err(AudioError::Load {
                path: track.source.clone(),
                reason: String::from("scripted load failure"),
            });
        }
        state.prepared.push(track.id.clone());
        Ok(PreparedSource::new(track.id.clone(), None))
    }

    fn open(
        &mut self,
        track: &Track,
        prepared: Option<PreparedSource>,
    ) -> Result<Box<dyn AudioHandle>, AudioError> {
        let mut state = self.state.borrow_mut();
        if state.fail_load.contains(&track.id) {
            return Err(AudioError::Load {
                path: track.source.clone(),
                reason: String::from("scripted load failure"),
            });
        }

        state.next_handle += 1;
        let id = state.next_handle;
        state.opened.push(track.id.clone());
        if prepared.is_some() {
            state.opened_prepared.push(track.id.clone());
        }
        let analyzer = state.analysis.then(|| Analyzer::new(1));
        state.handles.insert(
            id,
            HandleState {
                track_id: track.id.clone(),
                volume: 1.0,
                playing: false,
                position: Duration::ZERO,
                duration: track.duration,
                finished: false,
                released: false,
                volume_history: Vec::new(),
                analyzer,
            },
        );

        Ok(Box::new(ScriptedHandle {
            id,
            track_id: track.id.clone(),
            state: Rc::clone(&self.state),
        }))
    }
}

struct ScriptedHandle {
    id: u64,
    track_id: String,
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedHandle {
    fn with<T>(&self, read: impl FnOnce(&HandleState) -> T) -> Option<T> {
        self.state.borrow().handles.get(&self.id).map(read)
    }

    fn with_mut(&self, write: impl FnOnce(&mut HandleState)) {
        if let Some(handle) = self.state.borrow_mut().handles.get_mut(&self.id) {
            write(handle);
        }
    }
}

impl AudioHandle for ScriptedHandle {
    fn track_id(&self) -> &str {
        &self.track_id
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if self.state.borrow().reject_start.contains(&self.track_id) {
            return Err(AudioError::StartRejected(String::from(
                "scripted autoplay block",
            )));
        }
        self.with_mut(|handle| handle.playing = true);
        Ok(())
    }

    fn pause(&mut self) {
        self.with_mut(|handle| handle.playing = false);
    }

    fn stop(&mut self) {
        self.with_mut(|handle| {
            handle.playing = false;
            handle.position = Duration::ZERO;
        });
    }

    fn is_paused(&self) -> bool {
        self.with(|handle| !handle.playing).unwrap_or(true)
    }

    fn volume(&self) -> f32 {
        self.with(|handle| handle.volume).unwrap_or(0.0)
    }

    fn set_volume(&mut self, volume: f32) {
        self.with_mut(|handle| {
            handle.volume = volume;
            handle.volume_history.push(volume);
        });
    }

    fn position(&self) -> Duration {
        self.with(|handle| handle.position).unwrap_or_default()
    }

    fn duration(&self) -> Option<Duration> {
        self.with(|handle| handle.duration).flatten()
    }

    fn seek(&mut self, position: Duration) -> Result<(), AudioError> {
        self.with_mut(|handle| {
            handle.position = position;
            handle.finished = false;
        });
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.with(|handle| handle.finished && handle.playing)
            .unwrap_or(false)
    }

    fn analyzer(&self) -> Option<Analyzer> {
        self.with(|handle| handle.analyzer.clone()).flatten()
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.with_mut(|handle| {
            handle.playing = false;
            handle.released = true;
        });
    }
}
