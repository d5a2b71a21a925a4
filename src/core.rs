use crate::model::{RepeatMode, Settings, TransportStatus};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;

pub const RESTART_THRESHOLD: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackFailure {
    #[error("{0}; press play to retry")]
    StartRejected(String),
    #[error("could not load {track_id}: {reason}")]
    LoadFailed { track_id: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub current_index: usize,
    pub status: TransportStatus,
    pub elapsed: Duration,
    pub duration: Option<Duration>,
    pub volume: f32,
    pub muted: bool,
    pub last_audible_volume: f32,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub likes: HashMap<String, bool>,
    pub seek_dragging: bool,
    pub failure: Option<PlaybackFailure>,
}

impl PlaybackState {
    pub fn from_settings(settings: &Settings) -> Self {
        let volume = settings.volume.clamp(0.0, 1.0);
        Self {
            current_index: 0,
            status: TransportStatus::Stopped,
            elapsed: Duration::ZERO,
            duration: None,
            volume,
            muted: settings.muted || volume == 0.0,
            last_audible_volume: if volume > 0.0 { volume } else { 1.0 },
            shuffle: settings.shuffle,
            repeat: settings.repeat,
            likes: settings.likes.clone(),
            seek_dragging: false,
            failure: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(
            self.status,
            TransportStatus::Playing | TransportStatus::Transitioning
        )
    }
}

/// What a transport request resolves to before any side effect happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Restart,
    Goto(usize),
    Stop,
}

/// Transport decisions over a playlist of `len` tracks. Holds no audio
/// resources; the player applies the returned steps.
#[derive(Debug)]
pub struct PlayerCore {
    pub state: PlaybackState,
    len: usize,
    rng: SmallRng,
}

impl PlayerCore {
    pub fn new(len: usize, settings: &Settings) -> Self {
        Self::with_rng(len, settings, SmallRng::from_os_rng())
    }

    pub fn with_seed(len: usize, settings: &Settings, seed: u64) -> Self {
        Self::with_rng(len, settings, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(len: usize, settings: &Settings, rng: SmallRng) -> Self {
        Self {
            state: PlaybackState::from_settings(settings),
            len,
            rng,
        }
    }

    /// Makes shuffle picks reproducible.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Step for an explicit `next()` or a natural track end.
    pub fn step_next(&mut self) -> Option<Step> {
        if self.is_empty() {
            return None;
        }
        if self.state.repeat == RepeatMode::One {
            return Some(Step::Restart);
        }
        Some(self.advance())
    }

    /// Like [`Self::step_next`] but never restarts in place. Used to skip
    /// past a track that failed to load.
    pub fn step_skip(&mut self) -> Option<Step> {
        if self.is_empty() {
            return None;
        }
        Some(self.advance())
    }

    pub fn step_previous(&mut self) -> Option<Step> {
        if self.is_empty() {
            return None;
        }
        if self.state.elapsed > RESTART_THRESHOLD {
            return Some(Step::Restart);
        }
        if self.state.shuffle {
            return Some(self.shuffle_step());
        }

        let current = self.state.current_index;
        if current > 0 {
            return Some(Step::Goto(current - 1));
        }
        Some(match self.state.repeat {
            RepeatMode::All => Step::Goto(self.len - 1),
            _ => Step::Restart,
        })
    }

    fn advance(&mut self) -> Step {
        if self.state.shuffle {
            return self.shuffle_step();
        }

        let next = self.state.current_index + 1;
        if next < self.len {
            return Step::Goto(next);
        }
        match self.state.repeat {
            RepeatMode::All => Step::Goto(0),
            _ => Step::Stop,
        }
    }

    fn shuffle_step(&mut self) -> Step {
        if self.len <= 1 {
            return Step::Restart;
        }
        let current = self.state.current_index;
        let mut candidate = current;
        while candidate == current {
            candidate = self.rng.random_range(0..self.len);
        }
        Step::Goto(candidate)
    }

    /// Points the state at `index` with a fresh clock. Out of range is ignored.
    pub fn set_current(&mut self, index: usize, duration: Option<Duration>) -> bool {
        if index >= self.len {
            return false;
        }
        self.state.current_index = index;
        self.state.elapsed = Duration::ZERO;
        self.state.duration = duration;
        self.state.failure = None;
        true
    }

    pub fn clamp_seek(&self, target: Duration) -> Duration {
        match self.state.duration {
            Some(duration) => target.min(duration),
            None => target,
        }
    }

    pub fn seek_relative(&self, forward: bool, step: Duration) -> Duration {
        let target = if forward {
            self.state.elapsed.saturating_add(step)
        } else {
            self.state.elapsed.saturating_sub(step)
        };
        self.clamp_seek(target)
    }

    /// Applies a periodic position report unless the user is dragging.
    pub fn apply_time_update(&mut self, position: Duration) -> bool {
        if self.state.seek_dragging {
            return false;
        }
        self.state.elapsed = self.clamp_seek(position);
        true
    }

    pub fn begin_drag(&mut self) {
        self.state.seek_dragging = true;
    }

    pub fn drag_to(&mut self, target: Duration) {
        if self.state.seek_dragging {
            self.state.elapsed = self.clamp_seek(target);
        }
    }

    /// Ends a drag and returns the position to seek to.
    pub fn end_drag(&mut self) -> Option<Duration> {
        if !self.state.seek_dragging {
            return None;
        }
        self.state.seek_dragging = false;
        Some(self.state.elapsed)
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.state.volume = volume;
        if volume == 0.0 {
            self.state.muted = true;
        } else {
            self.state.muted = false;
            self.state.last_audible_volume = volume;
        }
    }

    pub fn toggle_mute(&mut self) {
        if self.state.muted {
            self.state.muted = false;
            if self.state.volume == 0.0 {
                self.state.volume = self.state.last_audible_volume;
            }
        } else {
            self.state.muted = true;
        }
    }

    /// Volume the sounding handle should have right now.
    pub fn effective_volume(&self) -> f32 {
        if self.state.muted {
            0.0
        } else {
            self.state.volume
        }
    }

    pub fn toggle_like(&mut self, track_id: &str) -> bool {
        let liked = !self.is_liked(track_id);
        self.state.likes.insert(track_id.to_string(), liked);
        liked
    }

    pub fn is_liked(&self, track_id: &str) -> bool {
        self.state.likes.get(track_id).copied().unwrap_or(false)
    }

    pub fn toggle_shuffle(&mut self) {
        self.state.shuffle = !self.state.shuffle;
    }

    pub fn cycle_repeat(&mut self) {
        self.state.repeat = self.state.repeat.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert;

    fn core(len: usize) -> PlayerCore {
        PlayerCore::with_seed(len, &Settings::default(), 7)
    }

    #[test]
    fn sequential_next_stops_at_end_without_repeat() {
        let mut core = core(3);
        assert_eq!(core.step_next(), Some(Step::Goto(1)));
        core.set_current(2, None);
        assert_eq!(core.step_next(), Some(Step::Stop));
    }

    #[test]
    fn repeat_all_wraps_to_first() {
        let mut core = core(3);
        core.state.repeat = RepeatMode::All;
        core.set_current(2, None);
        assert_eq!(core.step_next(), Some(Step::Goto(0)));
    }

    #[test]
    fn repeat_one_restarts_but_skip_advances() {
        let mut core = core(3);
        core.state.repeat = RepeatMode::One;
        assert_eq!(core.step_next(), Some(Step::Restart));
        assert_eq!(core.step_skip(), Some(Step::Goto(1)));
    }

    #[test]
    fn previous_restarts_after_threshold() {
        let mut core = core(3);
        core.set_current(1, None);
        core.state.elapsed = Duration::from_secs(10);
        assert_eq!(core.step_previous(), Some(Step::Restart));

        core.state.elapsed = Duration::from_secs(3);
        assert_eq!(core.step_previous(), Some(Step::Goto(0)));
    }

    #[test]
    fn previous_at_first_track_wraps_only_with_repeat_all() {
        let mut core = core(3);
        assert_eq!(core.step_previous(), Some(Step::Restart));
        core.state.repeat = RepeatMode::All;
        assert_eq!(core.step_previous(), Some(Step::Goto(2)));
    }

    #[test]
    fn single_track_shuffle_restarts() {
        let mut core = core(1);
        core.state.shuffle = true;
        assert_eq!(core.step_next(), Some(Step::Restart));
        assert_eq!(core.step_previous(), Some(Step::Restart));
    }

    #[test]
    fn empty_playlist_yields_no_step() {
        let mut core = core(0);
        assert_eq!(core.step_next(), None);
        assert_eq!(core.step_previous(), None);
        assert!(!core.set_current(0, None));
    }

    #[test]
    fn zero_volume_mutes_and_toggle_restores_last_audible() {
        let mut core = core(1);
        core.set_volume(0.42);
        core.set_volume(0.0);
        assert!(core.state.muted);
        assert_eq!(core.effective_volume(), 0.0);

        core.toggle_mute();
        assert!(!core.state.muted);
        assert_eq!(core.state.volume, 0.42);
    }

    #[test]
    fn mute_keeps_volume_and_nonzero_volume_unmutes() {
        let mut core = core(1);
        core.set_volume(0.8);
        core.toggle_mute();
        assert!(core.state.muted);
        assert_eq!(core.state.volume, 0.8);
        assert_eq!(core.effective_volume(), 0.0);

        core.set_volume(0.3);
        assert!(!core.state.muted);
        assert_eq!(core.effective_volume(), 0.3);
    }

    #[test]
    fn volume_is_clamped() {
        let mut core = core(1);
        core.set_volume(3.0);
        assert_eq!(core.state.volume, 1.0);
        core.set_volume(f32::NAN);
        assert!(core.state.muted);
    }

    #[test]
    fn likes_toggle_independently_of_playlist() {
        let mut core = core(0);
        assert!(core.toggle_like("elsewhere"));
        assert!(core.is_liked("elsewhere"));
        assert!(!core.toggle_like("elsewhere"));
        assert!(!core.is_liked("elsewhere"));
    }

    #[test]
    fn drag_suppresses_time_updates() {
        let mut core = core(1);
        core.state.duration = Some(Duration::from_secs(100));
        core.begin_drag();
        core.drag_to(Duration::from_secs(40));
        assert!(!core.apply_time_update(Duration::from_secs(5)));
        assert_eq!(core.state.elapsed, Duration::from_secs(40));

        assert_eq!(core.end_drag(), Some(Duration::from_secs(40)));
        assert!(core.apply_time_update(Duration::from_secs(41)));
        assert_eq!(core.state.elapsed, Duration::from_secs(41));
    }

    #[test]
    fn seek_clamps_to_duration() {
        let mut core = core(1);
        core.state.duration = Some(Duration::from_secs(60));
        assert_eq!(core.clamp_seek(Duration::from_secs(90)), Duration::from_secs(60));
        core.state.elapsed = Duration::from_secs(2);
        assert_eq!(
            core.seek_relative(false, Duration::from_secs(5)),
            Duration::ZERO
        );
    }

    proptest::proptest! {
        #[test]
        fn steps_stay_in_bounds(len in 1usize..40, current in 0usize..40, shuffle in proptest::bool::ANY, repeat in 0u8..3) {
            let mut core = PlayerCore::with_seed(len, &Settings::default(), 11);
            core.set_current(current.min(len - 1), None);
            core.state.shuffle = shuffle;
            core.state.repeat = match repeat {
                0 => RepeatMode::None,
                1 => RepeatMode::All,
                _ => RepeatMode::One,
            };

            for step in [core.step_next(), core.step_previous(), core.step_skip()] {
                if let Some(Step::Goto(index)) = step {
                    prop_assert!(index < len);
                }
            }
        }

        #[test]
        fn shuffle_never_repeats_current(len in 2usize..30, seed in 0u64..1000) {
            let mut core = PlayerCore::with_seed(len, &Settings::default(), seed);
            core.state.shuffle = true;
            for _ in 0..50 {
                let Some(Step::Goto(index)) = core.step_next() else {
                    prop_assert!(false, "shuffle with more than one track must move");
                    return Ok(());
                };
                prop_assert!(index != core.state.current_index);
                core.set_current(index, None);
            }
        }

        #[test]
        fn volume_state_invariants_hold(ops in proptest::collection::vec((0u8..3, 0.0f32..1.5), 1..100)) {
            let mut core = PlayerCore::with_seed(1, &Settings::default(), 3);
            for (op, value) in ops {
                match op {
                    0 => core.set_volume(value),
                    1 => core.toggle_mute(),
                    _ => core.set_volume(0.0),
                }
                prop_assert!((0.0..=1.0).contains(&core.state.volume));
                prop_assert!(core.state.last_audible_volume > 0.0);
                if core.state.volume == 0.0 {
                    prop_assert!(core.state.muted);
                }
            }
        }
    }
}
