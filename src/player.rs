use crate::audio::{AudioDevice, AudioEvent, AudioGraph};
use crate::core::{PlaybackFailure, PlaybackState, PlayerCore, Step};
use crate::crossfade::{CrossfadeManager, CrossfadeOutcome, FadeTimings};
use crate::keymap::Action;
use crate::model::{Mood, Playlist, Settings, Track, TransportStatus};
use crate::preload::Preloader;
use crate::scheduler::Scheduler;
use crate::visualizer::{PixelBuffer, Visualizer};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

pub const SEEK_STEP: Duration = Duration::from_secs(5);
pub const VOLUME_STEP: f32 = 0.1;
const INITIAL_SURFACE: (usize, usize) = (64, 16);

/// Playback controller for one playlist.
///
/// Single-threaded and cooperative: every timer (crossfade ramps, render
/// frames) lives in the player's [`Scheduler`] and only advances when the
/// host calls [`Player::tick`]. Audio failures arrive on the graph's event
/// channel and end up in [`PlaybackState::failure`]; they never escape as
/// errors.
pub struct Player {
    playlist: Playlist,
    core: PlayerCore,
    graph: AudioGraph,
    events: Receiver<AudioEvent>,
    scheduler: Scheduler,
    crossfade: CrossfadeManager,
    preloader: Preloader,
    visualizer: Visualizer<PixelBuffer>,
    mood: Mood,
    now: Instant,
    auto_advance_on_error: bool,
    failure_streak: usize,
    pending_skip: bool,
    expanded: bool,
    torn_down: bool,
}

impl Player {
    pub fn new(
        playlist: Playlist,
        device: Box<dyn AudioDevice>,
        settings: &Settings,
        now: Instant,
    ) -> Self {
        let (graph, events) = AudioGraph::new(device);
        let mut core = PlayerCore::new(playlist.len(), settings);
        core.state.duration = playlist.tracks.first().and_then(|track| track.duration);

        let (w, h) = INITIAL_SURFACE;
        let mut player = Self {
            core,
            graph,
            events,
            scheduler: Scheduler::new(),
            crossfade: CrossfadeManager::new(FadeTimings::from_settings(settings)),
            preloader: Preloader::new(),
            visualizer: Visualizer::new(PixelBuffer::new(w, h), settings, now),
            mood: settings.mood,
            now,
            auto_advance_on_error: settings.auto_advance_on_error,
            failure_streak: 0,
            pending_skip: false,
            expanded: false,
            torn_down: false,
            playlist,
        };
        player.preloader.request(&player.playlist, 0);

        tracing::info!(
            playlist = %player.playlist.id,
            tracks = player.playlist.len(),
            output = %player.graph.device_name(),
            "player created"
        );
        player
    }

    /// Seeds shuffle picks and visualizer particles for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.core.reseed(seed);
        self.visualizer.reseed(seed);
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.core.state
    }

    pub fn status(&self) -> TransportStatus {
        self.core.state.status
    }

    pub fn failure(&self) -> Option<&PlaybackFailure> {
        self.core.state.failure.as_ref()
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn current_index(&self) -> usize {
        self.core.state.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.playlist.tracks.get(self.core.state.current_index)
    }

    /// Track id of the handle that is sounding (or loaded), if any.
    pub fn bound_track_id(&self) -> Option<&str> {
        self.graph.current_track_id()
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_liked(&self, track_id: &str) -> bool {
        self.core.is_liked(track_id)
    }

    pub fn is_transitioning(&self) -> bool {
        self.crossfade.is_active()
    }

    pub fn preload_ready(&self) -> bool {
        self.preloader.is_ready()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn device_name(&self) -> String {
        self.graph.device_name()
    }

    pub fn supports_analysis(&self) -> bool {
        self.graph.supports_analysis()
    }

    /// Handles the graph holds right now, outgoing included.
    pub fn live_handles(&self) -> usize {
        self.graph.live_handles()
    }

    /// Timers still registered: ramp steps, settle delays, the frame loop.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.active_count()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    pub fn visualizer(&self) -> &Visualizer<PixelBuffer> {
        &self.visualizer
    }

    pub fn resize_visualizer(&mut self, w: usize, h: usize) {
        self.visualizer.resize(w, h);
    }

    pub fn play(&mut self) {
        if !self.ready("play") {
            return;
        }
        self.start_current();
        self.settle();
    }

    pub fn pause(&mut self) {
        if !self.ready("pause") {
            return;
        }
        match self.core.state.status {
            TransportStatus::Playing => {}
            TransportStatus::Transitioning => self.finish_transition(false),
            TransportStatus::Paused | TransportStatus::Stopped => return,
        }
        self.graph.pause();
        self.core.state.status = TransportStatus::Paused;
        tracing::debug!("paused");
        self.settle();
    }

    pub fn resume(&mut self) {
        if self.core.state.status == TransportStatus::Paused {
            self.play();
        }
    }

    pub fn toggle_play(&mut self) {
        if self.core.state.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn next(&mut self) {
        if !self.ready("next") {
            return;
        }
        let step = self.core.step_next();
        self.apply_step(step);
        self.settle();
    }

    pub fn previous(&mut self) {
        if !self.ready("previous") {
            return;
        }
        let step = self.core.step_previous();
        self.apply_step(step);
        self.settle();
    }

    /// Jumps to `index` and plays it. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if !self.ready("select") {
            return;
        }
        if index >= self.playlist.len() {
            tracing::debug!(index, len = self.playlist.len(), "select out of range ignored");
            return;
        }
        if index == self.core.state.current_index && self.crossfade.is_active() {
            tracing::debug!(index, "select ignored; already crossfading to it");
            self.settle();
            return;
        }
        if index != self.core.state.current_index || !self.handle_matches_current() {
            self.switch_to(index);
        }
        if !self.core.state.is_playing() {
            self.start_current();
        }
        self.settle();
    }

    /// Moves the playhead, clamped to the track length. Status is unchanged.
    pub fn seek(&mut self, target: Duration) {
        if !self.ready("seek") {
            return;
        }
        self.seek_inner(target);
        self.settle();
    }

    pub fn seek_by(&mut self, forward: bool, step: Duration) {
        if !self.ready("seek") {
            return;
        }
        let target = self.core.seek_relative(forward, step);
        self.seek_inner(target);
        self.settle();
    }

    /// While a drag is active, periodic time updates leave `elapsed` alone.
    pub fn begin_seek_drag(&mut self) {
        if self.ready("begin_seek_drag") {
            self.core.begin_drag();
        }
    }

    pub fn drag_seek(&mut self, target: Duration) {
        if self.ready("drag_seek") {
            self.core.drag_to(target);
        }
    }

    /// Commits the dragged position and resumes the time-update feed.
    pub fn end_seek_drag(&mut self) {
        if !self.ready("end_seek_drag") {
            return;
        }
        if let Some(target) = self.core.end_drag() {
            self.seek_inner(target);
        }
        self.settle();
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !self.ready("set_volume") {
            return;
        }
        self.core.set_volume(volume);
        self.apply_volume();
    }

    pub fn toggle_mute(&mut self) {
        if !self.ready("toggle_mute") {
            return;
        }
        self.core.toggle_mute();
        self.apply_volume();
    }

    /// Flips the like flag for any track id; playback is untouched.
    pub fn toggle_like(&mut self, track_id: &str) -> bool {
        if !self.ready("toggle_like") {
            return self.core.is_liked(track_id);
        }
        let liked = self.core.toggle_like(track_id);
        tracing::debug!(track = track_id, liked, "like toggled");
        liked
    }

    pub fn toggle_like_current(&mut self) -> Option<bool> {
        let track_id = self.current_track()?.id.clone();
        Some(self.toggle_like(&track_id))
    }

    pub fn toggle_shuffle(&mut self) {
        if self.ready("toggle_shuffle") {
            self.core.toggle_shuffle();
        }
    }

    pub fn cycle_repeat(&mut self) {
        if self.ready("cycle_repeat") {
            self.core.cycle_repeat();
        }
    }

    /// Only the visualizer strategy follows the mood.
    pub fn set_mood(&mut self, mood: Mood) {
        if self.torn_down {
            return;
        }
        if mood != self.mood {
            tracing::debug!(%mood, "mood changed");
        }
        self.mood = mood;
    }

    pub fn toggle_expanded(&mut self) {
        if !self.torn_down {
            self.expanded = !self.expanded;
        }
    }

    /// Runs a keyboard action. Returns `false` once torn down.
    pub fn apply(&mut self, action: Action) -> bool {
        if self.torn_down {
            return false;
        }
        match action {
            Action::TogglePlay => self.toggle_play(),
            Action::SeekBackward => self.seek_by(false, SEEK_STEP),
            Action::SeekForward => self.seek_by(true, SEEK_STEP),
            Action::Previous => self.previous(),
            Action::Next => self.next(),
            Action::ToggleMute => self.toggle_mute(),
            Action::VolumeUp => self.set_volume(self.core.state.volume + VOLUME_STEP),
            Action::VolumeDown => self.set_volume(self.core.state.volume - VOLUME_STEP),
            Action::ToggleLike => {
                self.toggle_like_current();
            }
            Action::ToggleExpanded => self.toggle_expanded(),
            Action::ToggleShuffle => self.toggle_shuffle(),
            Action::CycleRepeat => self.cycle_repeat(),
            Action::CycleMood => self.set_mood(self.mood.next()),
            Action::Select(index) => self.select(index),
        }
        true
    }

    /// Advances the player to `now`: audio events, due timers, preloading.
    pub fn tick(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        self.now = now;
        self.graph.poll();
        self.drain_events();

        for id in self.scheduler.poll(now) {
            if self.crossfade.owns(id) {
                let outcome =
                    self.crossfade
                        .on_timer(id, now, &mut self.scheduler, &mut self.graph);
                self.on_crossfade(outcome);
            } else if self.visualizer.owns(id) {
                let analyzer = self.graph.analyzer();
                self.visualizer.render(now, analyzer.as_ref(), self.mood);
            }
        }

        self.preloader.poll(&self.graph, &self.playlist);
        self.settle();
    }

    /// Cancels every timer, stops the frame loop for good and releases all
    /// audio. Every later call is a no-op.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.crossfade.cancel(&mut self.scheduler, &mut self.graph);
        self.visualizer.shutdown(&mut self.scheduler);
        self.scheduler.cancel_all();
        self.graph.release_all();
        self.preloader.clear();
        self.core.state.status = TransportStatus::Stopped;
        self.torn_down = true;
        tracing::info!("player torn down");
    }

    /// Copies the persistent parts of the playback state into `settings`.
    pub fn store_settings(&self, settings: &mut Settings) {
        let state = &self.core.state;
        settings.volume = if state.volume > 0.0 {
            state.volume
        } else {
            state.last_audible_volume
        };
        settings.muted = state.muted;
        settings.shuffle = state.shuffle;
        settings.repeat = state.repeat;
        settings.likes = state.likes.clone();
        settings.mood = self.mood;
    }

    fn ready(&self, operation: &'static str) -> bool {
        if self.torn_down {
            tracing::debug!(operation, "ignored after teardown");
            return false;
        }
        if self.playlist.is_empty() {
            tracing::debug!(operation, "ignored on empty playlist");
            return false;
        }
        true
    }

    /// Drains events produced by the last operation and keeps the frame
    /// loop running only while sound is expected.
    fn settle(&mut self) {
        self.drain_events();
        if self.core.state.is_playing() {
            self.visualizer.start(self.now, &mut self.scheduler);
        } else {
            self.visualizer.stop(&mut self.scheduler);
        }
    }

    fn drain_events(&mut self) {
        loop {
            let events: Vec<AudioEvent> = self.events.try_iter().collect();
            if events.is_empty() && !self.pending_skip {
                break;
            }
            for event in events {
                self.handle_event(event);
            }
            if std::mem::take(&mut self.pending_skip) {
                self.skip_failed();
            }
        }
    }

    fn handle_event(&mut self, event: AudioEvent) {
        let current = self.current_track().map(|track| track.id.clone());
        let is_current = |track_id: &str| current.as_deref() == Some(track_id);

        match event {
            AudioEvent::Loaded { track_id, duration } if is_current(&track_id) => {
                if duration.is_some() {
                    self.core.state.duration = duration;
                }
                self.failure_streak = 0;
            }
            AudioEvent::TimeUpdate { track_id, position } if is_current(&track_id) => {
                self.core.apply_time_update(position);
            }
            AudioEvent::Ended { track_id }
                if is_current(&track_id) && self.core.state.status == TransportStatus::Playing =>
            {
                self.on_track_ended();
            }
            AudioEvent::Ended { track_id } if is_current(&track_id) => {
                tracing::debug!(track = %track_id, "track ended before its transition settled");
            }
            AudioEvent::LoadFailed { track_id, error } if is_current(&track_id) => {
                tracing::warn!(track = %track_id, %error, "track failed to load");
                let was_playing = self.core.state.is_playing();
                self.crossfade.cancel(&mut self.scheduler, &mut self.graph);
                if was_playing {
                    self.core.state.status = TransportStatus::Paused;
                }
                self.core.state.failure = Some(PlaybackFailure::LoadFailed {
                    track_id,
                    reason: error.to_string(),
                });
                if was_playing && self.auto_advance_on_error {
                    self.failure_streak += 1;
                    if self.failure_streak < self.playlist.len() {
                        self.pending_skip = true;
                    } else {
                        tracing::warn!(
                            failures = self.failure_streak,
                            "no playable track left; auto-advance stopped"
                        );
                    }
                }
            }
            AudioEvent::StartRejected { track_id, error } if is_current(&track_id) => {
                tracing::warn!(track = %track_id, %error, "playback start rejected");
                self.crossfade.cancel(&mut self.scheduler, &mut self.graph);
                self.graph.pause();
                self.core.state.status = TransportStatus::Paused;
                self.core.state.failure = Some(PlaybackFailure::StartRejected(error.to_string()));
            }
            stale => tracing::trace!(event = ?stale, "ignoring event for another track"),
        }
    }

    fn on_crossfade(&mut self, outcome: CrossfadeOutcome) {
        match outcome {
            CrossfadeOutcome::Pending => {}
            CrossfadeOutcome::Completed => {
                if self.core.state.status == TransportStatus::Transitioning {
                    self.core.state.status = TransportStatus::Playing;
                    tracing::debug!("transition settled");
                    // An end reported during the fade-in was not acted on.
                    if self.graph.current_finished() {
                        self.on_track_ended();
                    }
                }
            }
            CrossfadeOutcome::Aborted => {
                self.drain_events();
                if self.core.state.status == TransportStatus::Transitioning {
                    self.core.state.status = TransportStatus::Paused;
                }
            }
        }
    }

    fn on_track_ended(&mut self) {
        tracing::debug!(index = self.core.state.current_index, "track ended");
        let step = self.core.step_next();
        if matches!(step, Some(Step::Goto(_))) {
            self.graph.release_current();
        }
        self.apply_step(step);
    }

    fn skip_failed(&mut self) {
        match self.core.step_skip() {
            Some(Step::Goto(index)) => {
                tracing::debug!(index, "skipping past unplayable track");
                self.switch_to(index);
                self.start_current();
            }
            Some(Step::Stop) => self.stop_at_end(),
            Some(Step::Restart) | None => {}
        }
    }

    fn apply_step(&mut self, step: Option<Step>) {
        match step {
            Some(Step::Restart) => self.restart_current(),
            Some(Step::Goto(index)) => self.switch_to(index),
            Some(Step::Stop) => self.stop_at_end(),
            None => {}
        }
    }

    /// Opens (if needed) and starts the current track. Start failures come
    /// back as events.
    fn start_current(&mut self) {
        if self.core.state.is_playing() {
            return;
        }
        let Some(track) = self.current_track().cloned() else {
            return;
        };
        self.core.state.failure = None;
        self.core.state.status = TransportStatus::Playing;

        let volume = self.core.effective_volume();
        if self.handle_matches_current() {
            self.graph.set_volume(volume);
        } else {
            let prepared = self.preloader.take(&track.id);
            if self.graph.load(&track, prepared, volume).is_err() {
                return;
            }
        }
        if self.graph.start().is_ok() {
            tracing::debug!(track = %track.id, "playing");
        }
    }

    /// Makes `index` current. Crossfades while playing; otherwise swaps
    /// immediately and lands in `Paused` (a handle existed) or `Stopped`.
    fn switch_to(&mut self, index: usize) {
        let Some(track) = self.playlist.tracks.get(index).cloned() else {
            return;
        };
        let prepared = self.preloader.take(&track.id);
        let was_playing = self.core.state.is_playing();
        self.core.set_current(index, track.duration);
        self.preloader.request(&self.playlist, index);
        tracing::debug!(index, track = %track.id, was_playing, "switching track");

        let volume = self.core.effective_volume();
        if was_playing {
            self.core.state.status = TransportStatus::Transitioning;
            self.crossfade.start(
                self.now,
                &mut self.scheduler,
                &mut self.graph,
                track,
                prepared,
                volume,
            );
            return;
        }

        self.crossfade.cancel(&mut self.scheduler, &mut self.graph);
        let had_handle = self.graph.current_track_id().is_some();
        self.graph.release_current();
        if had_handle {
            self.core.state.status = TransportStatus::Paused;
            let _ = self.graph.load(&track, prepared, volume);
        } else {
            self.core.state.status = TransportStatus::Stopped;
        }
    }

    fn restart_current(&mut self) {
        if self.crossfade.is_active() {
            self.finish_transition(true);
            self.core.state.status = TransportStatus::Playing;
        }
        self.core.state.elapsed = Duration::ZERO;
        tracing::debug!(index = self.core.state.current_index, "restarting track");

        if self.handle_matches_current()
            && !self.graph.current_finished()
            && self.graph.seek(Duration::ZERO).is_ok()
        {
            return;
        }

        let playing = self.core.state.is_playing();
        let had_handle = self.graph.current_track_id().is_some();
        let Some(track) = self.current_track().cloned() else {
            return;
        };
        if !playing && !had_handle {
            return;
        }
        if self
            .graph
            .load(&track, None, self.core.effective_volume())
            .is_ok()
            && playing
        {
            let _ = self.graph.start();
        }
    }

    fn stop_at_end(&mut self) {
        self.crossfade.cancel(&mut self.scheduler, &mut self.graph);
        self.graph.release_all();
        self.core.state.status = TransportStatus::Stopped;
        self.core.state.elapsed = Duration::ZERO;
        tracing::debug!(index = self.core.state.current_index, "stopped at end of playlist");
    }

    /// Collapses an in-flight transition onto the incoming track.
    fn finish_transition(&mut self, start: bool) {
        let Some(incoming) = self.crossfade.cancel(&mut self.scheduler, &mut self.graph) else {
            return;
        };
        let volume = self.core.effective_volume();
        if self
            .graph
            .load(&incoming.track, incoming.prepared, volume)
            .is_ok()
            && start
        {
            let _ = self.graph.start();
        }
    }

    fn seek_inner(&mut self, target: Duration) {
        if self.crossfade.is_active() {
            self.finish_transition(true);
            self.core.state.status = TransportStatus::Playing;
        }
        let target = self.core.clamp_seek(target);
        self.core.state.elapsed = target;
        if let Err(error) = self.graph.seek(target) {
            tracing::warn!(%error, "seek failed");
        }
    }

    fn apply_volume(&mut self) {
        let volume = self.core.effective_volume();
        self.crossfade.retarget(volume);
        if !self.crossfade.is_fading_in() {
            self.graph.set_volume(volume);
        }
    }

    fn handle_matches_current(&self) -> bool {
        match (self.graph.current_track_id(), self.current_track()) {
            (Some(bound), Some(track)) => bound == track.id,
            _ => false,
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ScriptedDevice;
    use std::path::PathBuf;

    fn playlist(len: usize) -> Playlist {
        Playlist {
            id: String::from("focus"),
            title: String::from("Focus"),
            mood: Mood::Neutral,
            tracks: (0..len)
                .map(|i| Track {
                    id: format!("t{i}"),
                    title: format!("Track {i}"),
                    artist: String::from("Artist"),
                    duration: Some(Duration::from_secs(180)),
                    source: PathBuf::from(format!("/music/t{i}.mp3")),
                    cover: None,
                })
                .collect(),
        }
    }

    fn player(len: usize) -> (Player, ScriptedDevice, Instant) {
        let device = ScriptedDevice::new();
        let now = Instant::now();
        let player = Player::new(
            playlist(len),
            Box::new(device.clone()),
            &Settings::default(),
            now,
        )
        .with_seed(3);
        (player, device, now)
    }

    fn ms(start: Instant, offset: u64) -> Instant {
        start + Duration::from_millis(offset)
    }

    #[test]
    fn play_opens_and_starts_current_track() {
        let (mut player, device, _) = player(3);
        player.play();

        assert_eq!(player.status(), TransportStatus::Playing);
        assert_eq!(player.bound_track_id(), Some("t0"));
        assert_eq!(device.audible_handles(), 1);
        assert!(player.visualizer().is_running());
    }

    #[test]
    fn next_while_paused_swaps_without_transition() {
        let (mut player, device, _) = player(3);
        player.play();
        player.pause();
        player.next();

        assert_eq!(player.current_index(), 1);
        assert_eq!(player.status(), TransportStatus::Paused);
        assert!(!player.is_transitioning());
        assert_eq!(player.bound_track_id(), Some("t1"));
        assert_eq!(device.audible_handles(), 0);
        assert_eq!(player.pending_tasks(), 0);
    }

    #[test]
    fn next_while_playing_transitions_then_plays() {
        let (mut player, device, start) = player(3);
        player.play();
        player.next();
        assert_eq!(player.status(), TransportStatus::Transitioning);

        for offset in (0..=1000).step_by(10) {
            player.tick(ms(start, offset));
        }
        assert_eq!(player.status(), TransportStatus::Playing);
        assert_eq!(player.bound_track_id(), Some("t1"));
        let live = device.live_handles();
        assert_eq!(live.len(), 1);
        assert!((live[0].volume - player.state().volume).abs() < 1e-6);
    }

    #[test]
    fn pause_during_transition_lands_on_incoming_track() {
        let (mut player, device, start) = player(3);
        player.play();
        player.next();
        player.tick(ms(start, 100));
        player.pause();

        assert_eq!(player.status(), TransportStatus::Paused);
        assert!(!player.is_transitioning());
        assert_eq!(player.bound_track_id(), Some("t1"));
        assert_eq!(player.live_handles(), 1);
        assert_eq!(device.audible_handles(), 0);
        assert_eq!(player.pending_tasks(), 0);
    }

    #[test]
    fn ended_without_repeat_stops_after_last_track() {
        let (mut player, device, start) = player(2);
        player.select(1);
        player.tick(ms(start, 10));
        device.finish("t1");
        player.tick(ms(start, 20));

        assert_eq!(player.status(), TransportStatus::Stopped);
        assert_eq!(player.live_handles(), 0);
        assert!(!player.visualizer().is_running());
    }

    #[test]
    fn repeat_one_restarts_on_end() {
        let (mut player, device, start) = player(3);
        player.cycle_repeat();
        player.cycle_repeat();
        assert_eq!(player.state().repeat, crate::model::RepeatMode::One);
        player.play();
        device.set_position("t0", Duration::from_secs(179));
        device.finish("t0");
        player.tick(ms(start, 10));

        assert_eq!(player.current_index(), 0);
        assert_eq!(player.status(), TransportStatus::Playing);
        assert_eq!(player.state().elapsed, Duration::ZERO);
        assert_eq!(player.bound_track_id(), Some("t0"));
    }

    #[test]
    fn rejected_start_pauses_and_retry_succeeds() {
        let (mut player, device, _) = player(2);
        device.reject_start("t0");
        player.play();

        assert_eq!(player.status(), TransportStatus::Paused);
        assert!(matches!(
            player.failure(),
            Some(PlaybackFailure::StartRejected(_))
        ));

        device.allow_start("t0");
        player.play();
        assert_eq!(player.status(), TransportStatus::Playing);
        assert!(player.failure().is_none());
        assert_eq!(device.opened(), vec![String::from("t0")]);
    }

    #[test]
    fn failed_load_skips_to_next_playable_track() {
        let (mut player, device, _) = player(3);
        device.fail_load("t0");
        player.play();

        assert_eq!(player.current_index(), 1);
        assert_eq!(player.status(), TransportStatus::Playing);
        assert_eq!(player.bound_track_id(), Some("t1"));
    }

    #[test]
    fn all_tracks_failing_stops_auto_advance() {
        let (mut player, device, _) = player(3);
        for id in ["t0", "t1", "t2"] {
            device.fail_load(id);
        }
        player.play();

        assert_eq!(player.status(), TransportStatus::Paused);
        assert!(matches!(
            player.failure(),
            Some(PlaybackFailure::LoadFailed { .. })
        ));
        assert_eq!(player.live_handles(), 0);
    }

    #[test]
    fn empty_playlist_ignores_transport() {
        let device = ScriptedDevice::new();
        let mut player = Player::new(
            playlist(0),
            Box::new(device.clone()),
            &Settings::default(),
            Instant::now(),
        );
        player.play();
        player.next();
        player.previous();
        player.seek(Duration::from_secs(5));
        player.set_mood(Mood::Angry);

        assert_eq!(player.status(), TransportStatus::Stopped);
        assert_eq!(player.mood(), Mood::Angry);
        assert!(device.opened().is_empty());
    }

    #[test]
    fn teardown_releases_everything_and_ignores_later_calls() {
        let (mut player, device, start) = player(3);
        player.play();
        player.next();
        player.teardown();

        assert!(player.is_torn_down());
        assert_eq!(player.pending_tasks(), 0);
        assert_eq!(player.live_handles(), 0);
        assert!(device.live_handles().is_empty());

        player.play();
        player.tick(ms(start, 500));
        assert!(!player.apply(Action::Next));
        assert_eq!(player.status(), TransportStatus::Stopped);
        assert!(device.live_handles().is_empty());
    }

    #[test]
    fn store_settings_keeps_audible_volume_when_zeroed() {
        let (mut player, _, _) = player(1);
        player.set_volume(0.4);
        player.set_volume(0.0);
        player.toggle_like("t0");
        player.set_mood(Mood::Sad);

        let mut settings = Settings::default();
        player.store_settings(&mut settings);
        assert!((settings.volume - 0.4).abs() < 1e-6);
        assert!(settings.muted);
        assert_eq!(settings.likes.get("t0"), Some(&true));
        assert_eq!(settings.mood, Mood::Sad);
    }
}
