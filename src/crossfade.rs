use crate::audio::{AudioGraph, PreparedSource};
use crate::model::{Settings, Track};
use crate::scheduler::{Scheduler, TaskHandle, TaskId};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeTimings {
    pub fade_out: Duration,
    pub fade_in: Duration,
    pub step: Duration,
    pub settle: Duration,
}

impl FadeTimings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fade_out: Duration::from_millis(settings.fade_out_ms),
            fade_in: Duration::from_millis(settings.fade_in_ms),
            step: Duration::from_millis(settings.fade_step_ms.max(1)),
            settle: Duration::from_millis(settings.settle_ms),
        }
    }

    fn steps(&self, window: Duration) -> u32 {
        let step = self.step.as_millis().max(1);
        let steps = window.as_millis().div_ceil(step).max(1);
        u32::try_from(steps).unwrap_or(u32::MAX)
    }

    /// Time from `start` to a fully faded-in incoming handle.
    pub fn total(&self) -> Duration {
        self.step * self.steps(self.fade_out) + self.settle + self.step * self.steps(self.fade_in)
    }
}

impl Default for FadeTimings {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    FadingOut { from: f32, step: u32, steps: u32 },
    Settling,
    FadingIn { step: u32, steps: u32 },
}

/// Track waiting for the settle delay to pass before it is opened.
#[derive(Debug, Clone)]
pub(crate) struct Incoming {
    pub track: Track,
    pub prepared: Option<PreparedSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeOutcome {
    Pending,
    Completed,
    /// The incoming handle failed to open or start. The graph has already
    /// reported the failure on its event channel.
    Aborted,
}

/// Drives the fade-out / settle / fade-in ramp between two handles.
///
/// Holds at most one scheduler task at a time. Every path that leaves a
/// phase cancels that task before arming the next one, so a superseded or
/// cancelled transition never touches a handle again.
#[derive(Debug)]
pub struct CrossfadeManager {
    timings: FadeTimings,
    phase: Phase,
    task: Option<TaskHandle>,
    incoming: Option<Incoming>,
    target: f32,
}

impl CrossfadeManager {
    pub fn new(timings: FadeTimings) -> Self {
        Self {
            timings,
            phase: Phase::Idle,
            task: None,
            incoming: None,
            target: 0.0,
        }
    }

    pub fn timings(&self) -> FadeTimings {
        self.timings
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn is_fading_in(&self) -> bool {
        matches!(self.phase, Phase::FadingIn { .. })
    }

    pub fn owns(&self, id: TaskId) -> bool {
        self.task.as_ref().is_some_and(|task| task.id() == id)
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Starts a transition to `track`, superseding any one in flight.
    pub(crate) fn start(
        &mut self,
        now: Instant,
        scheduler: &mut Scheduler,
        graph: &mut AudioGraph,
        track: Track,
        prepared: Option<PreparedSource>,
        target: f32,
    ) {
        if self.is_active() {
            tracing::debug!(phase = ?self.phase, "superseding in-flight transition");
        }
        self.clear_task(scheduler);
        graph.release_outgoing();

        tracing::debug!(track = %track.id, target, "crossfade started");
        self.target = target.clamp(0.0, 1.0);
        self.incoming = Some(Incoming { track, prepared });

        match graph.begin_fade_out() {
            Some(from) if from > 0.0 => {
                self.phase = Phase::FadingOut {
                    from,
                    step: 0,
                    steps: self.timings.steps(self.timings.fade_out),
                };
                self.task = Some(scheduler.repeating(now, self.timings.step));
            }
            _ => {
                graph.release_outgoing();
                self.begin_settle(now, scheduler);
            }
        }
    }

    /// Advances the ramp when `id` is this manager's task.
    pub(crate) fn on_timer(
        &mut self,
        id: TaskId,
        now: Instant,
        scheduler: &mut Scheduler,
        graph: &mut AudioGraph,
    ) -> CrossfadeOutcome {
        if !self.owns(id) {
            return CrossfadeOutcome::Pending;
        }

        match self.phase {
            Phase::Idle => {
                self.clear_task(scheduler);
                CrossfadeOutcome::Pending
            }
            Phase::FadingOut { from, step, steps } => {
                let step = step + 1;
                if step >= steps {
                    graph.set_outgoing_volume(0.0);
                    graph.release_outgoing();
                    self.clear_task(scheduler);
                    self.begin_settle(now, scheduler);
                } else {
                    graph.set_outgoing_volume(from * (1.0 - step as f32 / steps as f32));
                    self.phase = Phase::FadingOut { from, step, steps };
                }
                CrossfadeOutcome::Pending
            }
            Phase::Settling => {
                self.clear_task(scheduler);
                self.begin_fade_in(now, scheduler, graph)
            }
            Phase::FadingIn { step, steps } => {
                let step = step + 1;
                if step >= steps {
                    graph.set_volume(self.target);
                    self.clear_task(scheduler);
                    self.phase = Phase::Idle;
                    tracing::debug!(volume = self.target, "crossfade completed");
                    CrossfadeOutcome::Completed
                } else {
                    graph.set_volume(self.target * step as f32 / steps as f32);
                    self.phase = Phase::FadingIn { step, steps };
                    CrossfadeOutcome::Pending
                }
            }
        }
    }

    /// Changes the volume the fade-in lands on. Applies from the next step.
    pub(crate) fn retarget(&mut self, target: f32) {
        self.target = target.clamp(0.0, 1.0);
    }

    /// Stops the transition where it stands: the ramp task is cancelled, the
    /// outgoing handle released and a fading-in handle snapped to target.
    /// Returns the incoming track if it was never opened.
    pub(crate) fn cancel(
        &mut self,
        scheduler: &mut Scheduler,
        graph: &mut AudioGraph,
    ) -> Option<Incoming> {
        self.clear_task(scheduler);
        graph.release_outgoing();
        if self.is_fading_in() {
            graph.set_volume(self.target);
        }
        if self.is_active() {
            tracing::debug!(phase = ?self.phase, "crossfade cancelled");
        }
        self.phase = Phase::Idle;
        self.incoming.take()
    }

    fn begin_settle(&mut self, now: Instant, scheduler: &mut Scheduler) {
        self.phase = Phase::Settling;
        self.task = Some(scheduler.once(now, self.timings.settle));
    }

    fn begin_fade_in(
        &mut self,
        now: Instant,
        scheduler: &mut Scheduler,
        graph: &mut AudioGraph,
    ) -> CrossfadeOutcome {
        self.phase = Phase::Idle;
        let Some(Incoming { track, prepared }) = self.incoming.take() else {
            return CrossfadeOutcome::Aborted;
        };

        if graph.load(&track, prepared, 0.0).is_err() {
            return CrossfadeOutcome::Aborted;
        }
        if graph.start().is_err() {
            graph.set_volume(self.target);
            return CrossfadeOutcome::Aborted;
        }
        if self.target <= 0.0 {
            return CrossfadeOutcome::Completed;
        }

        self.phase = Phase::FadingIn {
            step: 0,
            steps: self.timings.steps(self.timings.fade_in),
        };
        self.task = Some(scheduler.repeating(now, self.timings.step));
        CrossfadeOutcome::Pending
    }

    fn clear_task(&mut self, scheduler: &mut Scheduler) {
        if let Some(task) = self.task.take() {
            scheduler.cancel(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioEvent, ScriptedDevice};
    use std::path::PathBuf;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: id.to_string(),
            artist: String::from("artist"),
            duration: Some(Duration::from_secs(120)),
            source: PathBuf::from(format!("{id}.ogg")),
            cover: None,
        }
    }

    struct Rig {
        device: ScriptedDevice,
        graph: AudioGraph,
        scheduler: Scheduler,
        fade: CrossfadeManager,
        start: Instant,
        events: std::sync::mpsc::Receiver<AudioEvent>,
    }

    impl Rig {
        fn playing(id: &str, volume: f32) -> Self {
            let device = ScriptedDevice::new();
            let (mut graph, events) = AudioGraph::new(Box::new(device.clone()));
            graph.load(&track(id), None, volume).expect("load");
            graph.start().expect("start");
            Self {
                device,
                graph,
                scheduler: Scheduler::new(),
                fade: CrossfadeManager::new(FadeTimings::default()),
                start: Instant::now(),
                events,
            }
        }

        fn begin(&mut self, id: &str, at_ms: u64, target: f32) {
            let now = self.start + Duration::from_millis(at_ms);
            self.fade.start(
                now,
                &mut self.scheduler,
                &mut self.graph,
                track(id),
                None,
                target,
            );
        }

        fn run_until(&mut self, until_ms: u64) -> Vec<CrossfadeOutcome> {
            let mut outcomes = Vec::new();
            for ms in 0..=until_ms {
                let now = self.start + Duration::from_millis(ms);
                for id in self.scheduler.poll(now) {
                    outcomes.push(self.fade.on_timer(
                        id,
                        now,
                        &mut self.scheduler,
                        &mut self.graph,
                    ));
                }
            }
            outcomes
        }
    }

    #[test]
    fn fade_out_ramps_down_in_steps_then_releases() {
        let mut rig = Rig::playing("a", 0.6);
        rig.begin("b", 0, 0.6);

        rig.run_until(299);
        let outgoing = rig.device.live_handles();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].track_id, "a");
        assert_eq!(outgoing[0].volume_history.len(), 6);
        let last = *outgoing[0].volume_history.last().expect("ramp steps");
        assert!((last - 0.1).abs() < 1e-4, "fifth step leaves 1/6 of 0.6, got {last}");

        rig.run_until(300);
        assert!(rig.device.live_handles().is_empty());
        assert!(!rig.graph.has_outgoing());
    }

    #[test]
    fn incoming_opens_after_settle_and_reaches_target() {
        let mut rig = Rig::playing("a", 0.7);
        rig.begin("b", 0, 0.7);

        rig.run_until(399);
        assert!(rig.device.live_handles().is_empty());

        let outcomes = rig.run_until(rig.fade.timings().total().as_millis() as u64);
        assert_eq!(outcomes.last(), Some(&CrossfadeOutcome::Completed));
        let live = rig.device.live_handles();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].track_id, "b");
        assert_eq!(live[0].volume_history.first(), Some(&0.0));
        assert!((live[0].volume - 0.7).abs() < f32::EPSILON);
        assert!(live[0].playing);
        assert_eq!(rig.scheduler.active_count(), 0);
        assert!(!rig.fade.is_active());
    }

    #[test]
    fn silent_current_skips_fade_out() {
        let mut rig = Rig::playing("a", 0.0);
        rig.begin("b", 0, 0.5);
        assert!(rig.device.live_handles().is_empty());

        let outcomes = rig.run_until(100);
        assert_eq!(outcomes, vec![CrossfadeOutcome::Pending]);
        assert_eq!(rig.graph.current_track_id(), Some("b"));
    }

    #[test]
    fn superseding_during_fade_in_fades_partial_handle_out() {
        let mut rig = Rig::playing("a", 0.8);
        rig.begin("b", 0, 0.8);
        rig.run_until(500);
        let partial = rig.graph.current_volume().expect("b is fading in");
        assert!(partial > 0.0 && partial < 0.8);

        rig.begin("c", 500, 0.8);
        assert_eq!(rig.graph.current_track_id(), None);
        assert!(rig.graph.has_outgoing());
        assert_eq!(rig.scheduler.active_count(), 1);

        rig.run_until(2000);
        let live = rig.device.live_handles();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].track_id, "c");
        assert_eq!(rig.scheduler.active_count(), 0);
    }

    #[test]
    fn cancel_snaps_fade_in_and_releases_outgoing() {
        let mut rig = Rig::playing("a", 0.5);
        rig.begin("b", 0, 0.5);
        rig.run_until(520);

        let pending = rig.fade.cancel(&mut rig.scheduler, &mut rig.graph);
        assert!(pending.is_none());
        assert_eq!(rig.graph.current_volume(), Some(0.5));
        assert_eq!(rig.scheduler.active_count(), 0);
        assert!(!rig.fade.is_active());
    }

    #[test]
    fn cancel_before_settle_returns_unopened_track() {
        let mut rig = Rig::playing("a", 0.5);
        rig.begin("b", 0, 0.5);
        rig.run_until(120);

        let pending = rig.fade.cancel(&mut rig.scheduler, &mut rig.graph);
        assert_eq!(pending.map(|incoming| incoming.track.id), Some(String::from("b")));
        assert!(rig.device.live_handles().is_empty());
        assert_eq!(rig.scheduler.active_count(), 0);
    }

    #[test]
    fn failed_incoming_load_aborts_without_leaking() {
        let mut rig = Rig::playing("a", 0.5);
        rig.device.fail_load("b");
        rig.begin("b", 0, 0.5);

        let outcomes = rig.run_until(1000);
        assert_eq!(outcomes.last(), Some(&CrossfadeOutcome::Aborted));
        assert_eq!(rig.graph.live_handles(), 0);
        assert_eq!(rig.scheduler.active_count(), 0);
        assert!(rig
            .events
            .try_iter()
            .any(|event| matches!(event, AudioEvent::LoadFailed { track_id, .. } if track_id == "b")));
    }

    #[test]
    fn retarget_changes_landing_volume() {
        let mut rig = Rig::playing("a", 0.5);
        rig.begin("b", 0, 0.5);
        rig.run_until(450);
        rig.fade.retarget(0.2);
        rig.run_until(1000);
        assert_eq!(rig.graph.current_volume(), Some(0.2));
    }

    #[test]
    fn foreign_task_ids_are_ignored() {
        let mut rig = Rig::playing("a", 0.5);
        let other = rig.scheduler.once(rig.start, Duration::ZERO);
        let outcome = rig.fade.on_timer(
            other.id(),
            rig.start,
            &mut rig.scheduler,
            &mut rig.graph,
        );
        assert_eq!(outcome, CrossfadeOutcome::Pending);
        assert_eq!(rig.graph.current_volume(), Some(0.5));
    }
}
