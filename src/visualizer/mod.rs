mod strategies;
mod surface;

pub use strategies::{DrawContext, DrawStrategy, Ripple, STRATEGIES, strategy_for};
pub use surface::{DrawKind, DrawOp, PathSeg, PixelBuffer, Point, RecordingSurface, Rgba, Surface};

use crate::audio::Analyzer;
use crate::model::{Mood, Settings};
use crate::scheduler::{Scheduler, TaskHandle, TaskId};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::time::{Duration, Instant};

pub const MIN_BINS: usize = 8;
pub const MAX_BINS: usize = 32;
pub const MAX_FPS: u32 = 30;
pub const PULSE_LEN: usize = 5;
/// Cadence of the frame task; the throttle decides which ticks draw.
pub const FRAME_CADENCE: Duration = Duration::from_millis(16);

const IDLE_BACKGROUND: Rgba = Rgba::rgb(14, 14, 18);
const IDLE_LINE: Rgba = Rgba::rgb(90, 90, 110);

/// One snapshot of frequency bins, `MIN_BINS..=MAX_BINS` long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualizerFrame {
    bins: [u8; MAX_BINS],
    len: usize,
}

impl VisualizerFrame {
    pub fn flat(len: usize) -> Self {
        Self {
            bins: [0; MAX_BINS],
            len: len.clamp(MIN_BINS, MAX_BINS),
        }
    }

    /// Copies `values`, truncating past `MAX_BINS` and zero-padding below
    /// `MIN_BINS`.
    pub fn from_bins(values: &[u8]) -> Self {
        let mut frame = Self::flat(values.len());
        let n = values.len().min(frame.len);
        frame.bins[..n].copy_from_slice(&values[..n]);
        frame
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_silent(&self) -> bool {
        self.bins().iter().all(|&value| value == 0)
    }

    /// Averages of five contiguous bin groups, low to high.
    pub fn pulse(&self) -> [u8; PULSE_LEN] {
        let mut pulse = [0u8; PULSE_LEN];
        let bins = self.bins();
        for (slot, value) in pulse.iter_mut().enumerate() {
            let start = slot * bins.len() / PULSE_LEN;
            let end = ((slot + 1) * bins.len() / PULSE_LEN).max(start + 1);
            let group = &bins[start..end.min(bins.len())];
            let sum: u32 = group.iter().map(|&v| u32::from(v)).sum();
            *value = (sum / group.len().max(1) as u32) as u8;
        }
        pulse
    }
}

/// Allows one draw per `1 / max_fps` slot. Slots stay on a fixed grid so a
/// coarser tick cadence does not push every frame a full interval later.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    next_slot: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(max_fps: u32) -> Self {
        let fps = max_fps.clamp(1, MAX_FPS);
        Self {
            min_interval: Duration::from_secs(1) / fps,
            next_slot: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn should_draw(&mut self, now: Instant) -> bool {
        let slot = match self.next_slot {
            Some(slot) if now < slot => return false,
            // Behind by a whole slot or more: restart the grid at `now`.
            Some(slot) if now.duration_since(slot) < self.min_interval => slot,
            _ => now,
        };
        self.next_slot = Some(slot + self.min_interval);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameOutcome {
    #[default]
    None,
    Throttled,
    /// No analyzer bound: flat baseline, no strategy.
    Idle,
    Drawn(Mood),
    /// Bound analyzer not ready; previous frame drawn again.
    Reused(Mood),
    /// Bound analyzer not ready and nothing to reuse.
    Waiting(Mood),
}

pub struct Visualizer<S: Surface> {
    surface: S,
    throttle: FrameThrottle,
    bin_count: usize,
    task: Option<TaskHandle>,
    shut_down: bool,
    bound: Option<u64>,
    frame: VisualizerFrame,
    last_good: Option<VisualizerFrame>,
    pulse: [u8; PULSE_LEN],
    ripples: Vec<Ripple>,
    rng: SmallRng,
    epoch: Instant,
    last_outcome: FrameOutcome,
    drawn: u64,
}

impl<S: Surface> Visualizer<S> {
    pub fn new(surface: S, settings: &Settings, epoch: Instant) -> Self {
        let bin_count = settings.bin_count.clamp(MIN_BINS, MAX_BINS);
        Self {
            surface,
            throttle: FrameThrottle::new(settings.max_fps),
            bin_count,
            task: None,
            shut_down: false,
            bound: None,
            frame: VisualizerFrame::flat(bin_count),
            last_good: None,
            pulse: [0; PULSE_LEN],
            ripples: Vec::new(),
            rng: SmallRng::from_os_rng(),
            epoch,
            last_outcome: FrameOutcome::None,
            drawn: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn frame(&self) -> &VisualizerFrame {
        &self.frame
    }

    pub fn pulse(&self) -> [u8; PULSE_LEN] {
        self.pulse
    }

    pub fn last_outcome(&self) -> FrameOutcome {
        self.last_outcome
    }

    pub fn frames_drawn(&self) -> u64 {
        self.drawn
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn owns(&self, id: TaskId) -> bool {
        self.task.as_ref().is_some_and(|task| task.id() == id)
    }

    /// Arms the repeating frame task. No-op when running or shut down.
    pub fn start(&mut self, now: Instant, scheduler: &mut Scheduler) {
        if self.shut_down || self.task.is_some() {
            return;
        }
        self.task = Some(scheduler.repeating(now, FRAME_CADENCE));
        tracing::debug!("visualizer frame loop started");
    }

    pub fn stop(&mut self, scheduler: &mut Scheduler) {
        if let Some(task) = self.task.take() {
            scheduler.cancel(task);
            tracing::debug!("visualizer frame loop stopped");
        }
    }

    /// Stops the loop for good; later `start` calls are ignored.
    pub fn shutdown(&mut self, scheduler: &mut Scheduler) {
        self.stop(scheduler);
        self.shut_down = true;
    }

    /// Draws one frame unless throttled. `last_outcome` only tracks drawn
    /// frames.
    pub fn render(&mut self, now: Instant, analyzer: Option<&Analyzer>, mood: Mood) -> FrameOutcome {
        if self.shut_down {
            return FrameOutcome::None;
        }
        if !self.throttle.should_draw(now) {
            return FrameOutcome::Throttled;
        }

        let outcome = match analyzer {
            None => {
                self.bound = None;
                self.frame = VisualizerFrame::flat(self.bin_count);
                self.draw_idle();
                FrameOutcome::Idle
            }
            Some(analyzer) => {
                if self.bound != Some(analyzer.id()) {
                    tracing::debug!(analyzer = analyzer.id(), "visualizer bound to new analyzer");
                    self.bound = Some(analyzer.id());
                }
                let mut bins = [0u8; MAX_BINS];
                let outcome = if analyzer.frequency_data(&mut bins[..self.bin_count]) {
                    self.frame = VisualizerFrame::from_bins(&bins[..self.bin_count]);
                    self.last_good = Some(self.frame);
                    FrameOutcome::Drawn(mood)
                } else if let Some(previous) = self.last_good.take() {
                    self.frame = previous;
                    FrameOutcome::Reused(mood)
                } else {
                    self.frame = VisualizerFrame::flat(self.bin_count);
                    FrameOutcome::Waiting(mood)
                };
                self.draw_strategy(now, mood);
                outcome
            }
        };

        self.pulse = self.frame.pulse();
        self.drawn += 1;
        self.last_outcome = outcome;
        outcome
    }

    fn draw_strategy(&mut self, now: Instant, mood: Mood) {
        let mut ctx = DrawContext {
            time: now.saturating_duration_since(self.epoch).as_secs_f32(),
            rng: &mut self.rng,
            ripples: &mut self.ripples,
        };
        strategy_for(mood).draw(&mut self.surface, &self.frame, &mut ctx);
    }

    fn draw_idle(&mut self) {
        self.ripples.clear();
        self.surface.clear(IDLE_BACKGROUND);
        let (w, h) = (self.surface.width(), self.surface.height());
        let baseline = [Point::new(0.0, h / 2.0), Point::new(w, h / 2.0)];
        self.surface.stroke_polyline(&baseline, 1.0, IDLE_LINE);
    }
}

impl Visualizer<PixelBuffer> {
    pub fn resize(&mut self, w: usize, h: usize) {
        self.surface.resize(w, h);
    }
}
