use super::VisualizerFrame;
use super::surface::{PathSeg, Point, Rgba, Surface};
use crate::model::Mood;
use rand::Rng;
use rand::rngs::SmallRng;

const MAX_RIPPLES: usize = 8;

/// Expanding ring left behind by the sad strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    pub center: Point,
    pub radius: f32,
    pub alpha: f32,
}

/// Per-frame inputs shared by every strategy.
pub struct DrawContext<'a> {
    /// Seconds since the visualizer was created.
    pub time: f32,
    pub rng: &'a mut SmallRng,
    pub ripples: &'a mut Vec<Ripple>,
}

pub trait DrawStrategy {
    fn mood(&self) -> Mood;
    fn draw(&self, surface: &mut dyn Surface, frame: &VisualizerFrame, ctx: &mut DrawContext<'_>);
}

/// Strategies indexed by [`Mood::index`].
pub const STRATEGIES: [&dyn DrawStrategy; 5] = [&Happy, &Sad, &Neutral, &Anxious, &Angry];

pub fn strategy_for(mood: Mood) -> &'static dyn DrawStrategy {
    STRATEGIES[mood.index()]
}

fn level(value: u8) -> f32 {
    f32::from(value) / 255.0
}

fn slot_width(surface: &dyn Surface, frame: &VisualizerFrame) -> f32 {
    surface.width() / frame.len().max(1) as f32
}

/// Evenly spread sample points, `lift` mapping a level to a y coordinate.
fn sample_points(
    surface: &dyn Surface,
    frame: &VisualizerFrame,
    lift: impl Fn(f32) -> f32,
) -> Vec<Point> {
    let n = frame.len();
    let span = (n.saturating_sub(1)).max(1) as f32;
    frame
        .bins()
        .iter()
        .enumerate()
        .map(|(i, &value)| Point::new(i as f32 / span * surface.width(), lift(level(value))))
        .collect()
}

pub struct Happy;

impl Happy {
    const BACKGROUND: Rgba = Rgba::rgb(38, 24, 12);
    const LOW: Rgba = Rgba::rgb(255, 214, 70);
    const HIGH: Rgba = Rgba::rgb(255, 128, 48);
    const SPARKLE: Rgba = Rgba::rgb(255, 250, 220);
    const SPARKLE_THRESHOLD: u8 = 200;
}

impl DrawStrategy for Happy {
    fn mood(&self) -> Mood {
        Mood::Happy
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &VisualizerFrame, ctx: &mut DrawContext<'_>) {
        surface.clear(Self::BACKGROUND);
        let height = surface.height();
        let slot = slot_width(surface, frame);
        let gap = (slot * 0.15).max(0.5);
        let bar_w = (slot - gap * 2.0).max(1.0);
        let n = frame.len().max(1) as f32;

        for (i, &value) in frame.bins().iter().enumerate() {
            let bar_h = (level(value) * height * 0.85).max(1.0);
            let x = i as f32 * slot + gap;
            let y = height - bar_h;
            let color = Self::LOW.mix(Self::HIGH, i as f32 / n);
            surface.fill_rounded_rect(x, y, bar_w, bar_h, bar_w / 2.0, color);

            if value > Self::SPARKLE_THRESHOLD && ctx.rng.random_bool(0.5) {
                let center = Point::new(
                    x + bar_w / 2.0 + ctx.rng.random_range(-bar_w..=bar_w),
                    y - ctx.rng.random_range(2.0..=height * 0.1 + 2.0),
                );
                let alpha = ctx.rng.random_range(0.5..=1.0);
                surface.fill_circle(center, 1.2, Self::SPARKLE.with_alpha(alpha));
            }
        }
    }
}

pub struct Sad;

impl Sad {
    const BACKGROUND: Rgba = Rgba::rgb(10, 16, 34);
    const WAVE: Rgba = Rgba::rgb(70, 110, 190);
    const RIPPLE: Rgba = Rgba::rgb(150, 180, 235);
    const RIPPLE_CHANCE: f64 = 0.02;
}

impl DrawStrategy for Sad {
    fn mood(&self) -> Mood {
        Mood::Sad
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &VisualizerFrame, ctx: &mut DrawContext<'_>) {
        surface.clear(Self::BACKGROUND);
        let (width, height) = (surface.width(), surface.height());
        let points = sample_points(surface, frame, |l| height * 0.9 - l * height * 0.7);

        let mut path = Vec::with_capacity(points.len() + 4);
        path.push(PathSeg::MoveTo(Point::new(0.0, height)));
        if let Some(&first) = points.first() {
            path.push(PathSeg::LineTo(first));
        }
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            path.push(PathSeg::QuadTo(a, Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)));
        }
        if let Some(&last) = points.last() {
            path.push(PathSeg::LineTo(last));
        }
        path.push(PathSeg::LineTo(Point::new(width, height)));
        path.push(PathSeg::Close);
        surface.fill_path(&path, Self::WAVE.with_alpha(0.65));

        if ctx.ripples.len() < MAX_RIPPLES && ctx.rng.random_bool(Self::RIPPLE_CHANCE) {
            ctx.ripples.push(Ripple {
                center: Point::new(
                    ctx.rng.random_range(0.0..=width.max(1.0)),
                    ctx.rng.random_range(height * 0.3..=height * 0.7 + 0.01),
                ),
                radius: 2.0,
                alpha: 0.3,
            });
        }
        for ripple in ctx.ripples.iter_mut() {
            surface.stroke_circle(ripple.center, ripple.radius, 1.0, Self::RIPPLE.with_alpha(ripple.alpha));
            ripple.radius += 1.5;
            ripple.alpha *= 0.93;
        }
        ctx.ripples.retain(|ripple| ripple.alpha > 0.02);
    }
}

pub struct Anxious;

impl Anxious {
    const BACKGROUND: Rgba = Rgba::rgb(24, 12, 32);
    const LINE: Rgba = Rgba::rgb(186, 120, 255);
    const SPARK: Rgba = Rgba::rgb(255, 236, 140);
    const SPARK_THRESHOLD: u8 = 180;
}

impl DrawStrategy for Anxious {
    fn mood(&self) -> Mood {
        Mood::Anxious
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &VisualizerFrame, ctx: &mut DrawContext<'_>) {
        surface.clear(Self::BACKGROUND);
        let height = surface.height();
        let mid = height / 2.0;

        let mut points = sample_points(surface, frame, |l| mid - l * height * 0.4);
        for (point, &value) in points.iter_mut().zip(frame.bins()) {
            let spread = 2.0 + level(value) * 4.0;
            point.y += ctx.rng.random_range(-spread..=spread);
        }
        surface.stroke_polyline(&points, 1.5, Self::LINE);

        for (point, &value) in points.iter().zip(frame.bins()) {
            if value <= Self::SPARK_THRESHOLD {
                continue;
            }
            let tail = Point::new(
                point.x - ctx.rng.random_range(2.0..=6.0),
                point.y + ctx.rng.random_range(-4.0..=4.0),
            );
            surface.stroke_polyline(&[tail, *point], 1.0, Self::SPARK.with_alpha(0.45));
            surface.fill_circle(*point, 1.5, Self::SPARK);
        }
    }
}

pub struct Angry;

impl Angry {
    const BACKGROUND: Rgba = Rgba::rgb(20, 4, 4);
    const BASE: Rgba = Rgba::rgb(200, 24, 16);
    const TIP: Rgba = Rgba::rgb(255, 150, 30);
    const SPARK: Rgba = Rgba::rgb(255, 240, 160);
    const SPARK_THRESHOLD: u8 = 200;
    const SPARK_CHANCE: f64 = 0.3;
}

impl DrawStrategy for Angry {
    fn mood(&self) -> Mood {
        Mood::Angry
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &VisualizerFrame, ctx: &mut DrawContext<'_>) {
        surface.clear(Self::BACKGROUND);
        let height = surface.height();
        let slot = slot_width(surface, frame);

        for (i, &value) in frame.bins().iter().enumerate() {
            let l = level(value);
            let flame_h = (l * height * 0.85).max(1.0);
            let cx = (i as f32 + 0.5) * slot;
            let half = slot / 2.0;
            let sway = (ctx.time * 6.0 + i as f32).sin() * slot * 0.15;
            let tip = Point::new(cx + sway, height - flame_h);

            let path = [
                PathSeg::MoveTo(Point::new(cx - half, height)),
                PathSeg::CubicTo(
                    Point::new(cx - half, height - flame_h * 0.5),
                    Point::new(cx - slot * 0.1 + sway, height - flame_h * 0.8),
                    tip,
                ),
                PathSeg::CubicTo(
                    Point::new(cx + slot * 0.1 + sway, height - flame_h * 0.8),
                    Point::new(cx + half, height - flame_h * 0.5),
                    Point::new(cx + half, height),
                ),
                PathSeg::Close,
            ];
            surface.fill_path(&path, Self::BASE.mix(Self::TIP, l).with_alpha(0.85));

            if value > Self::SPARK_THRESHOLD && ctx.rng.random_bool(Self::SPARK_CHANCE) {
                let center = Point::new(
                    cx + ctx.rng.random_range(-half..=half),
                    tip.y - ctx.rng.random_range(0.0..=height * 0.1),
                );
                surface.fill_circle(center, 1.3, Self::SPARK);
            }
        }
    }
}

pub struct Neutral;

impl Neutral {
    const BACKGROUND: Rgba = Rgba::rgb(18, 22, 26);
    const BAR: Rgba = Rgba::rgb(120, 170, 170);
}

impl DrawStrategy for Neutral {
    fn mood(&self) -> Mood {
        Mood::Neutral
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &VisualizerFrame, ctx: &mut DrawContext<'_>) {
        surface.clear(Self::BACKGROUND);
        let height = surface.height();
        let slot = slot_width(surface, frame);
        let gap = (slot * 0.1).max(0.5);

        for (i, &value) in frame.bins().iter().enumerate() {
            let wave = ((ctx.time * 1.5 + i as f32 * 0.5).sin() + 1.0) / 2.0;
            let bar_h = (level(value) * height * 0.8 + wave * height * 0.08).max(1.0);
            surface.fill_rect(
                i as f32 * slot + gap,
                height - bar_h,
                (slot - gap * 2.0).max(1.0),
                bar_h,
                Self::BAR,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::surface::{DrawKind, RecordingSurface};
    use rand::SeedableRng;

    fn frame(value: u8) -> VisualizerFrame {
        VisualizerFrame::from_bins(&[value; 16])
    }

    fn draw(mood: Mood, frame: &VisualizerFrame, rng: &mut SmallRng, ripples: &mut Vec<Ripple>, time: f32) -> RecordingSurface {
        let mut surface = RecordingSurface::new(160.0, 48.0);
        let mut ctx = DrawContext { time, rng, ripples };
        strategy_for(mood).draw(&mut surface, frame, &mut ctx);
        surface
    }

    #[test]
    fn table_is_ordered_by_mood_index() {
        for mood in Mood::ALL {
            assert_eq!(strategy_for(mood).mood(), mood);
        }
    }

    #[test]
    fn happy_draws_rounded_bars_and_sparkles_only_on_loud_bins() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut ripples = Vec::new();

        let quiet = draw(Mood::Happy, &frame(150), &mut rng, &mut ripples, 0.0);
        assert_eq!(quiet.count(DrawKind::RoundedRect), 16);
        assert_eq!(quiet.count(DrawKind::Circle), 0);

        let loud = draw(Mood::Happy, &frame(240), &mut rng, &mut ripples, 0.0);
        assert!(loud.count(DrawKind::Circle) > 0);
        assert!(loud.count(DrawKind::Circle) <= 16);
    }

    #[test]
    fn sad_draws_one_wave_and_ripples_expand_then_fade() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut ripples = vec![Ripple {
            center: Point::new(10.0, 10.0),
            radius: 2.0,
            alpha: 0.3,
        }];

        let surface = draw(Mood::Sad, &frame(100), &mut rng, &mut ripples, 0.0);
        assert_eq!(surface.count(DrawKind::Path), 1);
        assert!(surface.count(DrawKind::Ring) >= 1);
        assert!(ripples[0].radius > 2.0);

        for _ in 0..200 {
            draw(Mood::Sad, &frame(100), &mut rng, &mut ripples, 0.0);
        }
        assert!(ripples.len() <= MAX_RIPPLES);
        assert!(ripples.iter().all(|ripple| ripple.alpha > 0.02));
    }

    #[test]
    fn anxious_sparks_follow_threshold() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut ripples = Vec::new();

        let calm = draw(Mood::Anxious, &frame(180), &mut rng, &mut ripples, 0.0);
        assert_eq!(calm.count(DrawKind::Polyline), 1);
        assert_eq!(calm.count(DrawKind::Circle), 0);

        let tense = draw(Mood::Anxious, &frame(181), &mut rng, &mut ripples, 0.0);
        assert_eq!(tense.count(DrawKind::Circle), 16);
        assert_eq!(tense.count(DrawKind::Polyline), 17);
    }

    #[test]
    fn angry_draws_a_flame_per_bin() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut ripples = Vec::new();
        let surface = draw(Mood::Angry, &frame(90), &mut rng, &mut ripples, 1.0);
        assert_eq!(surface.count(DrawKind::Path), 16);
        assert_eq!(surface.count(DrawKind::Circle), 0);
    }

    #[test]
    fn neutral_bars_move_with_time_on_silence() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut ripples = Vec::new();
        let silent = VisualizerFrame::flat(16);

        let mut buffer_a = crate::visualizer::PixelBuffer::new(64, 32);
        let mut buffer_b = crate::visualizer::PixelBuffer::new(64, 32);
        let mut ctx = DrawContext { time: 0.0, rng: &mut rng, ripples: &mut ripples };
        Neutral.draw(&mut buffer_a, &silent, &mut ctx);
        ctx.time = 1.0;
        Neutral.draw(&mut buffer_b, &silent, &mut ctx);

        assert_ne!(buffer_a.as_bytes(), buffer_b.as_bytes());
        let surface = draw(Mood::Neutral, &silent, &mut rng, &mut ripples, 0.0);
        assert_eq!(surface.count(DrawKind::Rect), 16);
    }
}
