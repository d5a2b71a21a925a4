use rodio::Source;
use rodio::source::SeekError;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const RING_CAPACITY: usize = 4096;
const FFT_SIZE: usize = 1024;
const MIN_READY_FRAMES: usize = 256;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

static NEXT_ANALYZER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct SampleRing {
    samples: VecDeque<f32>,
    channels: usize,
}

/// Read-only frequency view over the samples flowing through one handle.
#[derive(Clone)]
pub struct Analyzer {
    id: u64,
    ring: Arc<Mutex<SampleRing>>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer").field("id", &self.id).finish()
    }
}

impl Analyzer {
    pub fn new(channels: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            id: NEXT_ANALYZER_ID.fetch_add(1, Ordering::Relaxed),
            ring: Arc::new(Mutex::new(SampleRing {
                samples: VecDeque::with_capacity(RING_CAPACITY),
                channels: channels.max(1),
            })),
            fft: planner.plan_fft_forward(FFT_SIZE),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Appends interleaved samples, dropping the oldest past capacity.
    pub fn push_samples(&self, samples: &[f32]) {
        if let Ok(mut ring) = self.ring.lock() {
            for sample in samples {
                push_bounded(&mut ring.samples, *sample);
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ring
            .lock()
            .map(|ring| ring.samples.len() / ring.channels >= MIN_READY_FRAMES)
            .unwrap_or(false)
    }

    /// Fills `out` with log-spaced magnitudes scaled to 0..=255.
    ///
    /// Returns `false` and leaves `out` untouched until enough audio has
    /// passed through the tap.
    pub fn frequency_data(&self, out: &mut [u8]) -> bool {
        if out.is_empty() {
            return false;
        }

        let mono = {
            let Ok(ring) = self.ring.lock() else {
                return false;
            };
            let channels = ring.channels;
            let frames = ring.samples.len() / channels;
            if frames < MIN_READY_FRAMES {
                return false;
            }
            let take = frames.min(FFT_SIZE);
            let skip = (frames - take) * channels;
            let mut mono = Vec::with_capacity(take);
            let mut iter = ring.samples.iter().skip(skip);
            for _ in 0..take {
                let mut sum = 0.0;
                for _ in 0..channels {
                    sum += iter.next().copied().unwrap_or(0.0);
                }
                mono.push(sum / channels as f32);
            }
            mono
        };

        let window_len = mono.len();
        let mut buffer: Vec<Complex<f32>> = mono
            .iter()
            .enumerate()
            .map(|(i, sample)| {
                let w = 0.5
                    * (1.0
                        - (2.0 * std::f32::consts::PI * i as f32 / (window_len as f32 - 1.0))
                            .cos());
                Complex::new(sample * w, 0.0)
            })
            .collect();
        buffer.resize(FFT_SIZE, Complex::new(0.0, 0.0));
        self.fft.process(&mut buffer);

        let half = FFT_SIZE / 2;
        let magnitudes: Vec<f32> = buffer[..half]
            .iter()
            .map(|c| c.norm() / FFT_SIZE as f32)
            .collect();

        let bins = out.len();
        for (index, slot) in out.iter_mut().enumerate() {
            let lo = log_edge(index, bins, half).clamp(1, half - 1);
            let hi = log_edge(index + 1, bins, half).clamp(lo + 1, half);
            let avg = magnitudes[lo..hi].iter().sum::<f32>() / (hi - lo) as f32;
            *slot = to_byte(avg);
        }
        true
    }
}

fn log_edge(index: usize, bins: usize, half: usize) -> usize {
    let frac = index as f32 / bins as f32;
    (half as f32).powf(frac) as usize
}

fn to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

fn push_bounded(samples: &mut VecDeque<f32>, sample: f32) {
    if samples.len() >= RING_CAPACITY {
        samples.pop_front();
    }
    samples.push_back(sample);
}

/// Source wrapper that copies every sample into an [`Analyzer`] without
/// altering what reaches the sink.
pub struct AnalyzerTap<S> {
    inner: S,
    ring: Arc<Mutex<SampleRing>>,
}

impl<S> AnalyzerTap<S>
where
    S: Source,
{
    pub fn new(source: S) -> (Self, Analyzer) {
        let analyzer = Analyzer::new(usize::from(source.channels()));
        let tap = Self {
            inner: source,
            ring: Arc::clone(&analyzer.ring),
        };
        (tap, analyzer)
    }
}

impl<S> Iterator for AnalyzerTap<S>
where
    S: Source,
{
    type Item = rodio::Sample;

    fn next(&mut self) -> Option<rodio::Sample> {
        let sample = self.inner.next()?;
        if let Ok(mut ring) = self.ring.try_lock() {
            push_bounded(&mut ring.samples, sample);
        }
        Some(sample)
    }
}

impl<S> Source for AnalyzerTap<S>
where
    S: Source,
{
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.inner.channels()
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        if let Ok(mut ring) = self.ring.lock() {
            ring.samples.clear();
        }
        self.inner.try_seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / rate).sin() * 0.8)
            .collect()
    }

    #[test]
    fn not_ready_until_enough_samples() {
        let analyzer = Analyzer::new(1);
        let mut bins = [7_u8; 16];
        analyzer.push_samples(&[0.5; 100]);
        assert!(!analyzer.frequency_data(&mut bins));
        assert_eq!(bins, [7_u8; 16], "bins must stay untouched when not ready");
    }

    #[test]
    fn silence_maps_to_zero() {
        let analyzer = Analyzer::new(2);
        analyzer.push_samples(&[0.0; 2048]);
        let mut bins = [9_u8; 16];
        assert!(analyzer.frequency_data(&mut bins));
        assert!(bins.iter().all(|bin| *bin == 0));
    }

    #[test]
    fn low_tone_lights_low_bins_more_than_high_bins() {
        let analyzer = Analyzer::new(1);
        analyzer.push_samples(&sine(220.0, 44_100.0, 2048));
        let mut bins = [0_u8; 16];
        assert!(analyzer.frequency_data(&mut bins));

        let low = bins[..8].iter().map(|v| u32::from(*v)).max().unwrap_or(0);
        let high = bins[14..].iter().map(|v| u32::from(*v)).max().unwrap_or(0);
        assert!(low > high, "low={low} high={high} bins={bins:?}");
    }

    #[test]
    fn analyzers_get_distinct_ids() {
        assert_ne!(Analyzer::new(1).id(), Analyzer::new(1).id());
    }
}
