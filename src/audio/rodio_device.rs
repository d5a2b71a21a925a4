use super::{Analyzer, AnalyzerTap, AudioDevice, AudioError, AudioHandle, PreparedSource};
use crate::model::Track;
use anyhow::{Context, Result};
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::{self, File};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// System audio output through rodio/cpal. Each handle gets its own sink
/// on the shared mixer so two handles can overlap during a crossfade.
pub struct RodioDevice {
    stream: OutputStream,
    output_name: String,
}

impl RodioDevice {
    pub fn new() -> Result<Self> {
        let (stream, output_name) = open_output_stream()?;
        Ok(Self {
            stream,
            output_name,
        })
    }

    fn attach<S>(&self, source: S, track: &Track) -> RodioHandle
    where
        S: Source + Send + 'static,
    {
        let duration = source
            .total_duration()
            .filter(|duration| !duration.is_zero())
            .or(track.duration);
        let (tap, analyzer) = AnalyzerTap::new(source);
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.append(tap);

        RodioHandle {
            track_id: track.id.clone(),
            sink,
            analyzer,
            duration,
            volume: 1.0,
        }
    }
}

impl AudioDevice for RodioDevice {
    fn name(&self) -> String {
        self.output_name.clone()
    }

    fn supports_analysis(&self) -> bool {
        true
    }

    fn prepare(&self, track: &Track) -> Result<PreparedSource, AudioError> {
        let bytes = fs::read(&track.source).map_err(|err| AudioError::Load {
            path: track.source.clone(),
            reason: err.to_string(),
        })?;
        Ok(PreparedSource::new(
            track.id.clone(),
            Some(Arc::from(bytes.into_boxed_slice())),
        ))
    }

    fn open(
        &mut self,
        track: &Track,
        prepared: Option<PreparedSource>,
    ) -> Result<Box<dyn AudioHandle>, AudioError> {
        let load_error = |reason: String| AudioError::Load {
            path: track.source.clone(),
            reason,
        };

        if let Some(bytes) = prepared.as_ref().and_then(|source| source.bytes()) {
            let source = Decoder::new(Cursor::new(Arc::clone(bytes)))
                .map_err(|err| load_error(format!("failed to decode: {err}")))?;
            return Ok(Box::new(self.attach(source, track)));
        }

        let file = File::open(&track.source)
            .map_err(|err| load_error(format!("failed to open: {err}")))?;
        let source =
            Decoder::try_from(file).map_err(|err| load_error(format!("failed to decode: {err}")))?;
        Ok(Box::new(self.attach(source, track)))
    }
}

struct RodioHandle {
    track_id: String,
    sink: Sink,
    analyzer: Analyzer,
    duration: Option<Duration>,
    volume: f32,
}

impl AudioHandle for RodioHandle {
    fn track_id(&self) -> &str {
        &self.track_id
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if self.sink.empty() {
            return Err(AudioError::StartRejected(String::from(
                "nothing queued on the output sink",
            )));
        }
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn seek(&mut self, position: Duration) -> Result<(), AudioError> {
        self.sink
            .try_seek(position)
            .map_err(|err| AudioError::Seek(format!("{err:?}")))
    }

    fn is_finished(&self) -> bool {
        !self.sink.is_paused() && self.sink.empty()
    }

    fn analyzer(&self) -> Option<Analyzer> {
        Some(self.analyzer.clone())
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

fn open_output_stream() -> Result<(OutputStream, String)> {
    let (mut stream, name) = with_silenced_stderr(|| {
        let default = OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            });
        match default {
            Ok(stream) => Ok((stream, String::from("System default output"))),
            Err(default_err) => open_fallback_stream().with_context(|| {
                format!("unable to start any audio output stream after default failed: {default_err:#}")
            }),
        }
    })?;
    stream.log_on_drop(false);
    tracing::info!(output = %name, "audio output stream opened");
    Ok((stream, name))
}

fn open_fallback_stream() -> Result<(OutputStream, String)> {
    let host = rodio::cpal::default_host();
    let mut candidates: Vec<String> = host
        .output_devices()
        .ok()
        .into_iter()
        .flatten()
        .filter_map(|device| device.name().ok())
        .collect();
    candidates.sort_by_cached_key(|name| {
        let lower = name.to_ascii_lowercase();
        let rank = if lower.contains("pulse") {
            0_u8
        } else if lower.contains("pipewire") {
            1_u8
        } else if lower.contains("default") {
            2_u8
        } else {
            3_u8
        };
        (rank, lower)
    });
    candidates.dedup();

    for candidate in candidates {
        let Some(device) = host
            .output_devices()
            .ok()
            .into_iter()
            .flatten()
            .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
        else {
            continue;
        };
        let opened = OutputStreamBuilder::from_device(device)
            .context("failed to open fallback output device")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start fallback output stream")
            });
        match opened {
            Ok(stream) => return Ok((stream, candidate)),
            Err(err) => tracing::debug!(device = %candidate, "fallback output failed: {err:#}"),
        }
    }

    anyhow::bail!("no output device could be started")
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}
