use crate::model::{Mood, Track};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    pub at: Option<Duration>,
    pub text: String,
}

/// Display-only text lines for a track or mood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricCue {
    pub lines: Vec<LyricLine>,
    pub timed: bool,
}

impl LyricCue {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line for a playback fraction; out-of-range fractions clamp.
    pub fn line_at(&self, progress: f32) -> Option<&str> {
        let index = self.index_at(progress)?;
        self.lines.get(index).map(|line| line.text.as_str())
    }

    pub fn index_at(&self, progress: f32) -> Option<usize> {
        if self.lines.is_empty() {
            return None;
        }
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let index = (progress * self.lines.len() as f32) as usize;
        Some(index.min(self.lines.len() - 1))
    }

    /// Timed cues follow their timestamps; untimed ones fall back to the
    /// progress fraction.
    pub fn line_for(&self, elapsed: Duration, duration: Option<Duration>) -> Option<&str> {
        if self.timed {
            return self
                .lines
                .iter()
                .take_while(|line| line.at.is_none_or(|at| at <= elapsed))
                .last()
                .or_else(|| self.lines.first())
                .map(|line| line.text.as_str());
        }
        let progress = match duration {
            Some(duration) if !duration.is_zero() => {
                elapsed.as_secs_f32() / duration.as_secs_f32()
            }
            _ => 0.0,
        };
        self.line_at(progress)
    }
}

const HAPPY: &str = "\
Windows open, the morning spills in
Every street is humming along
Hands up, the chorus comes around again
Nothing heavy, nothing wrong
Sun on the dashboard, turn it up";

const SAD: &str = "\
Rain keeps time against the glass
Your coat still hangs beside the door
I count the steps the quiet takes
And wait for something I can't name
Slow now, let the evening fall";

const NEUTRAL: &str = "\
Coffee cooling on the sill
A train goes by, the hour turns
Nothing to chase, nowhere to be
Just the sound and the room
Breathing in the middle of the day";

const ANXIOUS: &str = "\
Clock hands racing in my chest
Every message left on read
Count to four and count again
Walls lean in, the lights too bright
Hold on, the wave will pass";

const ANGRY: &str = "\
Fists of static on the wire
Burn the letter, break the chain
Louder than the thing they said
Every drum a door slammed shut
Let it out and let it burn";

/// Built-in cue shown when a track has no lyrics of its own.
pub fn cue_for(mood: Mood) -> LyricCue {
    let text = match mood {
        Mood::Happy => HAPPY,
        Mood::Sad => SAD,
        Mood::Neutral => NEUTRAL,
        Mood::Anxious => ANXIOUS,
        Mood::Angry => ANGRY,
    };
    parse_plain_text(text)
}

pub fn sidecar_paths(track_path: &Path) -> [PathBuf; 2] {
    [
        track_path.with_extension("lrc"),
        track_path.with_extension("txt"),
    ]
}

/// Reads a `.lrc` or `.txt` file next to the track, if there is one.
pub fn load_for_track(track: &Track) -> Result<Option<LyricCue>> {
    for path in sidecar_paths(&track.source) {
        if !path.exists() {
            continue;
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read lyrics file {}", path.display()))?;
        let cue = if looks_like_lrc(&raw) {
            parse_lrc(&raw)
        } else {
            parse_plain_text(&raw)
        };
        if !cue.is_empty() {
            return Ok(Some(cue));
        }
    }
    Ok(None)
}

pub fn parse_plain_text(input: &str) -> LyricCue {
    let lines = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| LyricLine {
            at: None,
            text: line.to_string(),
        })
        .collect();

    LyricCue {
        lines,
        timed: false,
    }
}

pub fn parse_lrc(input: &str) -> LyricCue {
    let mut lines = Vec::new();
    let mut timed = false;

    for raw_line in input.lines() {
        let line = raw_line.trim_end();
        if line.is_empty() || is_metadata_lrc_line(line) {
            continue;
        }

        let (timestamps, rest) = parse_line_timestamps(line);
        let text = strip_word_timestamps(rest);
        if timestamps.is_empty() {
            lines.push(LyricLine { at: None, text });
            continue;
        }

        timed = true;
        for ms in timestamps {
            lines.push(LyricLine {
                at: Some(Duration::from_millis(u64::from(ms))),
                text: text.clone(),
            });
        }
    }

    lines.sort_by_key(|line| line.at.unwrap_or(Duration::MAX));
    LyricCue { lines, timed }
}

fn looks_like_lrc(input: &str) -> bool {
    input.lines().any(|line| {
        let trimmed = line.trim_start();
        trimmed.starts_with('[') && !parse_line_timestamps(trimmed).0.is_empty()
    })
}

fn is_metadata_lrc_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    ["[ar:", "[ti:", "[al:", "[by:", "[offset:", "[length:"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

fn parse_line_timestamps(input: &str) -> (Vec<u32>, &str) {
    let mut remaining = input;
    let mut out = Vec::new();

    while remaining.starts_with('[') {
        let Some(closing_idx) = remaining.find(']') else {
            break;
        };
        let Some(ms) = parse_timestamp(&remaining[1..closing_idx]) else {
            break;
        };
        out.push(ms);
        remaining = &remaining[closing_idx + 1..];
    }

    (out, remaining.trim_start())
}

/// `mm:ss` with an optional `.xx` fraction, in milliseconds.
fn parse_timestamp(content: &str) -> Option<u32> {
    let (minutes, seconds_part) = content.split_once(':')?;
    let minutes = minutes.parse::<u32>().ok()?;
    let (seconds, fraction) = seconds_part
        .split_once('.')
        .unwrap_or((seconds_part, ""));
    let seconds = seconds.parse::<u32>().ok()?;

    let hundredths = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u32>().ok()?.saturating_mul(10),
        _ => fraction.get(..2)?.parse::<u32>().ok()?,
    };

    Some(
        minutes
            .saturating_mul(60_000)
            .saturating_add(seconds.saturating_mul(1000))
            .saturating_add(hundredths.saturating_mul(10)),
    )
}

/// Drops enhanced-LRC `<mm:ss.xx>` word tags, keeping any other markup.
fn strip_word_timestamps(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut remaining = input;

    while let Some(open_idx) = remaining.find('<') {
        out.push_str(&remaining[..open_idx]);
        let tail = &remaining[open_idx..];
        let Some(close_idx) = tail.find('>') else {
            out.push_str(tail);
            remaining = "";
            break;
        };
        if parse_timestamp(&tail[1..close_idx]).is_none() {
            out.push_str(&tail[..=close_idx]);
        }
        remaining = &tail[close_idx + 1..];
    }
    out.push_str(remaining);

    out.trim().to_string()
}
