use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    #[default]
    Neutral,
    Anxious,
    Angry,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Neutral,
        Mood::Anxious,
        Mood::Angry,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Neutral => "neutral",
            Self::Anxious => "anxious",
            Self::Angry => "angry",
        }
    }

    /// Position in [`Mood::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::Happy => 0,
            Self::Sad => 1,
            Self::Neutral => 2,
            Self::Anxious => 3,
            Self::Angry => 4,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Happy => Self::Sad,
            Self::Sad => Self::Neutral,
            Self::Neutral => Self::Anxious,
            Self::Anxious => Self::Angry,
            Self::Angry => Self::Happy,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mood {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_ascii_lowercase();
        Mood::ALL
            .into_iter()
            .find(|mood| mood.label() == lower)
            .ok_or_else(|| anyhow::anyhow!("unknown mood {value:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
    Transitioning,
}

impl TransportStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Transitioning => "Transitioning",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default, with = "duration_secs")]
    pub duration: Option<Duration>,
    pub source: PathBuf,
    #[serde(default)]
    pub cover: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub mood: Mood,
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub repeat: RepeatMode,
    #[serde(default)]
    pub likes: HashMap<String, bool>,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: u64,
    #[serde(default = "default_fade_in_ms")]
    pub fade_in_ms: u64,
    #[serde(default = "default_fade_step_ms")]
    pub fade_step_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,
    #[serde(default = "default_bin_count")]
    pub bin_count: usize,
    #[serde(default = "default_auto_advance_on_error")]
    pub auto_advance_on_error: bool,
}

fn default_volume() -> f32 {
    0.7
}

fn default_fade_out_ms() -> u64 {
    300
}

fn default_fade_in_ms() -> u64 {
    300
}

fn default_fade_step_ms() -> u64 {
    50
}

fn default_settle_ms() -> u64 {
    100
}

fn default_max_fps() -> u32 {
    30
}

fn default_bin_count() -> usize {
    16
}

fn default_auto_advance_on_error() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            muted: false,
            shuffle: false,
            repeat: RepeatMode::default(),
            likes: HashMap::new(),
            mood: Mood::default(),
            fade_out_ms: default_fade_out_ms(),
            fade_in_ms: default_fade_in_ms(),
            fade_step_ms: default_fade_step_ms(),
            settle_ms: default_settle_ms(),
            max_fps: default_max_fps(),
            bin_count: default_bin_count(),
            auto_advance_on_error: default_auto_advance_on_error(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_parses_case_insensitively() {
        assert_eq!("Anxious".parse::<Mood>().expect("mood"), Mood::Anxious);
        assert!("elated".parse::<Mood>().is_err());
    }

    #[test]
    fn mood_index_matches_all_order() {
        for (position, mood) in Mood::ALL.into_iter().enumerate() {
            assert_eq!(mood.index(), position);
        }
    }

    #[test]
    fn repeat_mode_cycles() {
        assert_eq!(RepeatMode::None.next(), RepeatMode::All);
        assert_eq!(RepeatMode::All.next(), RepeatMode::One);
        assert_eq!(RepeatMode::One.next(), RepeatMode::None);
    }

    #[test]
    fn track_duration_reads_seconds() {
        let raw = r#"{"id":"t1","title":"Tide","artist":"Wren","duration":184.5,"source":"tide.mp3"}"#;
        let track: Track = serde_json::from_str(raw).expect("track");
        assert_eq!(track.duration, Some(Duration::from_millis(184_500)));
        assert_eq!(track.cover, None);
    }

    #[test]
    fn settings_fill_missing_fields() {
        let settings: Settings = serde_json::from_str(r#"{"shuffle":true}"#).expect("settings");
        assert!(settings.shuffle);
        assert_eq!(settings.fade_step_ms, 50);
        assert_eq!(settings.max_fps, 30);
        assert!((settings.volume - 0.7).abs() < f32::EPSILON);
    }
}
