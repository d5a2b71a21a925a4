pub mod app;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod core;
pub mod crossfade;
pub mod keymap;
pub mod library;
pub mod logging;
pub mod lyrics;
pub mod model;
pub mod player;
pub mod preload;
pub mod scheduler;
pub mod ui;
pub mod visualizer;

pub use audio::{AudioDevice, AudioError, AudioEvent, NullDevice, RodioDevice, ScriptedDevice};
pub use model::{Mood, Playlist, RepeatMode, Settings, Track, TransportStatus};
pub use player::Player;
