use crate::model::{Mood, Playlist, Track};
use lofty::prelude::*;
use lofty::probe::Probe;
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];
const COVER_NAMES: &[&str] = &["cover.jpg", "cover.png", "folder.jpg", "folder.png"];

#[derive(Default)]
struct TrackMetadata {
    title: Option<String>,
    artist: Option<String>,
    duration: Option<Duration>,
}

/// Builds a mood-tagged playlist from every audio file under `root`.
pub fn scan_folder(root: &Path, mood: Mood) -> Playlist {
    let mut tracks = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio(path) {
            continue;
        }

        let metadata = metadata_for(path);
        let title = metadata
            .title
            .and_then(|title| clean_metadata_value(&title))
            .unwrap_or_else(|| {
                path.file_stem()
                    .and_then(OsStr::to_str)
                    .unwrap_or("unknown")
                    .to_string()
            });

        tracks.push(Track {
            id: track_id_for(path),
            title,
            artist: metadata
                .artist
                .and_then(|artist| clean_metadata_value(&artist))
                .unwrap_or_else(|| String::from("Unknown artist")),
            duration: metadata.duration,
            source: path.to_path_buf(),
            cover: cover_for(path),
        });
    }

    tracks.sort_by(|a, b| a.source.cmp(&b.source));
    tracing::info!(root = %root.display(), count = tracks.len(), "scanned folder");

    let title = root
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());
    Playlist {
        id: track_id_for(root),
        title,
        mood,
        tracks,
    }
}

pub fn track_id_for(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let mut id = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

fn metadata_for(path: &Path) -> TrackMetadata {
    let Ok(tagged_file) = Probe::open(path).and_then(|probe| probe.read()) else {
        return TrackMetadata::default();
    };

    let duration = Some(tagged_file.properties().duration()).filter(|d| !d.is_zero());
    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return TrackMetadata {
            duration,
            ..TrackMetadata::default()
        };
    };

    TrackMetadata {
        title: tag.title().map(|value| value.to_string()),
        artist: tag.artist().map(|value| value.to_string()),
        duration,
    }
}

fn cover_for(path: &Path) -> Option<std::path::PathBuf> {
    let dir = path.parent()?;
    COVER_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn clean_metadata_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scan_filters_non_audio_files() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.mp3"), b"x").expect("write mp3");
        fs::write(dir.path().join("b.txt"), b"x").expect("write txt");

        let playlist = scan_folder(dir.path(), Mood::Happy);
        assert_eq!(playlist.mood, Mood::Happy);
        assert_eq!(playlist.tracks.len(), 1);
        let track = &playlist.tracks[0];
        assert!(track.source.ends_with("a.mp3"));
        assert_eq!(track.title, "a");
        assert_eq!(track.artist, "Unknown artist");
        assert_eq!(track.duration, None);
    }

    #[test]
    fn scan_picks_up_folder_cover() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("song.flac"), b"x").expect("write flac");
        fs::write(dir.path().join("cover.jpg"), b"x").expect("write cover");

        let playlist = scan_folder(dir.path(), Mood::Sad);
        assert_eq!(
            playlist.tracks[0].cover.as_deref(),
            Some(dir.path().join("cover.jpg").as_path())
        );
    }

    #[test]
    fn track_ids_are_stable_and_short() {
        let a = track_id_for(Path::new("/music/a.mp3"));
        assert_eq!(a.len(), 16);
        assert_eq!(a, track_id_for(Path::new("/music/a.mp3")));
        assert_ne!(a, track_id_for(Path::new("/music/b.mp3")));
    }

    #[test]
    fn metadata_value_cleaning_trims_and_drops_empty() {
        assert_eq!(
            clean_metadata_value("  hello  "),
            Some(String::from("hello"))
        );
        assert_eq!(clean_metadata_value("   \t  "), None);
    }
}
