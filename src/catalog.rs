use crate::model::{Mood, Playlist, Track};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Read-only set of playlists handed to the player by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub playlists: Vec<Playlist>,
}

impl Catalog {
    pub fn new(playlists: Vec<Playlist>) -> Self {
        Self { playlists }
    }

    pub fn playlist(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|playlist| playlist.id == id)
    }

    /// First playlist tagged with `mood`, or the first playlist at all.
    pub fn for_mood(&self, mood: Mood) -> Option<&Playlist> {
        self.playlists
            .iter()
            .find(|playlist| playlist.mood == mood)
            .or_else(|| self.playlists.first())
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.playlists
            .iter()
            .flat_map(|playlist| playlist.tracks.iter())
            .find(|track| track.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Playlist> {
        self.playlists.iter()
    }

    pub fn push(&mut self, playlist: Playlist) {
        self.playlists.retain(|existing| existing.id != playlist.id);
        self.playlists.push(playlist);
    }

    pub(crate) fn resolve_relative_to(mut self, base: &Path) -> Self {
        for track in self
            .playlists
            .iter_mut()
            .flat_map(|playlist| playlist.tracks.iter_mut())
        {
            if track.source.is_relative() {
                track.source = base.join(&track.source);
            }
            if let Some(cover) = track.cover.as_mut()
                && cover.is_relative()
            {
                *cover = base.join(&*cover);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn playlist(id: &str, mood: Mood) -> Playlist {
        Playlist {
            id: id.to_string(),
            title: id.to_string(),
            mood,
            tracks: vec![Track {
                id: format!("{id}-1"),
                title: String::from("one"),
                artist: String::from("someone"),
                duration: None,
                source: PathBuf::from("one.mp3"),
                cover: None,
            }],
        }
    }

    #[test]
    fn mood_lookup_prefers_tagged_playlist() {
        let catalog = Catalog::new(vec![playlist("a", Mood::Happy), playlist("b", Mood::Sad)]);
        assert_eq!(catalog.for_mood(Mood::Sad).map(|p| p.id.as_str()), Some("b"));
        assert_eq!(
            catalog.for_mood(Mood::Angry).map(|p| p.id.as_str()),
            Some("a")
        );
    }

    #[test]
    fn push_replaces_same_id() {
        let mut catalog = Catalog::new(vec![playlist("a", Mood::Happy)]);
        catalog.push(playlist("a", Mood::Angry));
        assert_eq!(catalog.playlists.len(), 1);
        assert_eq!(catalog.playlists[0].mood, Mood::Angry);
        assert!(catalog.track("a-1").is_some());
    }
}
