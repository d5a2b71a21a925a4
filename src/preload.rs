use crate::audio::{AudioGraph, PreparedSource};
use crate::model::Playlist;

#[derive(Debug)]
enum SlotState {
    Pending,
    Ready(PreparedSource),
    Failed,
}

#[derive(Debug)]
struct Slot {
    index: usize,
    track_id: String,
    state: SlotState,
}

/// Prepares the next sequential track so a later switch can skip the read.
///
/// Not shuffle-aware: a shuffled jump misses the slot and loads on demand.
#[derive(Debug, Default)]
pub struct Preloader {
    slot: Option<Slot>,
}

impl Preloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets the track after `current`, wrapping. Single-track and empty
    /// playlists clear the slot instead.
    pub fn request(&mut self, playlist: &Playlist, current: usize) {
        if playlist.len() < 2 {
            self.slot = None;
            return;
        }
        let index = (current + 1) % playlist.len();
        let track_id = &playlist.tracks[index].id;
        if self
            .slot
            .as_ref()
            .is_some_and(|slot| slot.index == index && &slot.track_id == track_id)
        {
            return;
        }
        self.slot = Some(Slot {
            index,
            track_id: track_id.clone(),
            state: SlotState::Pending,
        });
    }

    /// Runs a pending preparation. Failures only log; the switch falls back
    /// to loading on demand.
    pub fn poll(&mut self, graph: &AudioGraph, playlist: &Playlist) {
        let Some(slot) = self.slot.as_mut() else {
            return;
        };
        if !matches!(slot.state, SlotState::Pending) {
            return;
        }
        let Some(track) = playlist
            .tracks
            .get(slot.index)
            .filter(|track| track.id == slot.track_id)
        else {
            self.slot = None;
            return;
        };

        slot.state = match graph.prepare(track) {
            Ok(prepared) => {
                tracing::debug!(track = %track.id, index = slot.index, "next track preloaded");
                SlotState::Ready(prepared)
            }
            Err(error) => {
                tracing::warn!(track = %track.id, %error, "preload failed");
                SlotState::Failed
            }
        };
    }

    pub fn target(&self) -> Option<usize> {
        self.slot.as_ref().map(|slot| slot.index)
    }

    pub fn is_ready(&self) -> bool {
        self.slot
            .as_ref()
            .is_some_and(|slot| matches!(slot.state, SlotState::Ready(_)))
    }

    /// Hands over the prepared source when it belongs to `track_id`.
    pub fn take(&mut self, track_id: &str) -> Option<PreparedSource> {
        let matches = self
            .slot
            .as_ref()
            .is_some_and(|slot| slot.track_id == track_id && matches!(slot.state, SlotState::Ready(_)));
        if !matches {
            return None;
        }
        match self.slot.take().map(|slot| slot.state) {
            Some(SlotState::Ready(prepared)) => Some(prepared),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ScriptedDevice;
    use crate::model::{Mood, Track};
    use std::path::PathBuf;

    fn playlist(len: usize) -> Playlist {
        Playlist {
            id: String::from("p"),
            title: String::from("p"),
            mood: Mood::Neutral,
            tracks: (0..len)
                .map(|index| Track {
                    id: format!("t{index}"),
                    title: format!("Track {index}"),
                    artist: String::from("artist"),
                    duration: None,
                    source: PathBuf::from(format!("t{index}.mp3")),
                    cover: None,
                })
                .collect(),
        }
    }

    #[test]
    fn targets_next_sequential_index_with_wrap() {
        let list = playlist(3);
        let mut preloader = Preloader::new();
        preloader.request(&list, 0);
        assert_eq!(preloader.target(), Some(1));
        preloader.request(&list, 2);
        assert_eq!(preloader.target(), Some(0));
    }

    #[test]
    fn single_track_playlist_never_preloads() {
        let mut preloader = Preloader::new();
        preloader.request(&playlist(1), 0);
        assert_eq!(preloader.target(), None);
        assert!(!preloader.is_ready());
    }

    #[test]
    fn ready_after_poll_and_take_matches_track() {
        let list = playlist(3);
        let device = ScriptedDevice::new();
        let (graph, _events) = AudioGraph::new(Box::new(device.clone()));
        let mut preloader = Preloader::new();

        preloader.request(&list, 0);
        assert!(!preloader.is_ready());
        preloader.poll(&graph, &list);
        assert!(preloader.is_ready());
        assert_eq!(device.prepared(), vec![String::from("t1")]);

        assert!(preloader.take("t2").is_none());
        let prepared = preloader.take("t1").expect("prepared t1");
        assert_eq!(prepared.track_id(), "t1");
        assert!(!preloader.is_ready());
    }

    #[test]
    fn prepare_failure_is_not_ready() {
        let list = playlist(2);
        let device = ScriptedDevice::new();
        device.fail_load("t1");
        let (graph, _events) = AudioGraph::new(Box::new(device));
        let mut preloader = Preloader::new();

        preloader.request(&list, 0);
        preloader.poll(&graph, &list);
        assert!(!preloader.is_ready());
        assert!(preloader.take("t1").is_none());
    }
}
