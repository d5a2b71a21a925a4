#![no_main]

use libfuzzer_sys::fuzz_target;
use moodtune::audio::ScriptedDevice;
use moodtune::keymap::Action;
use moodtune::model::{Mood, Playlist, Settings, Track};
use moodtune::player::Player;
use std::path::PathBuf;
use std::time::{Duration, Instant};

fuzz_target!(|data: &[u8]| {
    let Some((&len, commands)) = data.split_first() else {
        return;
    };
    let len = usize::from(len % 8);
    let playlist = Playlist {
        id: String::from("fuzz"),
        title: String::from("fuzz"),
        mood: Mood::Neutral,
        tracks: (0..len)
            .map(|idx| Track {
                id: format!("t{idx}"),
                title: format!("track {idx}"),
                artist: String::from("fuzz"),
                duration: Some(Duration::from_secs(30)),
                source: PathBuf::from(format!("t{idx}.mp3")),
                cover: None,
            })
            .collect(),
    };

    let device = ScriptedDevice::new().with_analysis();
    let start = Instant::now();
    let mut player =
        Player::new(playlist, Box::new(device.clone()), &Settings::default(), start).with_seed(7);
    let mut clock = Duration::ZERO;

    for byte in commands {
        let arg = usize::from(byte >> 4);
        match byte % 16 {
            0 => player.toggle_play(),
            1 => player.next(),
            2 => player.previous(),
            3 => player.select(arg),
            4 => player.seek(Duration::from_secs(arg as u64 * 3)),
            5 => player.set_volume(arg as f32 / 10.0),
            6 => player.toggle_mute(),
            7 => player.toggle_shuffle(),
            8 => player.cycle_repeat(),
            9 => {
                player.apply(Action::CycleMood);
            }
            10 => device.finish(&format!("t{}", arg % len.max(1))),
            11 => device.fail_load(&format!("t{}", arg % len.max(1))),
            12 => device.feed(&format!("t{}", arg % len.max(1)), &[0.5; 512]),
            13 => player.begin_seek_drag(),
            14 => player.end_seek_drag(),
            _ => {
                clock += Duration::from_millis(arg as u64 * 10 + 1);
                player.tick(start + clock);
            }
        }

        assert!(player.live_handles() <= 2);
        assert!(player.state().volume >= 0.0 && player.state().volume <= 1.0);
        if !player.playlist().is_empty() {
            assert!(player.current_index() < player.playlist().len());
        }
    }

    player.teardown();
    assert_eq!(player.pending_tasks(), 0);
    assert!(device.live_handles().is_empty());
});
