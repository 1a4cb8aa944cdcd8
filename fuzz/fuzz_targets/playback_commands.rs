#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::PathBuf;
use std::time::Duration;
use tunebox::audio::{EngineEvent, NullEngine, PlaybackEngine};
use tunebox::favorites::FavoriteKey;
use tunebox::history::HISTORY_CAPACITY;
use tunebox::library::Playlist;
use tunebox::model::Track;
use tunebox::transport::PlayerCore;

fuzz_target!(|data: &[u8]| {
    let len = data.first().map_or(1, |byte| usize::from(*byte % 16));
    let tracks = (0..len)
        .map(|idx| Track::from_path(PathBuf::from(format!("track_{}.mp3", idx % 3))))
        .collect();
    let key = if data.len() % 2 == 0 {
        FavoriteKey::DisplayName
    } else {
        FavoriteKey::TrackIndex
    };
    let mut core = PlayerCore::new(Playlist::from_tracks(tracks), key).with_seed(len as u64);
    let mut audio = NullEngine::new().with_duration(Duration::from_secs(2));

    for byte in data.iter().skip(1) {
        let arg = usize::from(byte >> 4);
        match byte % 12 {
            0 => core.select(arg),
            1 => core.toggle_play(&mut audio),
            2 => core.next(&mut audio),
            3 => core.previous(&mut audio),
            4 => core.activate(arg, &mut audio),
            5 => core.activate_favorite(arg, &mut audio),
            6 => core.cycle_mode(&mut audio),
            7 => core.toggle_favorite(),
            8 => core.seek(Duration::from_millis(arg as u64 * 250), &mut audio),
            9 => core.handle_engine_event(EngineEvent::EndOfMedia, &mut audio),
            10 => {
                let duration = core.duration.unwrap_or_default();
                core.handle_engine_event(EngineEvent::PositionChanged(duration), &mut audio);
            }
            _ => {
                for event in audio.poll_events() {
                    core.handle_engine_event(event, &mut audio);
                }
            }
        }

        assert!(core.history.len() <= HISTORY_CAPACITY);
        if !core.playlist.is_empty() {
            assert!(core.current_index < core.playlist.len());
        }
        assert!(
            core.favorites
                .entries()
                .iter()
                .all(|entry| entry.index < core.playlist.len())
        );
    }
});
