use crate::audio::{EngineEvent, PlaybackEngine};
use crate::config::Settings;
use crate::error::Rejection;
use crate::favorites::{FavoriteKey, Favorites};
use crate::history::History;
use crate::library::Playlist;
use crate::model::{PlayMode, PlaybackState, Track};
use rand::RngExt;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::time::Duration;

/// Playlist, favorites and history plus the transport state machine that moves
/// between tracks. Every operation that touches playback takes the engine by
/// reference; nothing here owns it.
#[derive(Debug)]
pub struct PlayerCore {
    pub playlist: Playlist,
    pub favorites: Favorites,
    pub history: History,
    pub play_mode: PlayMode,
    pub current_index: usize,
    /// Highlighted playlist row. `None` until the user picks one.
    pub selected: Option<usize>,
    pub playback_state: PlaybackState,
    pub position: Duration,
    pub duration: Option<Duration>,
    /// Track whose artwork is on display.
    pub artwork_index: Option<usize>,
    pub dirty: bool,
    pub status: String,
    finish_latched: bool,
    rng: SmallRng,
}

impl PlayerCore {
    pub fn new(playlist: Playlist, favorite_key: FavoriteKey) -> Self {
        let favorites = Favorites::new(playlist.len(), favorite_key);
        Self {
            playlist,
            favorites,
            history: History::default(),
            play_mode: PlayMode::default(),
            current_index: 0,
            selected: None,
            playback_state: PlaybackState::Stopped,
            position: Duration::ZERO,
            duration: None,
            artwork_index: None,
            dirty: true,
            status: String::from("Ready"),
            finish_latched: false,
            rng: rand::make_rng(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut playlist = Playlist::new();
        let loaded = playlist.load(&settings.music_dir);
        let mut core = Self::new(playlist, settings.favorite_key);
        match loaded {
            Ok(count) => {
                tracing::info!(dir = %settings.music_dir.display(), count, "loaded playlist");
                core.set_status(&format!("Loaded {count} tracks"));
            }
            Err(reason) => core.reject("load", reason),
        }
        core
    }

    /// Makes shuffle draws reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.playlist.get(self.current_index)
    }

    pub fn select(&mut self, row: usize) {
        if row < self.playlist.len() {
            self.selected = Some(row);
            self.dirty = true;
        }
    }

    pub fn select_next(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        let row = self
            .selected
            .map_or(0, |row| (row + 1).min(self.playlist.len() - 1));
        self.select(row);
    }

    pub fn select_prev(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        let row = self.selected.map_or(0, |row| row.saturating_sub(1));
        self.select(row);
    }

    /// Play/pause button. Starts the selected row when nothing is loaded.
    pub fn toggle_play(&mut self, audio: &mut dyn PlaybackEngine) {
        let row = match self.selected {
            Some(row) if row < self.playlist.len() => row,
            Some(row) => return self.reject("toggle play", Rejection::OutOfRangeSelection(row)),
            None => return self.reject("toggle play", Rejection::NoSelection),
        };
        self.current_index = row;

        match audio.state() {
            PlaybackState::Stopped => self.start(row, audio),
            PlaybackState::Paused => {
                audio.play();
                self.set_status("Resumed");
            }
            PlaybackState::Playing => {
                audio.pause();
                self.set_status("Paused");
            }
        }
        self.playback_state = audio.state();
    }

    pub fn next(&mut self, audio: &mut dyn PlaybackEngine) {
        if let Err(reason) = self.transport_ready() {
            return self.reject("next", reason);
        }

        let len = self.playlist.len();
        match self.play_mode {
            PlayMode::Sequential => {
                self.current_index = (self.current_index + 1) % len;
                self.history.record(self.current_index);
            }
            PlayMode::SingleRepeat => {}
            PlayMode::Shuffle => {
                self.current_index = self.rng.random_range(0..len);
                self.history.record(self.current_index);
            }
        }
        self.start(self.current_index, audio);
    }

    pub fn previous(&mut self, audio: &mut dyn PlaybackEngine) {
        if let Err(reason) = self.transport_ready() {
            return self.reject("previous", reason);
        }

        let len = self.playlist.len();
        match self.play_mode {
            PlayMode::Sequential => {
                self.current_index = (self.current_index + len - 1) % len;
                self.history.record(self.current_index);
            }
            PlayMode::SingleRepeat => {}
            PlayMode::Shuffle => {
                // The recalled track becomes the newest entry so a further
                // "previous" keeps walking back.
                self.current_index = self.history.recall_and_pop().min(len - 1);
                self.history.record(self.current_index);
            }
        }
        self.start(self.current_index, audio);
    }

    /// Double-click on a playlist row.
    pub fn activate(&mut self, index: usize, audio: &mut dyn PlaybackEngine) {
        if index >= self.playlist.len() {
            return self.reject("activate", Rejection::OutOfRangeSelection(index));
        }
        self.current_index = index;
        self.history.record(index);
        self.start(index, audio);
    }

    /// Double-click on a favorites row.
    pub fn activate_favorite(&mut self, row: usize, audio: &mut dyn PlaybackEngine) {
        match self.favorites.index_for_row(row) {
            Some(index) => self.activate(index, audio),
            None => self.reject("activate favorite", Rejection::OutOfRangeSelection(row)),
        }
    }

    pub fn cycle_mode(&mut self, audio: &mut dyn PlaybackEngine) {
        self.play_mode = self.play_mode.next();
        audio.set_loop_count(self.play_mode.loop_count());
        tracing::info!(mode = ?self.play_mode, "play mode changed");
        self.set_status(&format!("Mode: {}", self.play_mode.label()));
    }

    pub fn toggle_favorite(&mut self) {
        match self.favorites.toggle(self.current_index, &self.playlist) {
            Some(true) => self.set_status("Added to favorites"),
            Some(false) => self.set_status("Removed from favorites"),
            None => self.reject(
                "toggle favorite",
                Rejection::OutOfRangeSelection(self.current_index),
            ),
        }
    }

    pub fn seek(&mut self, position: Duration, audio: &mut dyn PlaybackEngine) {
        if audio.source().is_none() {
            return self.reject("seek", Rejection::NoSelection);
        }
        let target = self
            .duration
            .map_or(position, |duration| position.min(duration));
        match audio.set_position(target) {
            Ok(()) => self.position = target,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "seek failed");
                self.set_status(&format!("seek error: {err:#}"));
            }
        }
    }

    pub fn set_volume(&mut self, volume: f32, audio: &mut dyn PlaybackEngine) {
        audio.set_volume(volume.clamp(0.0, 1.0));
        self.set_status(&format!(
            "Volume: {}%",
            (audio.volume() * 100.0).round() as u16
        ));
    }

    /// Feeds one engine notification into the state machine. A track end can be
    /// reported both by the position reaching the duration and by an
    /// end-of-media signal; either one advances, the other is swallowed.
    pub fn handle_engine_event(&mut self, event: EngineEvent, audio: &mut dyn PlaybackEngine) {
        match event {
            EngineEvent::DurationChanged(duration) => {
                self.duration = Some(duration);
                self.dirty = true;
            }
            EngineEvent::PositionChanged(position) => {
                self.position = position;
                self.dirty = true;
                match self.duration {
                    Some(duration) if position >= duration => self.track_finished(audio),
                    _ => self.finish_latched = false,
                }
            }
            EngineEvent::StatusChanged(_) => {
                // A batch can span a source change, so the payload may be stale.
                self.playback_state = audio.state();
                self.dirty = true;
            }
            EngineEvent::EndOfMedia => {
                self.artwork_index = Some(self.current_index);
                self.track_finished(audio);
            }
        }
    }

    fn track_finished(&mut self, audio: &mut dyn PlaybackEngine) {
        if self.finish_latched {
            return;
        }
        self.finish_latched = true;

        if self.selected.is_none() {
            return;
        }
        match self.play_mode {
            // The engine loops the track itself.
            PlayMode::SingleRepeat => {}
            PlayMode::Sequential | PlayMode::Shuffle => {
                tracing::debug!(index = self.current_index, "track finished");
                self.next(audio);
            }
        }
    }

    fn transport_ready(&self) -> Result<(), Rejection> {
        if self.playlist.is_empty() {
            return Err(Rejection::EmptyPlaylist);
        }
        if self.selected.is_none() {
            return Err(Rejection::NoSelection);
        }
        Ok(())
    }

    fn start(&mut self, index: usize, audio: &mut dyn PlaybackEngine) {
        let Some(track) = self.playlist.get(index) else {
            return self.reject("start", Rejection::OutOfRangeSelection(index));
        };
        let path = track.path.clone();
        let name = track.name.clone();

        self.selected = Some(index);
        self.artwork_index = Some(index);
        self.position = Duration::ZERO;
        self.duration = None;

        tracing::debug!(index, path = %path.display(), "starting track");
        match audio.set_source(&path) {
            Ok(()) => {
                audio.play();
                self.set_status(&format!("Playing {name}"));
            }
            Err(err) => {
                tracing::warn!(index, error = %format!("{err:#}"), "playback failed");
                self.set_status(&format!("playback error: {err:#}"));
            }
        }
        self.playback_state = audio.state();
    }

    fn reject(&mut self, action: &str, reason: Rejection) {
        tracing::debug!(action, %reason, "ignored");
        self.set_status(&reason.to_string());
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullEngine;
    use crate::history::HISTORY_CAPACITY;
    use crate::model::LoopCount;
    use proptest::prop_assert;
    use std::path::PathBuf;

    fn core_with(names: &[&str]) -> PlayerCore {
        let tracks = names
            .iter()
            .map(|name| Track::from_path(PathBuf::from(name)))
            .collect();
        PlayerCore::new(Playlist::from_tracks(tracks), FavoriteKey::DisplayName).with_seed(7)
    }

    fn abc() -> PlayerCore {
        core_with(&["a.mp3", "b.mp3", "c.mp3"])
    }

    fn set_mode(core: &mut PlayerCore, audio: &mut NullEngine, mode: PlayMode) {
        while core.play_mode != mode {
            core.cycle_mode(audio);
        }
    }

    #[test]
    fn transport_is_ignored_without_selection() {
        let mut core = abc();
        let mut audio = NullEngine::new();

        core.toggle_play(&mut audio);
        core.next(&mut audio);
        core.previous(&mut audio);

        assert_eq!(core.current_index, 0);
        assert!(core.history.is_empty());
        assert_eq!(audio.source(), None);
        assert_eq!(core.status, "no track selected");
    }

    #[test]
    fn transport_is_ignored_on_empty_playlist() {
        let mut core = core_with(&[]);
        let mut audio = NullEngine::new();
        core.selected = Some(0);

        core.next(&mut audio);
        assert_eq!(core.status, "playlist is empty");
        core.toggle_play(&mut audio);
        core.toggle_favorite();
        assert_eq!(audio.source(), None);
        assert!(core.favorites.is_empty());
    }

    #[test]
    fn toggle_play_cycles_stopped_playing_paused() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.select(1);

        core.toggle_play(&mut audio);
        assert_eq!(core.current_index, 1);
        assert_eq!(audio.source(), Some(PathBuf::from("b.mp3").as_path()));
        assert_eq!(core.playback_state, PlaybackState::Playing);

        core.toggle_play(&mut audio);
        assert_eq!(core.playback_state, PlaybackState::Paused);

        core.toggle_play(&mut audio);
        assert_eq!(core.playback_state, PlaybackState::Playing);
        assert!(core.history.is_empty());
    }

    #[test]
    fn sequential_next_walks_and_wraps() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.select(0);

        core.next(&mut audio);
        assert_eq!((core.current_index, core.history.entries()), (1, vec![1]));
        core.next(&mut audio);
        assert_eq!((core.current_index, core.history.entries()), (2, vec![1, 2]));
        core.next(&mut audio);
        assert_eq!((core.current_index, core.history.entries()), (0, vec![1, 2, 0]));

        assert_eq!(core.selected, Some(0));
        assert_eq!(core.artwork_index, Some(0));
        assert_eq!(audio.source(), Some(PathBuf::from("a.mp3").as_path()));
        assert_eq!(audio.state(), PlaybackState::Playing);
    }

    #[test]
    fn sequential_previous_wraps_backwards() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.activate(0, &mut audio);

        core.previous(&mut audio);
        assert_eq!(core.current_index, 2);
        assert_eq!(core.history.entries(), vec![0, 2]);
    }

    #[test]
    fn single_repeat_keeps_index_and_restarts() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.activate(1, &mut audio);
        set_mode(&mut core, &mut audio, PlayMode::SingleRepeat);
        assert_eq!(audio.loop_count(), LoopCount::Infinite);

        core.next(&mut audio);
        core.previous(&mut audio);
        assert_eq!(core.current_index, 1);
        assert_eq!(core.history.entries(), vec![1]);
        assert_eq!(audio.state(), PlaybackState::Playing);
    }

    #[test]
    fn shuffle_previous_returns_to_prior_track() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.activate(2, &mut audio);
        set_mode(&mut core, &mut audio, PlayMode::Shuffle);
        assert_eq!(audio.loop_count(), LoopCount::Once);

        core.next(&mut audio);
        core.previous(&mut audio);
        assert_eq!(core.current_index, 2);
        assert_eq!(core.history.entries(), vec![2]);
    }

    #[test]
    fn shuffle_previous_recalls_from_history() {
        let mut core = core_with(&["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"]);
        let mut audio = NullEngine::new();
        core.select(4);
        core.current_index = 4;
        for index in [2, 0, 4] {
            core.history.record(index);
        }
        set_mode(&mut core, &mut audio, PlayMode::Shuffle);

        core.previous(&mut audio);
        assert_eq!(core.current_index, 0);
        assert_eq!(core.history.entries(), vec![2, 0]);

        core.previous(&mut audio);
        assert_eq!(core.current_index, 2);
        assert_eq!(core.history.entries(), vec![2]);
    }

    #[test]
    fn activate_favorite_plays_underlying_track() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.current_index = 2;
        core.toggle_favorite();
        assert_eq!(core.favorites.names(), vec!["c.mp3"]);

        core.activate_favorite(0, &mut audio);
        assert_eq!(core.current_index, 2);
        assert_eq!(core.selected, Some(2));
        assert_eq!(core.history.entries(), vec![2]);

        core.activate_favorite(5, &mut audio);
        assert_eq!(core.status, "no track at row 5");
    }

    #[test]
    fn activate_out_of_range_is_ignored() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.activate(9, &mut audio);
        assert_eq!(core.selected, None);
        assert!(core.history.is_empty());
    }

    #[test]
    fn three_mode_toggles_return_to_start() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        let start = core.play_mode;
        let mut seen = Vec::new();
        for _ in 0..3 {
            core.cycle_mode(&mut audio);
            seen.push(core.play_mode);
        }
        assert_eq!(
            seen,
            vec![PlayMode::SingleRepeat, PlayMode::Shuffle, PlayMode::Sequential]
        );
        assert_eq!(core.play_mode, start);
        assert_eq!(audio.loop_count(), LoopCount::Once);
    }

    #[test]
    fn position_at_duration_and_end_of_media_advance_once() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.activate(0, &mut audio);
        audio.poll_events();

        let duration = Duration::from_secs(3);
        core.handle_engine_event(EngineEvent::DurationChanged(duration), &mut audio);
        core.handle_engine_event(EngineEvent::PositionChanged(duration), &mut audio);
        core.handle_engine_event(EngineEvent::EndOfMedia, &mut audio);

        assert_eq!(core.current_index, 1);
        assert_eq!(core.history.entries(), vec![0, 1]);

        // Progress on the new track re-arms the end detection.
        core.handle_engine_event(EngineEvent::DurationChanged(duration), &mut audio);
        core.handle_engine_event(EngineEvent::PositionChanged(Duration::ZERO), &mut audio);
        core.handle_engine_event(EngineEvent::EndOfMedia, &mut audio);
        assert_eq!(core.current_index, 2);
    }

    #[test]
    fn track_end_without_selection_does_nothing() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.handle_engine_event(EngineEvent::EndOfMedia, &mut audio);
        assert_eq!(core.current_index, 0);
        assert_eq!(audio.source(), None);
    }

    #[test]
    fn track_end_in_single_repeat_leaves_looping_to_engine() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.activate(1, &mut audio);
        set_mode(&mut core, &mut audio, PlayMode::SingleRepeat);

        core.handle_engine_event(EngineEvent::EndOfMedia, &mut audio);
        assert_eq!(core.current_index, 1);
        assert_eq!(core.history.entries(), vec![1]);
        assert_eq!(core.artwork_index, Some(1));
    }

    #[test]
    fn status_events_mirror_engine_state() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.activate(0, &mut audio);
        audio.pause();
        core.handle_engine_event(EngineEvent::StatusChanged(PlaybackState::Playing), &mut audio);
        assert_eq!(core.playback_state, PlaybackState::Paused);
    }

    #[test]
    fn seek_is_clamped_to_known_duration() {
        let mut core = abc();
        let mut audio = NullEngine::new().with_duration(Duration::from_secs(10));
        core.seek(Duration::from_secs(1), &mut audio);
        assert_eq!(core.status, "no track selected");

        core.activate(0, &mut audio);
        for event in audio.poll_events() {
            core.handle_engine_event(event, &mut audio);
        }
        core.seek(Duration::from_secs(40), &mut audio);
        assert_eq!(core.position, Duration::from_secs(10));
        assert_eq!(audio.position(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn volume_is_clamped_and_forwarded() {
        let mut core = abc();
        let mut audio = NullEngine::new();
        core.set_volume(0.25, &mut audio);
        assert_eq!(audio.volume(), 0.25);
        core.set_volume(3.0, &mut audio);
        assert_eq!(audio.volume(), 1.0);
        assert_eq!(core.status, "Volume: 100%");
    }

    proptest::proptest! {
        #[test]
        fn sequential_next_is_cyclic(len in 1usize..40, start in 0usize..40) {
            let names: Vec<String> = (0..len).map(|n| format!("{n}.mp3")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let mut core = core_with(&refs);
            let mut audio = NullEngine::new();
            let start = start % len;
            core.select(start);
            core.current_index = start;

            for _ in 0..len {
                core.next(&mut audio);
            }
            prop_assert!(core.current_index == start);
            prop_assert!(core.history.len() == len.min(HISTORY_CAPACITY));
        }

        #[test]
        fn invariants_hold_after_random_ops(ops in proptest::collection::vec(0u8..9, 1..200)) {
            let mut core = core_with(&["a.mp3", "b.mp3", "a.mp3", "c.mp3"]);
            let mut audio = NullEngine::new();

            for op in ops {
                match op {
                    0 => core.select_next(),
                    1 => core.toggle_play(&mut audio),
                    2 => core.next(&mut audio),
                    3 => core.previous(&mut audio),
                    4 => core.cycle_mode(&mut audio),
                    5 => core.toggle_favorite(),
                    6 => core.activate_favorite(0, &mut audio),
                    7 => core.handle_engine_event(EngineEvent::EndOfMedia, &mut audio),
                    _ => core.select_prev(),
                }

                prop_assert!(core.current_index < core.playlist.len());
                prop_assert!(core.history.len() <= HISTORY_CAPACITY);
                prop_assert!(core.history.entries().iter().all(|idx| *idx < core.playlist.len()));
                prop_assert!(core.favorites.entries().iter().all(|entry| entry.index < core.playlist.len()));
                if let Some(row) = core.selected {
                    prop_assert!(row < core.playlist.len());
                }
            }
        }
    }
}
