use crate::model::{LoopCount, PlaybackState};
use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Notifications an engine reports back to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    DurationChanged(Duration),
    PositionChanged(Duration),
    StatusChanged(PlaybackState),
    EndOfMedia,
}

pub trait PlaybackEngine {
    /// Loads `path` without starting it. The engine ends up `Stopped`.
    fn set_source(&mut self, path: &Path) -> Result<()>;
    fn play(&mut self);
    fn pause(&mut self);
    fn set_position(&mut self, position: Duration) -> Result<()>;
    /// Volume as a fraction in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;
    fn set_loop_count(&mut self, loops: LoopCount);
    fn loop_count(&self) -> LoopCount;
    fn state(&self) -> PlaybackState;
    fn source(&self) -> Option<&Path>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn output_name(&self) -> String;
    /// Drains notifications gathered since the last call. Expected to be called
    /// from the event loop on every tick.
    fn poll_events(&mut self) -> Vec<EngineEvent>;
}

pub struct RodioEngine {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
    track_duration: Option<Duration>,
    volume: f32,
    loops: LoopCount,
    state: PlaybackState,
    pending: Vec<EngineEvent>,
}

impl RodioEngine {
    pub fn new() -> Result<Self> {
        let stream = open_output_stream()?;
        let sink = Sink::connect_new(stream.mixer());

        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            volume: 1.0,
            loops: LoopCount::Once,
            state: PlaybackState::Stopped,
            pending: Vec::new(),
        })
    }

    /// Replaces the sink with a paused one holding a fresh decoder for `path`.
    fn open_source(&mut self, path: &Path) -> Result<()> {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());

        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        self.track_duration = source.total_duration().filter(|duration| !duration.is_zero());
        self.sink.pause();
        self.sink.append(source);
        self.sink.set_volume(self.volume);
        Ok(())
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.pending.push(EngineEvent::StatusChanged(state));
        }
    }
}

impl PlaybackEngine for RodioEngine {
    fn set_source(&mut self, path: &Path) -> Result<()> {
        self.set_state(PlaybackState::Stopped);
        self.current = None;
        self.open_source(path)?;
        self.current = Some(path.to_path_buf());
        if let Some(duration) = self.track_duration {
            self.pending.push(EngineEvent::DurationChanged(duration));
        }
        self.pending.push(EngineEvent::PositionChanged(Duration::ZERO));
        Ok(())
    }

    fn play(&mut self) {
        let Some(path) = self.current.clone() else {
            return;
        };
        if self.sink.empty() {
            if let Err(err) = self.open_source(&path) {
                tracing::warn!(error = %format!("{err:#}"), "failed to restart track");
                return;
            }
        }
        self.sink.play();
        self.set_state(PlaybackState::Playing);
    }

    fn pause(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.sink.pause();
        self.set_state(PlaybackState::Paused);
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))?;
        self.pending.push(EngineEvent::PositionChanged(position));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_loop_count(&mut self, loops: LoopCount) {
        self.loops = loops;
    }

    fn loop_count(&self) -> LoopCount {
        self.loops
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn source(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn output_name(&self) -> String {
        String::from("System default output")
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        if self.state == PlaybackState::Playing && self.sink.empty() {
            if let Some(duration) = self.track_duration {
                self.pending.push(EngineEvent::PositionChanged(duration));
            }
            match (self.loops, self.current.clone()) {
                (LoopCount::Infinite, Some(path)) => match self.open_source(&path) {
                    Ok(()) => {
                        self.sink.play();
                        self.pending.push(EngineEvent::PositionChanged(Duration::ZERO));
                    }
                    Err(err) => {
                        tracing::warn!(error = %format!("{err:#}"), "failed to loop track");
                        self.set_state(PlaybackState::Stopped);
                        self.pending.push(EngineEvent::EndOfMedia);
                    }
                },
                _ => {
                    self.set_state(PlaybackState::Stopped);
                    self.pending.push(EngineEvent::EndOfMedia);
                }
            }
        } else if self.state == PlaybackState::Playing {
            self.pending
                .push(EngineEvent::PositionChanged(self.sink.get_pos()));
        }

        std::mem::take(&mut self.pending)
    }
}

fn open_output_stream() -> Result<OutputStream> {
    let mut stream = with_silenced_stderr(|| -> Result<OutputStream> {
        let default = OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            });
        let default_err = match default {
            Ok(stream) => return Ok(stream),
            Err(err) => err,
        };

        let devices = rodio::cpal::default_host()
            .output_devices()
            .context("failed to enumerate output devices")?;
        for device in devices {
            let name = device.name().unwrap_or_default();
            let opened = OutputStreamBuilder::from_device(device)
                .context("failed to open fallback output device")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start fallback output stream")
                });
            match opened {
                Ok(stream) => return Ok(stream),
                Err(err) => tracing::debug!(device = %name, error = %format!("{err:#}"), "output device rejected"),
            }
        }

        Err(default_err.context("no audio output device could be started"))
    })?;
    stream.log_on_drop(false);
    Ok(stream)
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

/// Silent engine driven by a wall clock. Used when no output device can be
/// opened; behaves like a real engine for position, looping and end of media.
pub struct NullEngine {
    state: PlaybackState,
    current: Option<PathBuf>,
    volume: f32,
    loops: LoopCount,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    fixed_duration: Option<Duration>,
    pending: Vec<EngineEvent>,
}

impl NullEngine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            current: None,
            volume: 1.0,
            loops: LoopCount::Once,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            fixed_duration: None,
            pending: Vec::new(),
        }
    }

    /// Fixes the length of the loaded track, for sources whose duration cannot
    /// be probed.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.fixed_duration = Some(duration);
        self
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if self.state == PlaybackState::Playing
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.pending.push(EngineEvent::StatusChanged(state));
        }
    }
}

impl Default for NullEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for NullEngine {
    fn set_source(&mut self, path: &Path) -> Result<()> {
        self.set_state(PlaybackState::Stopped);
        self.current = Some(path.to_path_buf());
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(path).or(self.fixed_duration);
        if let Some(duration) = self.track_duration {
            self.pending.push(EngineEvent::DurationChanged(duration));
        }
        self.pending.push(EngineEvent::PositionChanged(Duration::ZERO));
        Ok(())
    }

    fn play(&mut self) {
        if self.current.is_none() {
            return;
        }
        if self.state == PlaybackState::Stopped {
            self.position_offset = Duration::ZERO;
        }
        self.started_at = Some(Instant::now());
        self.set_state(PlaybackState::Playing);
    }

    fn pause(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.position_offset = self.current_position();
        self.started_at = None;
        self.set_state(PlaybackState::Paused);
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = (self.state == PlaybackState::Playing).then(Instant::now);
        self.pending
            .push(EngineEvent::PositionChanged(self.position_offset));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_loop_count(&mut self, loops: LoopCount) {
        self.loops = loops;
    }

    fn loop_count(&self) -> LoopCount {
        self.loops
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn source(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn output_name(&self) -> String {
        String::from("Null audio engine")
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        if self.state == PlaybackState::Playing {
            let position = self.current_position();
            self.pending.push(EngineEvent::PositionChanged(position));

            if self.track_duration.is_some_and(|duration| position >= duration) {
                match self.loops {
                    LoopCount::Infinite => {
                        self.position_offset = Duration::ZERO;
                        self.started_at = Some(Instant::now());
                        self.pending.push(EngineEvent::PositionChanged(Duration::ZERO));
                    }
                    LoopCount::Once => {
                        self.position_offset = Duration::ZERO;
                        self.started_at = None;
                        self.set_state(PlaybackState::Stopped);
                        self.pending.push(EngineEvent::EndOfMedia);
                    }
                }
            }
        }

        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineEvent, NullEngine, PlaybackEngine};
    use crate::model::{LoopCount, PlaybackState};
    use std::fs;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_test_wav(path: &Path, duration_ms: u32) {
        let sample_rate: u32 = 44_100;
        let channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let bytes_per_sample = u32::from(bits_per_sample / 8);
        let total_samples = (u64::from(sample_rate) * u64::from(duration_ms) / 1_000) as u32;
        let data_size = total_samples * u32::from(channels) * bytes_per_sample;
        let byte_rate = sample_rate * u32::from(channels) * bytes_per_sample;
        let block_align = channels * (bits_per_sample / 8);

        let mut bytes = Vec::with_capacity((44_u32 + data_size) as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&36_u32.saturating_add(data_size).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_size.to_le_bytes());
        bytes.resize((44_u32 + data_size) as usize, 0_u8);

        fs::write(path, bytes).expect("wav fixture should be written");
    }

    #[test]
    fn set_source_loads_without_playing() {
        let mut engine = NullEngine::new();
        engine
            .set_source(Path::new("nonexistent-track.ogg"))
            .expect("null engine accepts any source");
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.source(), Some(Path::new("nonexistent-track.ogg")));
        assert_eq!(engine.position(), Some(Duration::ZERO));
    }

    #[test]
    fn pause_and_resume_control_position_progression() {
        let mut engine = NullEngine::new();
        engine
            .set_source(Path::new("nonexistent-track.ogg"))
            .expect("source");
        engine.play();
        thread::sleep(Duration::from_millis(20));

        engine.pause();
        let paused = engine.position().expect("position should be present");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.position(), Some(paused), "position should freeze while paused");

        engine.play();
        thread::sleep(Duration::from_millis(20));
        let resumed = engine.position().expect("position should be present");
        assert!(resumed > paused, "position should continue after resume");
    }

    #[test]
    fn seek_updates_position_and_reports_it() {
        let mut engine = NullEngine::new();
        assert!(engine.set_position(Duration::from_secs(1)).is_err());

        engine
            .set_source(Path::new("nonexistent-track.ogg"))
            .expect("source");
        engine.poll_events();
        engine.set_position(Duration::from_secs(12)).expect("seek");
        assert_eq!(engine.position(), Some(Duration::from_secs(12)));
        assert_eq!(
            engine.poll_events(),
            vec![EngineEvent::PositionChanged(Duration::from_secs(12))]
        );
    }

    #[test]
    fn volume_is_clamped_to_unit_range() {
        let mut engine = NullEngine::new();
        engine.set_volume(1.8);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(-0.2);
        assert_eq!(engine.volume(), 0.0);
    }

    #[test]
    fn reports_end_of_media_when_known_duration_elapses() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 80);

        let mut engine = NullEngine::new();
        engine.set_source(&track).expect("source");
        let duration = engine.duration().expect("duration should be detected");
        assert!(duration >= Duration::from_millis(70));
        engine.play();
        engine.poll_events();

        thread::sleep(Duration::from_millis(120));
        let events = engine.poll_events();
        assert!(events.contains(&EngineEvent::PositionChanged(duration)));
        assert!(events.contains(&EngineEvent::EndOfMedia));
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn infinite_loop_restarts_instead_of_ending() {
        let mut engine = NullEngine::new().with_duration(Duration::from_millis(30));
        engine.set_loop_count(LoopCount::Infinite);
        engine
            .set_source(Path::new("nonexistent-track.ogg"))
            .expect("source");
        engine.play();

        thread::sleep(Duration::from_millis(50));
        let events = engine.poll_events();
        assert!(!events.contains(&EngineEvent::EndOfMedia));
        assert!(events.contains(&EngineEvent::PositionChanged(Duration::ZERO)));
        assert_eq!(engine.state(), PlaybackState::Playing);
    }

    #[test]
    fn unknown_duration_never_ends() {
        let mut engine = NullEngine::new();
        engine
            .set_source(Path::new("nonexistent-track.ogg"))
            .expect("source");
        engine.play();
        thread::sleep(Duration::from_millis(40));
        assert!(!engine.poll_events().contains(&EngineEvent::EndOfMedia));
    }
}
