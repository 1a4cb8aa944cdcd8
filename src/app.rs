use crate::audio::{NullEngine, PlaybackEngine, RodioEngine};
use crate::config::Settings;
use crate::logging;
use crate::transport::PlayerCore;
use crate::ui::{self, Pane, ViewState};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::time::{Duration, Instant};

const SEEK_STEP: Duration = Duration::from_secs(5);
const VOLUME_STEP: f32 = 0.05;

pub fn run() -> Result<()> {
    let settings = Settings::from_env()?;
    if let Err(err) = logging::init(&settings) {
        eprintln!("logging disabled: {err:#}");
    }

    let mut core = PlayerCore::from_settings(&settings);
    let mut audio: Box<dyn PlaybackEngine> = match RodioEngine::new() {
        Ok(engine) => Box::new(engine),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "no audio output, using null engine");
            Box::new(NullEngine::new())
        }
    };
    audio.set_volume(settings.initial_volume);
    audio.set_loop_count(core.play_mode.loop_count());
    let mut view = ViewState::default();

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_tick = Instant::now();

    let result: Result<()> = loop {
        pump_engine_events(&mut core, &mut *audio);

        if core.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            view.artwork = core
                .artwork_index
                .map(|index| settings.artwork_path(index))
                .filter(|path| path.is_file());
            terminal.draw(|frame| ui::draw(frame, &core, &*audio, &view))?;
            core.dirty = false;
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if handle_key(&mut core, &mut *audio, &mut view, key) == KeyOutcome::Quit {
            break Ok(());
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

fn pump_engine_events(core: &mut PlayerCore, audio: &mut dyn PlaybackEngine) {
    for event in audio.poll_events() {
        core.handle_engine_event(event, audio);
    }
}

fn handle_key(
    core: &mut PlayerCore,
    audio: &mut dyn PlaybackEngine,
    view: &mut ViewState,
    key: KeyEvent,
) -> KeyOutcome {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return KeyOutcome::Quit;
        }
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Tab => {
            view.focus = match view.focus {
                Pane::Playlist => Pane::Favorites,
                Pane::Favorites => Pane::Playlist,
            };
            core.dirty = true;
        }
        KeyCode::Down => match view.focus {
            Pane::Playlist => core.select_next(),
            Pane::Favorites => {
                view.favorite_row =
                    (view.favorite_row + 1).min(core.favorites.len().saturating_sub(1));
                core.dirty = true;
            }
        },
        KeyCode::Up => match view.focus {
            Pane::Playlist => core.select_prev(),
            Pane::Favorites => {
                view.favorite_row = view.favorite_row.saturating_sub(1);
                core.dirty = true;
            }
        },
        KeyCode::Enter => match view.focus {
            Pane::Playlist => match core.selected {
                Some(row) => core.activate(row, audio),
                None => core.select(0),
            },
            Pane::Favorites => core.activate_favorite(view.favorite_row, audio),
        },
        KeyCode::Char(' ') => core.toggle_play(audio),
        KeyCode::Char('n') => core.next(audio),
        KeyCode::Char('b') => core.previous(audio),
        KeyCode::Char('m') => core.cycle_mode(audio),
        KeyCode::Char('f') => {
            core.toggle_favorite();
            view.favorite_row = view
                .favorite_row
                .min(core.favorites.len().saturating_sub(1));
        }
        KeyCode::Left => {
            let target = core.position.saturating_sub(SEEK_STEP);
            core.seek(target, audio);
        }
        KeyCode::Right => {
            let target = core.position.saturating_add(SEEK_STEP);
            core.seek(target, audio);
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            let volume = audio.volume() + VOLUME_STEP;
            core.set_volume(volume, audio);
            view.volume_visible = true;
        }
        KeyCode::Char('-') => {
            let volume = audio.volume() - VOLUME_STEP;
            core.set_volume(volume, audio);
            view.volume_visible = true;
        }
        KeyCode::Char('v') => {
            view.volume_visible = !view.volume_visible;
            core.dirty = true;
        }
        _ => {}
    }
    KeyOutcome::Continue
}
