use crate::audio::PlaybackEngine;
use crate::model::PlaybackState;
use crate::transport::PlayerCore;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::path::PathBuf;
use std::time::Duration;

const APP_TITLE_WITH_VERSION: &str = "TuneBox v0.1.0  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Playlist,
    Favorites,
}

/// Presentation state that lives outside the player core.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub focus: Pane,
    pub favorite_row: usize,
    pub volume_visible: bool,
    pub artwork: Option<PathBuf>,
}

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    focus_border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    favorite: Color,
    selected_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(69, 121, 176),
    focus_border: Color::Rgb(100, 203, 184),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 203, 184),
    alert: Color::Rgb(249, 174, 88),
    favorite: Color::Rgb(255, 122, 165),
    selected_bg: Color::Rgb(34, 55, 82),
};

pub fn draw(frame: &mut Frame, core: &PlayerCore, audio: &dyn PlaybackEngine, view: &ViewState) {
    let colors = PALETTE;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE_WITH_VERSION,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Tracks {}", core.playlist.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Mode {}", core.play_mode.label()),
            Style::default().fg(colors.alert),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            state_label(core.playback_state),
            Style::default().fg(colors.text),
        ),
    ]))
    .block(panel_block("Status", colors.panel_bg, colors.text, colors.border));
    frame.render_widget(header, vertical[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(vertical[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(body[1]);

    draw_playlist(frame, core, view, body[0], &colors);
    draw_favorites(frame, core, view, side[0], &colors);
    draw_now_playing(frame, core, audio, view, side[1], &colors);

    let timeline = Paragraph::new(Span::styled(
        timeline_line(core.position, core.duration, audio.volume(), view.volume_visible, 26, 14),
        Style::default().fg(colors.text),
    ))
    .block(panel_block("Timeline", colors.panel_bg, colors.text, colors.border))
    .wrap(Wrap { trim: true });
    frame.render_widget(timeline, vertical[2]);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            "Keys: Enter play row, Space play/pause, n next, b previous, m mode, f favorite, Tab switch list, v volume, Ctrl+C quit",
            Style::default().fg(colors.muted),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(core.status.as_str(), Style::default().fg(colors.text)),
    ]))
    .block(panel_block("Message", colors.panel_bg, colors.text, colors.border));
    frame.render_widget(footer, vertical[3]);
}

fn draw_playlist(frame: &mut Frame, core: &PlayerCore, view: &ViewState, area: Rect, colors: &Palette) {
    let playing = core.playback_state != PlaybackState::Stopped;
    let items: Vec<ListItem> = core
        .playlist
        .tracks()
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let marker = if playing && index == core.current_index {
                "  > "
            } else {
                "    "
            };
            let star = if core.favorites.is_favorite(index) { " *" } else { "" };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(track.name.as_str(), Style::default().fg(colors.text)),
                Span::styled(star, Style::default().fg(colors.favorite)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select(core.selected);

    let border = focus_border(view.focus == Pane::Playlist, colors);
    let list = List::new(items)
        .block(panel_block("Playlist", colors.panel_bg, colors.text, border))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_favorites(frame: &mut Frame, core: &PlayerCore, view: &ViewState, area: Rect, colors: &Palette) {
    let items: Vec<ListItem> = core
        .favorites
        .names()
        .into_iter()
        .map(|name| ListItem::new(Span::styled(name, Style::default().fg(colors.favorite))))
        .collect();

    let mut state = ListState::default();
    if view.focus == Pane::Favorites && !core.favorites.is_empty() {
        state.select(Some(view.favorite_row.min(core.favorites.len() - 1)));
    }

    let border = focus_border(view.focus == Pane::Favorites, colors);
    let list = List::new(items)
        .block(panel_block("Favorites", colors.panel_alt_bg, colors.text, border))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_now_playing(
    frame: &mut Frame,
    core: &PlayerCore,
    audio: &dyn PlaybackEngine,
    view: &ViewState,
    area: Rect,
    colors: &Palette,
) {
    let title = core
        .current_track()
        .filter(|_| audio.source().is_some())
        .map(|track| track.name.clone())
        .unwrap_or_else(|| "-".to_string());
    let artwork = view
        .artwork
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled(
                "Now",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {title}"), Style::default().fg(colors.text)),
        ]),
        Line::from(Span::styled(
            format!("Artwork {artwork}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("History {:?}", core.history.entries()),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Output  {}", audio.output_name()),
            Style::default().fg(colors.muted),
        )),
    ];
    let block = Paragraph::new(lines)
        .block(panel_block("Now Playing", colors.panel_alt_bg, colors.text, colors.border))
        .wrap(Wrap { trim: true });
    frame.render_widget(block, area);
}

fn focus_border(focused: bool, colors: &Palette) -> Color {
    if focused { colors.focus_border } else { colors.border }
}

fn state_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Stopped => "Stopped",
        PlaybackState::Paused => "Paused",
        PlaybackState::Playing => "Playing",
    }
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn timeline_line(
    elapsed: Duration,
    total: Option<Duration>,
    volume: f32,
    volume_visible: bool,
    timeline_bar_width: usize,
    volume_bar_width: usize,
) -> String {
    let ratio = total.and_then(|duration| {
        let total_secs = duration.as_secs_f64();
        (total_secs > 0.0).then_some((elapsed.as_secs_f64() / total_secs).clamp(0.0, 1.0))
    });

    let mut line = format!(
        "{} / {} {}",
        format_duration(elapsed),
        total
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, timeline_bar_width),
    );
    if volume_visible {
        line.push_str(&format!(
            "  |  Vol {} {:>3}%  +/- adjust",
            progress_bar(Some(f64::from(volume.clamp(0.0, 1.0))), volume_bar_width),
            (volume * 100.0).round() as u16
        ));
    }
    line
}
