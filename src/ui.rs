use crate::app::AppState;
use crate::audio::AudioOutput;
use crate::player::PlayerStore;
use crate::view::{PlayerView, TransportControls};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE_WITH_VERSION: &str = "podcastr v0.1.0  ";
const EMPTY_PLAYER_HINT: &str = "Select a podcast to listen";

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    active: Color,
    selected_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(69, 121, 176),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(90, 108, 133),
    accent: Color::Rgb(132, 211, 97),
    alert: Color::Rgb(249, 174, 88),
    active: Color::Rgb(159, 117, 255),
    selected_bg: Color::Rgb(34, 55, 82),
};

pub fn draw(frame: &mut Frame, app: &AppState, store: &PlayerStore, view: &PlayerView) {
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
            format!("Episodes {}", app.episodes.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(mode_label(store), Style::default().fg(colors.alert)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            view.output()
                .output_name()
                .unwrap_or_else(|| String::from("No output")),
            Style::default().fg(colors.muted),
        ),
    ]))
    .block(panel_block("Status", colors.panel_bg, colors.text, colors.border));
    frame.render_widget(header, vertical[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(vertical[1]);

    draw_episode_list(frame, app, store, body[0], &colors);
    draw_player(frame, store, view, body[1], &colors);

    let duration = store.current_episode().map_or(0, |episode| episode.duration);
    let timeline = Paragraph::new(Span::styled(
        timeline_line(view.progress_seconds(), duration, view.output().volume(), 32),
        Style::default().fg(colors.text),
    ))
    .block(panel_block(
        "Progress",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(timeline, vertical[2]);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            "Keys: Enter play list, p play one, Space pause, n/b next/prev, s shuffle, l loop, Left/Right seek, q quit",
            Style::default().fg(colors.muted),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(app.status.as_str(), Style::default().fg(colors.text)),
    ]))
    .block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, vertical[3]);
}

fn draw_episode_list(
    frame: &mut Frame,
    app: &AppState,
    store: &PlayerStore,
    area: Rect,
    colors: &Palette,
) {
    let playing_row = app.playing_row(store);
    let items: Vec<ListItem> = app
        .episodes
        .iter()
        .enumerate()
        .map(|(row, episode)| {
            let marker = if playing_row == Some(row) {
                "  > "
            } else {
                "    "
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(episode.title.as_str(), Style::default().fg(colors.text)),
                Span::styled(
                    format!("  {}", format_time(episode.duration)),
                    Style::default().fg(colors.muted),
                ),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!app.episodes.is_empty()).then_some(app.selected));

    let list = List::new(items)
        .block(panel_block(
            "Episodes",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_player(
    frame: &mut Frame,
    store: &PlayerStore,
    view: &PlayerView,
    area: Rect,
    colors: &Palette,
) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Now playing",
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    match store.current_episode() {
        Some(episode) => {
            lines.push(Line::from(Span::styled(
                episode.title.as_str(),
                Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                episode.members.as_str(),
                Style::default().fg(colors.muted),
            )));
            if !episode.thumbnail.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("Cover   {}", episode.thumbnail),
                    Style::default().fg(colors.muted),
                )));
            }
            lines.push(Line::from(Span::styled(
                format!(
                    "Queue   {}/{}",
                    store.current_episode_index() + 1,
                    store.episode_list().len()
                ),
                Style::default().fg(colors.alert),
            )));
        }
        None => lines.push(Line::from(Span::styled(
            EMPTY_PLAYER_HINT,
            Style::default().fg(colors.muted),
        ))),
    }

    lines.push(Line::from(""));
    lines.push(transport_line(view.controls(store), store, colors));

    let panel = Paragraph::new(lines)
        .block(panel_block(
            "Player",
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, area);
}

fn transport_line(
    controls: TransportControls,
    store: &PlayerStore,
    colors: &Palette,
) -> Line<'static> {
    let play_label = if store.is_playing() { "Pause" } else { "Play" };
    let buttons = [
        ("Shuffle", controls.shuffle, store.is_shuffling()),
        ("Prev", controls.previous, false),
        (play_label, controls.play, false),
        ("Next", controls.next, false),
        ("Loop", controls.repeat, store.is_looping()),
    ];

    let mut spans = Vec::with_capacity(buttons.len() * 2);
    for (idx, (label, enabled, active)) in buttons.into_iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled("  ", Style::default()));
        }
        let style = match (enabled, active) {
            (false, _) => Style::default().fg(colors.muted),
            (true, true) => Style::default()
                .fg(colors.active)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            (true, false) => Style::default().fg(colors.text),
        };
        spans.push(Span::styled(format!("[{label}]"), style));
    }
    Line::from(spans)
}

fn mode_label(store: &PlayerStore) -> String {
    let playback = if store.is_playing() { "Playing" } else { "Paused" };
    let shuffle = if store.is_shuffling() { "on" } else { "off" };
    let repeat = if store.is_looping() { "on" } else { "off" };
    format!("{playback}  Shuffle {shuffle}  Loop {repeat}")
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

/// `MM:SS` below one hour, `HH:MM:SS` from there on.
pub fn format_time(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
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

fn timeline_line(progress: u32, duration: u32, volume: f32, bar_width: usize) -> String {
    let ratio = (duration > 0).then(|| f64::from(progress) / f64::from(duration));
    format!(
        "{} {} {}  |  Vol {:>3}%",
        format_time(progress),
        progress_bar(ratio, bar_width),
        format_time(duration),
        (volume * 100.0).round() as u16
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudioOutput;
    use crate::model::Episode;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn render(app: &AppState, store: &PlayerStore, view: &PlayerView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 30)).expect("terminal");
        terminal
            .draw(|frame| draw(frame, app, store, view))
            .expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(45), "00:45");
        assert_eq!(format_time(200), "03:20");
        assert_eq!(format_time(3_725), "01:02:05");
    }

    #[test]
    fn progress_bar_is_clamped() {
        assert_eq!(progress_bar(Some(0.5), 4), "[##--]");
        assert_eq!(progress_bar(Some(3.0), 4), "[####]");
        assert_eq!(progress_bar(None, 2), "[--]");
    }

    #[test]
    fn timeline_shows_progress_and_duration() {
        let line = timeline_line(45, 200, 1.0, 10);
        assert!(line.starts_with("00:45 ["));
        assert!(line.contains("03:20"));
        assert!(line.ends_with("100%"));
    }

    #[test]
    fn empty_player_shows_hint() {
        let app = AppState::new(Vec::new(), 5);
        let mut store = PlayerStore::new();
        let view = PlayerView::new(Box::new(NullAudioOutput::new()), &mut store);

        let screen = render(&app, &store, &view);
        assert!(screen.contains(EMPTY_PLAYER_HINT));
        assert!(screen.contains("[Shuffle]"));
    }

    #[test]
    fn now_playing_shows_episode_metadata() {
        let mut episode = Episode::new("Faladev #30", 3_725, "ep30.mp3");
        episode.members = String::from("Diego and Richard");
        let app = AppState::new(vec![episode.clone()], 5);
        let mut store = PlayerStore::new();
        let mut view = PlayerView::new(Box::new(NullAudioOutput::new()), &mut store);
        store.play(episode);
        view.pump(&mut store);

        let screen = render(&app, &store, &view);
        assert!(screen.contains("Diego and Richard"));
        assert!(screen.contains("1/1"));
        assert!(screen.contains("[Pause]"));
        assert!(!screen.contains(EMPTY_PLAYER_HINT));
    }
}
