use crate::audio::{AudioOutput, NullAudioOutput, RodioAudioOutput};
use crate::catalog;
use crate::model::{Episode, Settings};
use crate::player::PlayerStore;
use crate::view::PlayerView;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct AppStartupOptions {
    pub settings: Settings,
    pub episodes_file: Option<PathBuf>,
    pub null_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    SelectNext,
    SelectPrev,
    PlaySelectedInList,
    PlaySelected,
    TogglePlay,
    Next,
    Previous,
    ToggleShuffle,
    ToggleLoop,
    SeekForward,
    SeekBackward,
    VolumeUp,
    VolumeDown,
}

/// Everything the shell owns besides the store and the player view.
#[derive(Debug)]
pub struct AppState {
    pub episodes: Vec<Episode>,
    pub selected: usize,
    pub seek_step_seconds: u16,
    pub status: String,
    pub dirty: bool,
    /// Catalog row behind each queue position of the last queue started here.
    queue_rows: Vec<usize>,
}

impl AppState {
    pub fn new(episodes: Vec<Episode>, seek_step_seconds: u16) -> Self {
        Self {
            episodes,
            selected: 0,
            seek_step_seconds,
            status: String::from("Ready"),
            dirty: true,
            queue_rows: Vec::new(),
        }
    }

    pub fn select_next(&mut self) {
        if self.episodes.is_empty() {
            return;
        }
        self.selected = (self.selected + 1).min(self.episodes.len() - 1);
        self.dirty = true;
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.dirty = true;
    }

    /// Catalog row of the episode the store is on, if this shell queued it.
    pub fn playing_row(&self, store: &PlayerStore) -> Option<usize> {
        store.current_episode()?;
        self.queue_rows
            .get(store.current_episode_index())
            .copied()
    }

    pub fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

/// Loads the startup catalog. A missing file leaves the list empty and
/// yields a status message; a malformed one is an error.
pub fn startup_catalog(path: Option<&Path>) -> Result<(Vec<Episode>, Option<String>)> {
    let Some(path) = path else {
        return Ok((
            Vec::new(),
            Some(String::from(
                "No episode catalog given, start with --episodes <file.json>",
            )),
        ));
    };
    if !path.exists() {
        tracing::warn!(path = %path.display(), "episode catalog not found");
        return Ok((
            Vec::new(),
            Some(format!("Episode catalog not found: {}", path.display())),
        ));
    }
    Ok((catalog::load_catalog(path)?, None))
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let episodes_file = options
        .episodes_file
        .or_else(|| options.settings.episodes_file.clone());
    let (episodes, startup_status) = startup_catalog(episodes_file.as_deref())?;

    let mut output = open_output(options.null_audio || options.settings.null_audio);
    output.set_volume(options.settings.volume);

    let mut app = AppState::new(episodes, options.settings.seek_step_seconds);
    if let Some(message) = startup_status {
        app.set_status(&message);
    }
    let mut store = PlayerStore::new();
    let mut view = PlayerView::new(output, &mut store);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_tick = Instant::now();

    let result: Result<()> = loop {
        view.pump(&mut store);
        if let Some(err) = view.take_error() {
            app.set_status(&err);
        }

        if app.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| crate::ui::draw(frame, &app, &store, &view))?;
            app.dirty = false;
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

        let Some(action) = action_for_key(key) else {
            continue;
        };
        if action == Action::Quit {
            break Ok(());
        }
        apply_action(&mut app, &mut store, &mut view, action);
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    tracing::info!("player closed");
    result
}

fn open_output(null_audio: bool) -> Box<dyn AudioOutput> {
    if null_audio {
        return Box::new(NullAudioOutput::new());
    }
    match RodioAudioOutput::new() {
        Ok(output) => Box::new(output),
        Err(err) => {
            tracing::warn!("no audio device, falling back to null output: {err:#}");
            Box::new(NullAudioOutput::new())
        }
    }
}

pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    let action = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Down => Action::SelectNext,
        KeyCode::Up => Action::SelectPrev,
        KeyCode::Enter => Action::PlaySelectedInList,
        KeyCode::Char('p') => Action::PlaySelected,
        KeyCode::Char(' ') => Action::TogglePlay,
        KeyCode::Char('n') => Action::Next,
        KeyCode::Char('b') => Action::Previous,
        KeyCode::Char('s') => Action::ToggleShuffle,
        KeyCode::Char('l') => Action::ToggleLoop,
        KeyCode::Right => Action::SeekForward,
        KeyCode::Left => Action::SeekBackward,
        KeyCode::Char('+') | KeyCode::Char('=') => Action::VolumeUp,
        KeyCode::Char('-') => Action::VolumeDown,
        _ => return None,
    };
    Some(action)
}

pub fn apply_action(
    app: &mut AppState,
    store: &mut PlayerStore,
    view: &mut PlayerView,
    action: Action,
) {
    let controls = view.controls(store);
    app.dirty = true;

    match action {
        Action::Quit => {}
        Action::SelectNext => app.select_next(),
        Action::SelectPrev => app.select_prev(),
        Action::PlaySelectedInList => {
            if app.episodes.is_empty() {
                app.set_status("No episodes loaded");
                return;
            }
            store.play_list(app.episodes.clone(), app.selected);
            app.queue_rows = (0..app.episodes.len()).collect();
            app.set_status("Playing episode list");
        }
        Action::PlaySelected => {
            let Some(episode) = app.episodes.get(app.selected).cloned() else {
                app.set_status("No episodes loaded");
                return;
            };
            store.play(episode);
            app.queue_rows = vec![app.selected];
            app.set_status("Playing episode");
        }
        Action::TogglePlay if controls.play => store.toggle_play(),
        Action::Next if controls.next => store.play_next(),
        Action::Previous if controls.previous => store.play_previous(),
        Action::ToggleShuffle if controls.shuffle => {
            store.toggle_shuffle();
            let state = if store.is_shuffling() { "on" } else { "off" };
            app.set_status(&format!("Shuffle {state}"));
        }
        Action::ToggleLoop if controls.repeat => {
            store.toggle_loop();
            let state = if store.is_looping() { "on" } else { "off" };
            app.set_status(&format!("Loop {state}"));
        }
        Action::SeekForward if controls.play => {
            view.seek_by(store, i64::from(app.seek_step_seconds));
        }
        Action::SeekBackward if controls.play => {
            view.seek_by(store, -i64::from(app.seek_step_seconds));
        }
        Action::VolumeUp | Action::VolumeDown => {
            let delta = if action == Action::VolumeUp {
                VOLUME_STEP
            } else {
                -VOLUME_STEP
            };
            let output = view.output_mut();
            let next = output.volume() + delta;
            output.set_volume(next);
            let volume = view.output().volume();
            app.set_status(&format!("Volume: {}%", (volume * 100.0).round() as u16));
        }
        _ => app.set_status("Not available right now"),
    }
}
