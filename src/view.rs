use crate::audio::{AudioOutput, MediaEvent};
use crate::player::{PlayerStore, StoreChange};
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Upper bound on store/output round trips handled inside one pump.
const MAX_SETTLE_ROUNDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportControls {
    pub shuffle: bool,
    pub previous: bool,
    pub play: bool,
    pub next: bool,
    pub repeat: bool,
}

/// Binds a [`PlayerStore`] to the one audio output that plays it.
///
/// The view owns the output exclusively. Each [`pump`](PlayerView::pump)
/// converges the output to the declared state (source, play/pause, loop)
/// and feeds the output's own notifications back into the store.
pub struct PlayerView {
    output: Box<dyn AudioOutput>,
    changes: Receiver<StoreChange>,
    loaded_generation: Option<u64>,
    progress_seconds: u32,
    progress_listener: bool,
    last_error: Option<String>,
}

impl PlayerView {
    pub fn new(output: Box<dyn AudioOutput>, store: &mut PlayerStore) -> Self {
        Self {
            output,
            changes: store.subscribe(),
            loaded_generation: None,
            progress_seconds: 0,
            progress_listener: false,
            last_error: None,
        }
    }

    pub fn pump(&mut self, store: &mut PlayerStore) {
        self.output.tick();

        for _ in 0..MAX_SETTLE_ROUNDS {
            let store_changed = self.apply_store_changes();
            self.sync_source(store);

            let events = self.output.drain_events();
            if events.is_empty() && !store_changed {
                break;
            }
            for event in events {
                self.handle_media_event(store, event);
            }
        }
    }

    pub fn setup_progress_listener(&mut self) {
        if let Err(err) = self.output.set_position(Duration::ZERO) {
            self.report("failed to rewind episode", &err);
        }
        self.progress_seconds = 0;
        self.progress_listener = true;
    }

    pub fn handle_seek(&mut self, amount: u32) {
        if let Err(err) = self
            .output
            .set_position(Duration::from_secs(u64::from(amount)))
        {
            self.report("seek failed", &err);
        }
        self.progress_seconds = amount;
    }

    /// Seeks relative to the current progress, clamped to the episode.
    pub fn seek_by(&mut self, store: &PlayerStore, delta_seconds: i64) {
        let Some(episode) = store.current_episode() else {
            return;
        };
        let target = (i64::from(self.progress_seconds) + delta_seconds)
            .clamp(0, i64::from(episode.duration));
        self.handle_seek(u32::try_from(target).unwrap_or(episode.duration));
    }

    pub fn handle_episode_ended(&mut self, store: &mut PlayerStore) {
        if store.has_next() {
            store.play_next();
        } else {
            store.clear_player_state();
        }
    }

    pub fn controls(&self, store: &PlayerStore) -> TransportControls {
        if store.current_episode().is_none() {
            return TransportControls::default();
        }

        TransportControls {
            shuffle: store.episode_list().len() != 1,
            previous: store.has_previous(),
            play: true,
            next: store.has_next(),
            repeat: true,
        }
    }

    pub fn progress_seconds(&self) -> u32 {
        self.progress_seconds
    }

    pub fn output(&self) -> &dyn AudioOutput {
        &*self.output
    }

    pub fn output_mut(&mut self) -> &mut dyn AudioOutput {
        &mut *self.output
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    fn apply_store_changes(&mut self) -> bool {
        let changes: Vec<StoreChange> = self.changes.try_iter().collect();
        for change in &changes {
            if let StoreChange::PlayingChanged(playing) = change {
                self.apply_playing(*playing);
            }
        }
        !changes.is_empty()
    }

    fn apply_playing(&mut self, playing: bool) {
        if !self.output.has_source() {
            return;
        }
        if playing {
            if let Err(err) = self.output.play() {
                self.report("failed to start playback", &err);
            }
        } else {
            self.output.pause();
        }
    }

    fn sync_source(&mut self, store: &PlayerStore) {
        if self.output.is_looping() != store.is_looping() {
            self.output.set_looping(store.is_looping());
        }

        if self.loaded_generation == Some(store.generation()) {
            return;
        }
        self.loaded_generation = Some(store.generation());
        self.progress_seconds = 0;
        self.progress_listener = false;

        let Some(episode) = store.current_episode() else {
            self.output.unload();
            return;
        };

        tracing::info!(title = %episode.title, url = %episode.url, "loading episode");
        let hint = Duration::from_secs(u64::from(episode.duration));
        if let Err(err) = self.output.load(&episode.url, Some(hint)) {
            self.report("failed to load episode", &err);
            return;
        }
        // Sources autoplay once loaded.
        if let Err(err) = self.output.play() {
            self.report("failed to start playback", &err);
        }
    }

    fn handle_media_event(&mut self, store: &mut PlayerStore, event: MediaEvent) {
        match event {
            MediaEvent::Play => store.set_playing_state(true),
            MediaEvent::Pause => store.set_playing_state(false),
            MediaEvent::Ended => self.handle_episode_ended(store),
            MediaEvent::LoadedMetadata => self.setup_progress_listener(),
            MediaEvent::TimeUpdate(position) => {
                if self.progress_listener {
                    self.progress_seconds = u32::try_from(position.as_secs()).unwrap_or(u32::MAX);
                }
            }
        }
    }

    fn report(&mut self, what: &str, err: &anyhow::Error) {
        tracing::warn!("{what}: {err:#}");
        self.last_error = Some(format!("{what}: {err:#}"));
    }
}
