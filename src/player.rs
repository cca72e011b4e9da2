use crate::model::Episode;
use rand::{Rng, SeedableRng};
use rand::rngs::SmallRng;
use std::sync::mpsc::{Receiver, Sender, channel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    PlayingChanged(bool),
    LoopingChanged(bool),
    ShufflingChanged(bool),
    /// The current episode was (re)selected; the loaded source is stale.
    EpisodeSelected,
    Cleared,
}

/// Playback state shared by everything that renders or drives the player.
///
/// The queue and index are only ever replaced wholesale by [`play`] and
/// [`play_list`], moved by the navigation commands, or emptied by
/// [`clear_player_state`]. Every command is total: requests that the
/// `has_next` / `has_previous` guards reject are silently ignored.
///
/// [`play`]: PlayerStore::play
/// [`play_list`]: PlayerStore::play_list
/// [`clear_player_state`]: PlayerStore::clear_player_state
#[derive(Debug)]
pub struct PlayerStore {
    episode_list: Vec<Episode>,
    current_episode_index: usize,
    is_playing: bool,
    is_looping: bool,
    is_shuffling: bool,
    generation: u64,
    subscribers: Vec<Sender<StoreChange>>,
    rng: SmallRng,
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStore {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    pub fn with_rng(rng: SmallRng) -> Self {
        Self {
            episode_list: Vec::new(),
            current_episode_index: 0,
            is_playing: false,
            is_looping: false,
            is_shuffling: false,
            generation: 0,
            subscribers: Vec::new(),
            rng,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<StoreChange> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn play(&mut self, episode: Episode) {
        tracing::info!(title = %episode.title, "play episode");
        self.episode_list = vec![episode];
        self.current_episode_index = 0;
        self.select_current();
        self.set_playing_state(true);
    }

    pub fn play_list(&mut self, list: Vec<Episode>, index: usize) {
        if list.is_empty() {
            tracing::warn!("play_list called with an empty list");
            self.clear_player_state();
            return;
        }

        let last = list.len() - 1;
        if index > last {
            tracing::warn!(index, len = list.len(), "play_list index out of range, clamping");
        }
        tracing::info!(index, len = list.len(), "play list");
        self.episode_list = list;
        self.current_episode_index = index.min(last);
        self.select_current();
        self.set_playing_state(true);
    }

    pub fn toggle_play(&mut self) {
        self.set_playing_state(!self.is_playing);
    }

    pub fn set_playing_state(&mut self, state: bool) {
        if self.is_playing == state {
            return;
        }
        self.is_playing = state;
        self.notify(StoreChange::PlayingChanged(state));
    }

    pub fn toggle_loop(&mut self) {
        self.is_looping = !self.is_looping;
        self.notify(StoreChange::LoopingChanged(self.is_looping));
    }

    pub fn toggle_shuffle(&mut self) {
        self.is_shuffling = !self.is_shuffling;
        self.notify(StoreChange::ShufflingChanged(self.is_shuffling));
    }

    /// Shuffle draws uniformly over the whole queue, so the current episode
    /// can be drawn again.
    pub fn play_next(&mut self) {
        if self.is_shuffling {
            if self.episode_list.is_empty() {
                return;
            }
            let len = self.episode_list.len();
            self.current_episode_index = self.rng.random_range(0..len);
            self.select_current();
        } else if self.has_next() {
            self.current_episode_index += 1;
            self.select_current();
        }
    }

    pub fn play_previous(&mut self) {
        if self.has_previous() {
            self.current_episode_index -= 1;
            self.select_current();
        }
    }

    /// Leaves `is_playing` alone.
    pub fn clear_player_state(&mut self) {
        tracing::debug!("clearing player queue");
        self.episode_list.clear();
        self.current_episode_index = 0;
        self.generation += 1;
        self.notify(StoreChange::Cleared);
    }

    pub fn has_previous(&self) -> bool {
        self.current_episode_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.is_shuffling || self.current_episode_index + 1 < self.episode_list.len()
    }

    pub fn episode_list(&self) -> &[Episode] {
        &self.episode_list
    }

    pub fn current_episode_index(&self) -> usize {
        self.current_episode_index
    }

    pub fn current_episode(&self) -> Option<&Episode> {
        self.episode_list.get(self.current_episode_index)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping
    }

    pub fn is_shuffling(&self) -> bool {
        self.is_shuffling
    }

    /// Bumped on every (re)selection of the current episode.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn select_current(&mut self) {
        self.generation += 1;
        self.notify(StoreChange::EpisodeSelected);
    }

    fn notify(&mut self, change: StoreChange) {
        self.subscribers.retain(|tx| tx.send(change).is_ok());
    }
}
