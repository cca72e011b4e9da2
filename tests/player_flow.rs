use podcastr::audio::{AudioOutput, NullAudioOutput};
use podcastr::model::Episode;
use podcastr::player::PlayerStore;
use podcastr::view::PlayerView;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::time::Duration;

fn abc() -> Vec<Episode> {
    vec![
        Episode::new("A", 100, "a.mp3"),
        Episode::new("B", 200, "b.mp3"),
        Episode::new("C", 300, "c.mp3"),
    ]
}

fn player() -> (PlayerStore, PlayerView) {
    let mut store = PlayerStore::with_rng(SmallRng::seed_from_u64(42));
    let view = PlayerView::new(Box::new(NullAudioOutput::new()), &mut store);
    (store, view)
}

#[test]
fn sequential_next_walks_queue_then_stops() {
    let (mut store, mut view) = player();
    store.play_list(abc(), 0);
    view.pump(&mut store);

    store.play_next();
    assert_eq!(store.current_episode_index(), 1);
    store.play_next();
    assert_eq!(store.current_episode_index(), 2);
    assert!(!store.has_next());
    store.play_next();
    assert_eq!(store.current_episode_index(), 2);

    view.pump(&mut store);
    assert!(store.is_playing());
}

#[test]
fn last_episode_ending_clears_queue() {
    let (mut store, mut view) = player();
    store.play(Episode::new("A", 100, "a.mp3"));
    view.pump(&mut store);

    view.handle_seek(100);
    view.pump(&mut store);

    assert!(store.episode_list().is_empty());
    assert_eq!(store.current_episode_index(), 0);
    assert!(!view.output().has_source());
}

#[test]
fn episode_end_advances_to_next_and_keeps_playing() {
    let (mut store, mut view) = player();
    store.play_list(abc(), 0);
    view.pump(&mut store);

    view.handle_seek(100);
    view.pump(&mut store);

    assert_eq!(store.current_episode_index(), 1);
    assert!(store.is_playing());
    assert!(!view.output().is_paused());
    assert_eq!(view.progress_seconds(), 0);
}

#[test]
fn loop_keeps_current_episode_at_end() {
    let (mut store, mut view) = player();
    store.play_list(abc(), 0);
    store.toggle_loop();
    assert!(store.is_looping());
    view.pump(&mut store);
    assert!(view.output().is_looping());

    view.handle_seek(100);
    view.pump(&mut store);

    assert_eq!(store.current_episode_index(), 0);
    assert_eq!(store.episode_list().len(), 3);
}

#[test]
fn seek_moves_playhead_and_progress() {
    let (mut store, mut view) = player();
    store.play_list(abc(), 1);
    view.pump(&mut store);
    store.toggle_play();
    view.pump(&mut store);

    view.handle_seek(45);

    assert_eq!(view.progress_seconds(), 45);
    assert_eq!(view.output().position(), Some(Duration::from_secs(45)));
}

#[test]
fn previous_at_start_changes_nothing() {
    let (mut store, mut view) = player();
    store.play_list(abc(), 0);
    view.pump(&mut store);
    let generation = store.generation();

    store.play_previous();
    view.pump(&mut store);

    assert_eq!(store.current_episode_index(), 0);
    assert_eq!(store.generation(), generation);
}

#[test]
fn next_selected_as_episode_ends_is_not_skipped() {
    let (mut store, mut view) = player();
    store.play_list(abc(), 0);
    view.pump(&mut store);

    view.handle_seek(100);
    store.play_next();
    view.pump(&mut store);

    assert_eq!(store.current_episode_index(), 1);
    assert!(store.is_playing());
    assert!(view.output().has_source());
    assert!(!view.output().is_paused());
}

#[test]
fn new_episode_survives_previous_one_ending() {
    let (mut store, mut view) = player();
    store.play(Episode::new("A", 100, "a.mp3"));
    view.pump(&mut store);

    view.handle_seek(100);
    store.play(Episode::new("B", 200, "b.mp3"));
    view.pump(&mut store);

    assert_eq!(store.episode_list().len(), 1);
    assert_eq!(store.current_episode().map(|episode| episode.title.as_str()), Some("B"));
    assert!(view.output().has_source());
    assert_eq!(view.progress_seconds(), 0);
}
