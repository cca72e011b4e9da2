#![no_main]

use libfuzzer_sys::fuzz_target;
use podcastr::audio::NullAudioOutput;
use podcastr::model::Episode;
use podcastr::player::PlayerStore;
use podcastr::view::PlayerView;

fuzz_target!(|data: &[u8]| {
    let mut store = PlayerStore::new();
    let mut view = PlayerView::new(Box::new(NullAudioOutput::new()), &mut store);
    let len = (data.len() % 32).max(1);
    let episodes: Vec<Episode> = (0..len)
        .map(|idx| Episode::new(&format!("episode {idx}"), 60, &format!("episode_{idx}.mp3")))
        .collect();

    for byte in data {
        match byte % 10 {
            0 => store.play_list(episodes.clone(), usize::from(*byte) % len),
            1 => store.play(episodes[0].clone()),
            2 => store.toggle_play(),
            3 => store.toggle_shuffle(),
            4 => store.toggle_loop(),
            5 => store.play_next(),
            6 => store.play_previous(),
            7 => view.handle_seek(u32::from(*byte)),
            8 => view.handle_episode_ended(&mut store),
            _ => store.clear_player_state(),
        }
        view.pump(&mut store);

        let index = store.current_episode_index();
        assert_eq!(store.has_previous(), index > 0);
        assert!(store.episode_list().is_empty() || index < store.episode_list().len());
    }
});
