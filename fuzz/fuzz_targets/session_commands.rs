#![no_main]

use horen::audio::NullBackend;
use horen::model::{OrderPolicy, Track};
use horen::session::PlaybackSession;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut backend = NullBackend::new();
    backend.hold_events(true);
    let mut session = PlaybackSession::with_seed(backend, 7);

    let len = (data.len() % 16).max(1);
    let queue: Vec<Track> = (0..len)
        .map(|idx| {
            let mut track = Track::new(format!("track_{idx}.mp3"), format!("track {idx}"));
            track.duration = 60.0;
            track
        })
        .collect();
    session.set_queue(queue.clone());
    let _ = session.load_track(queue[0].clone());

    for byte in data {
        match byte % 8 {
            0 => {
                let _ = session.advance();
            }
            1 => {
                if let Some(event) = session.backend_mut().step() {
                    session.handle_event(event);
                }
            }
            2 => session.set_policy(session.policy().next()),
            3 => session.toggle_pause(),
            4 => {
                let _ = session.seek_to(f64::from(*byte) / 255.0);
            }
            5 => {
                let _ = session.select(&queue[usize::from(*byte) % len].src);
            }
            6 => {
                let _ = session.tick();
            }
            _ => session.set_volume(f32::from(*byte) / 128.0),
        }

        assert!((0.0..=1.0).contains(&session.progress()));
        assert_eq!(session.is_switching(), session.pending_track().is_some());
        if let Some(current) = session.current_track() {
            assert!(queue.iter().any(|track| track.src == current.src));
        }
    }
    let _ = session.drain_events();
});
