//! Next-track selection under an ordering policy.
//!
//! Selection is a pure function of the current track, the queue and the
//! policy; randomness comes from the caller's RNG so tests can seed it.

use crate::error::SelectError;
use crate::model::{OrderPolicy, Track};
use rand::Rng;

/// Upper bound on redraws when a random pick lands on the current track.
const MAX_RANDOM_DRAWS: usize = 16;

/// Picks the track that follows `current` in `queue`.
///
/// `current` is matched by `src`. In sequential order the last track yields
/// itself; the queue does not wrap around. In random order a repeat of the
/// current track is only accepted when the queue holds two tracks or fewer.
pub fn select_next<'q, R: Rng + ?Sized>(
    current: &Track,
    queue: &'q [Track],
    policy: OrderPolicy,
    rng: &mut R,
) -> Result<&'q Track, SelectError> {
    let idx = next_index(current, queue, policy, rng)?;
    Ok(&queue[idx])
}

/// Index form of [`select_next`].
pub fn next_index<R: Rng + ?Sized>(
    current: &Track,
    queue: &[Track],
    policy: OrderPolicy,
    rng: &mut R,
) -> Result<usize, SelectError> {
    if queue.is_empty() {
        return Err(SelectError::EmptyQueue);
    }

    let position = queue.iter().position(|track| track.src == current.src);
    let last = queue.len() - 1;

    let idx = match policy {
        OrderPolicy::Sequential => match position {
            Some(idx) if idx < last => idx + 1,
            Some(idx) => idx,
            None => 0,
        },
        OrderPolicy::Random => {
            let Some(current_idx) = position else {
                return Ok(rng.random_range(0..=last));
            };
            random_avoiding(current_idx, queue.len(), rng)
        }
    };

    Ok(idx)
}

fn random_avoiding<R: Rng + ?Sized>(current: usize, len: usize, rng: &mut R) -> usize {
    let mut pick = rng.random_range(0..len);
    if len <= 2 {
        return pick;
    }

    for _ in 0..MAX_RANDOM_DRAWS {
        if pick != current {
            return pick;
        }
        pick = rng.random_range(0..len);
    }

    if pick == current {
        // uniform over the other len - 1 slots
        pick = (current + 1 + rng.random_range(0..len - 1)) % len;
    }
    pick
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert;
    use proptest::prop_assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn queue(names: &[&str]) -> Vec<Track> {
        names
            .iter()
            .map(|name| Track::new(format!("{name}.mp3"), *name))
            .collect()
    }

    #[test]
    fn sequential_returns_following_track() {
        let q = queue(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(&q[1], &q, OrderPolicy::Sequential, &mut rng).expect("next");
        assert_eq!(next.src, "c.mp3");
    }

    #[test]
    fn sequential_stays_on_last_track_without_wrapping() {
        let q = queue(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(&q[2], &q, OrderPolicy::Sequential, &mut rng).expect("next");
        assert_eq!(next.src, "c.mp3");
        assert_ne!(next.src, q[0].src);
    }

    #[test]
    fn sequential_starts_at_head_when_current_is_missing() {
        let q = queue(&["a", "b", "c"]);
        let stranger = Track::new("z.mp3", "z");
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next(&stranger, &q, OrderPolicy::Sequential, &mut rng).expect("next");
        assert_eq!(next.src, "a.mp3");
    }

    #[test]
    fn single_track_queue_returns_itself_for_any_policy() {
        let q = queue(&["a"]);
        let mut rng = StdRng::seed_from_u64(9);
        for policy in [OrderPolicy::Sequential, OrderPolicy::Random] {
            let next = select_next(&q[0], &q, policy, &mut rng).expect("next");
            assert_eq!(next.src, "a.mp3");
        }
    }

    #[test]
    fn two_track_random_allows_repeats() {
        let q = queue(&["a", "b"]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut repeats = 0;
        let mut switches = 0;
        for _ in 0..1000 {
            let next = select_next(&q[0], &q, OrderPolicy::Random, &mut rng).expect("next");
            if next.src == q[0].src {
                repeats += 1;
            } else {
                switches += 1;
            }
        }
        assert!(repeats > 0, "a repeat must be possible with two tracks");
        assert!(switches > 0);
    }

    #[test]
    fn empty_queue_fails_fast() {
        let current = Track::new("a.mp3", "a");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            next_index(&current, &[], OrderPolicy::Random, &mut rng),
            Err(SelectError::EmptyQueue)
        );
    }

    #[test]
    fn capped_redraw_still_avoids_current() {
        // An RNG that always yields zero forces every draw onto index 0.
        struct Zero;
        impl rand::RngCore for Zero {
            fn next_u32(&mut self) -> u32 {
                0
            }
            fn next_u64(&mut self) -> u64 {
                0
            }
            fn fill_bytes(&mut self, dst: &mut [u8]) {
                dst.fill(0);
            }
        }

        let q = queue(&["a", "b", "c", "d"]);
        let idx = next_index(&q[0], &q, OrderPolicy::Random, &mut Zero).expect("next");
        assert_ne!(idx, 0);
    }

    proptest::proptest! {
        #[test]
        fn random_never_repeats_above_two_tracks(len in 3usize..40, current in 0usize..40, seed in proptest::num::u64::ANY) {
            let q: Vec<Track> = (0..len).map(|n| Track::new(format!("{n}.mp3"), format!("{n}"))).collect();
            let current = current % len;
            let mut rng = StdRng::seed_from_u64(seed);
            let idx = next_index(&q[current], &q, OrderPolicy::Random, &mut rng).expect("next");
            prop_assert!(idx < len);
            prop_assert!(idx != current);
        }

        #[test]
        fn sequential_is_deterministic(len in 1usize..40, current in 0usize..40, a in proptest::num::u64::ANY, b in proptest::num::u64::ANY) {
            let q: Vec<Track> = (0..len).map(|n| Track::new(format!("{n}.mp3"), format!("{n}"))).collect();
            let current = current % len;
            let first = next_index(&q[current], &q, OrderPolicy::Sequential, &mut StdRng::seed_from_u64(a)).expect("next");
            let second = next_index(&q[current], &q, OrderPolicy::Sequential, &mut StdRng::seed_from_u64(b)).expect("next");
            prop_assert_eq!(first, second);
            prop_assert_eq!(first, (current + 1).min(len - 1));
        }
    }
}
