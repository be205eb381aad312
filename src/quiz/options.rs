use std::ops::RangeInclusive;

use rand::seq::SliceRandom;
use rand::Rng;

/// How many answer buttons every question shows.
pub const OPTION_COUNT: usize = 4;

/// Range the drills draw their answers and distractors from.
pub const DEFAULT_RANGE: RangeInclusive<i32> = 1..=9;

/// Builds the four answer options for `correct` using the default range.
pub fn generate_options(correct: i32) -> [i32; OPTION_COUNT] {
    generate_options_in(correct, DEFAULT_RANGE, &mut rand::thread_rng())
}

/// Builds four distinct options containing `correct`, in random order.
///
/// Candidates are the correct answer, its two neighbours and one random value
/// from `range`. Neighbours that fall outside the range are pulled back inside
/// it (so `1` gets `2` as its lower neighbour, `9` gets `8` as its upper one).
/// Duplicates are dropped and the set is topped up with random values from the
/// range that aren't already present.
///
/// Panics if `range` holds fewer than [`OPTION_COUNT`] values.
pub fn generate_options_in<R: Rng + ?Sized>(
    correct: i32,
    range: RangeInclusive<i32>,
    rng: &mut R,
) -> [i32; OPTION_COUNT] {
    let (min, max) = (*range.start(), *range.end());
    assert!(
        i64::from(max) - i64::from(min) + 1 >= OPTION_COUNT as i64,
        "option range {min}..={max} is too small"
    );

    let below = if correct <= min { min + 1 } else { correct - 1 };
    let above = if correct >= max { max - 1 } else { correct + 1 };
    let random = rng.gen_range(range.clone());

    let mut picked = Vec::with_capacity(OPTION_COUNT);
    for candidate in [correct, below, above, random] {
        if !picked.contains(&candidate) {
            picked.push(candidate);
        }
    }
    top_up(&mut picked, range, rng);

    let mut options = [0; OPTION_COUNT];
    options.copy_from_slice(&picked);
    options.shuffle(rng);
    options
}

/// Fills `picked` with random values from `range` until it holds
/// [`OPTION_COUNT`] distinct entries, drawing uniformly from the values not
/// yet present.
pub(crate) fn top_up<R: Rng + ?Sized>(
    picked: &mut Vec<i32>,
    range: RangeInclusive<i32>,
    rng: &mut R,
) {
    picked.truncate(OPTION_COUNT);
    while picked.len() < OPTION_COUNT {
        let free = range
            .clone()
            .filter(|value| !picked.contains(value))
            .collect::<Vec<_>>();
        match free.choose(rng) {
            Some(value) => picked.push(*value),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_valid(options: &[i32; OPTION_COUNT], correct: i32) {
        assert!(options.contains(&correct), "{options:?} misses {correct}");
        for (i, a) in options.iter().enumerate() {
            for b in &options[i + 1..] {
                assert_ne!(a, b, "{options:?} has duplicates");
            }
        }
    }

    #[test]
    fn always_four_distinct_options_with_the_answer() {
        let mut rng = StdRng::seed_from_u64(7);
        for correct in 1..=9 {
            for _ in 0..200 {
                let options = generate_options_in(correct, DEFAULT_RANGE, &mut rng);
                assert_valid(&options, correct);
            }
        }
    }

    #[test]
    fn thread_rng_entry_point() {
        for correct in 1..=9 {
            assert_valid(&generate_options(correct), correct);
        }
    }

    #[test]
    fn neighbours_stay_inside_the_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let low = generate_options_in(1, DEFAULT_RANGE, &mut rng);
            assert!(low.contains(&2));
            assert!(!low.contains(&0));

            let high = generate_options_in(9, DEFAULT_RANGE, &mut rng);
            assert!(high.contains(&8));
            assert!(!high.contains(&10));
        }
    }

    #[test]
    fn keeps_both_neighbours_in_the_middle() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let options = generate_options_in(6, DEFAULT_RANGE, &mut rng);
            assert!(options.contains(&5));
            assert!(options.contains(&7));
        }
    }

    #[test]
    fn order_is_shuffled() {
        let mut rng = StdRng::seed_from_u64(42);
        let first_positions = (0..200)
            .map(|_| {
                let options = generate_options_in(5, DEFAULT_RANGE, &mut rng);
                options.iter().position(|o| *o == 5).unwrap()
            })
            .collect::<Vec<_>>();
        for slot in 0..OPTION_COUNT {
            assert!(first_positions.contains(&slot), "answer never landed in slot {slot}");
        }
    }

    #[test]
    fn works_with_a_tight_range() {
        let mut rng = StdRng::seed_from_u64(5);
        for correct in 3..=6 {
            let mut options = generate_options_in(correct, 3..=6, &mut rng);
            options.sort();
            assert_eq!(options, [3, 4, 5, 6]);
        }
    }

    #[test]
    #[should_panic(expected = "too small")]
    fn rejects_a_range_that_cannot_hold_four_values() {
        generate_options_in(2, 1..=3, &mut StdRng::seed_from_u64(1));
    }

    #[test]
    fn top_up_stops_at_four() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut picked = vec![4, 5, 6, 7, 8];
        top_up(&mut picked, DEFAULT_RANGE, &mut rng);
        assert_eq!(picked, vec![4, 5, 6, 7]);

        let mut picked = vec![4];
        top_up(&mut picked, DEFAULT_RANGE, &mut rng);
        assert_eq!(picked.len(), OPTION_COUNT);
        assert_eq!(picked[0], 4);
    }
}
