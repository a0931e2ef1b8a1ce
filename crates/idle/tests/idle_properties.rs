use chrono::{Days, NaiveDate};
use idle::{compute_idle_runs, compute_sorted, IdleObservation};
use proptest::prelude::*;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Sorted observations for up to four vessels, one per day each.
fn sorted_observations() -> impl Strategy<Value = Vec<IdleObservation>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), 0..10), 0..4).prop_map(|vessels| {
        vessels
            .into_iter()
            .enumerate()
            .flat_map(|(vessel, flags)| {
                flags.into_iter().enumerate().map(move |(offset, idle)| {
                    IdleObservation::new(
                        9_000_000 + vessel as i64,
                        base_date() + Days::new(offset as u64),
                        idle,
                    )
                })
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn streak_never_exceeds_position_within_vessel(observations in sorted_observations()) {
        let runs = compute_idle_runs(&observations).unwrap();
        prop_assert_eq!(runs.len(), observations.len());

        let mut position = 0u32;
        for (idx, run) in runs.iter().enumerate() {
            if idx > 0 && runs[idx - 1].observation.imo != run.observation.imo {
                position = 0;
            }
            prop_assert!(run.idle_days <= position + 1);
            position += 1;
        }
    }

    #[test]
    fn streak_steps_by_one_and_resets_to_zero(observations in sorted_observations()) {
        let runs = compute_idle_runs(&observations).unwrap();
        for (idx, run) in runs.iter().enumerate() {
            if !run.observation.idle {
                prop_assert_eq!(run.idle_days, 0);
                prop_assert_eq!(run.reported_idle(), 0);
                continue;
            }
            let same_vessel = idx > 0 && runs[idx - 1].observation.imo == run.observation.imo;
            let expected = if same_vessel { runs[idx - 1].idle_days + 1 } else { 1 };
            prop_assert_eq!(run.idle_days, expected);
            prop_assert_eq!(run.reported_idle(), run.idle_days);
        }
    }

    #[test]
    fn identical_input_gives_identical_output(observations in sorted_observations()) {
        let first = compute_idle_runs(&observations).unwrap();
        let second = compute_idle_runs(&observations).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn sorting_recovers_shuffled_input(observations in sorted_observations()) {
        let expected = compute_idle_runs(&observations).unwrap();
        let mut reversed = observations.clone();
        reversed.reverse();
        prop_assert_eq!(compute_sorted(reversed).unwrap(), expected);
    }
}
