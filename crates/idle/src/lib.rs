//! Per-vessel idle-run accumulation.
//!
//! Each vessel reports one idle flag per day. A run is a maximal stretch of
//! consecutive idle days for the same vessel; [`compute_idle_runs`] tags every
//! observation with the length of the run ending at it, and [`snapshot`]
//! keeps the latest observation per vessel.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_WINDOW_DAYS: u32 = 7;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdleError {
    #[error(
        "observations out of order at index {index}: ({prev_imo}, {prev_date}) precedes ({imo}, {date})"
    )]
    Unsorted {
        index: usize,
        prev_imo: i64,
        prev_date: NaiveDate,
        imo: i64,
        date: NaiveDate,
    },
    #[error("duplicate idle observation for imo {imo} on {date}")]
    DuplicateDate { imo: i64, date: NaiveDate },
    #[error("idle flag for imo {imo} on {date} must be 0 or 1, got {value}")]
    InvalidFlag {
        imo: i64,
        date: NaiveDate,
        value: i64,
    },
    #[error("idle window must cover at least one day")]
    EmptyWindow,
}

/// One day of idle state for one vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleObservation {
    pub imo: i64,
    pub date: NaiveDate,
    pub idle: bool,
}

impl IdleObservation {
    pub fn new(imo: i64, date: NaiveDate, idle: bool) -> Self {
        Self { imo, date, idle }
    }

    /// Builds an observation from the integer flag stored in the database.
    pub fn from_flag(imo: i64, date: NaiveDate, value: i64) -> Result<Self, IdleError> {
        match value {
            0 => Ok(Self::new(imo, date, false)),
            1 => Ok(Self::new(imo, date, true)),
            _ => Err(IdleError::InvalidFlag { imo, date, value }),
        }
    }

    fn key(&self) -> (i64, NaiveDate) {
        (self.imo, self.date)
    }
}

/// An observation together with the idle streak ending at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdleRun {
    pub observation: IdleObservation,
    pub idle_days: u32,
}

impl IdleRun {
    /// Single-column idle value used by the extracts: the streak length when
    /// idle, the raw flag otherwise.
    pub fn reported_idle(&self) -> u32 {
        if self.idle_days != 0 {
            self.idle_days
        } else {
            u32::from(self.observation.idle)
        }
    }
}

/// Sorts by `(imo, date)` ascending, the order [`compute_idle_runs`] requires.
pub fn sort_observations(observations: &mut [IdleObservation]) {
    observations.sort_by_key(IdleObservation::key);
}

/// Fails on the first pair that is not strictly ascending by `(imo, date)`.
pub fn check_sorted(observations: &[IdleObservation]) -> Result<(), IdleError> {
    for (offset, pair) in observations.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        if prev.key() == cur.key() {
            return Err(IdleError::DuplicateDate {
                imo: cur.imo,
                date: cur.date,
            });
        }
        if prev.key() > cur.key() {
            return Err(IdleError::Unsorted {
                index: offset + 1,
                prev_imo: prev.imo,
                prev_date: prev.date,
                imo: cur.imo,
                date: cur.date,
            });
        }
    }
    Ok(())
}

/// Tags each observation with the length of the idle run ending at it.
///
/// Input must be sorted by `(imo, date)` with no repeated day per vessel;
/// anything else is rejected rather than yielding wrong streaks. Output keeps
/// the input order.
pub fn compute_idle_runs(observations: &[IdleObservation]) -> Result<Vec<IdleRun>, IdleError> {
    check_sorted(observations)?;

    let mut runs = Vec::with_capacity(observations.len());
    let mut previous: Option<(i64, u32)> = None;
    for observation in observations {
        let idle_days = match (observation.idle, previous) {
            (false, _) => 0,
            (true, Some((imo, days))) if imo == observation.imo => days + 1,
            (true, _) => 1,
        };
        previous = Some((observation.imo, idle_days));
        runs.push(IdleRun {
            observation: *observation,
            idle_days,
        });
    }
    Ok(runs)
}

/// Sorts a copy of the input and computes runs over it.
pub fn compute_sorted(mut observations: Vec<IdleObservation>) -> Result<Vec<IdleRun>, IdleError> {
    sort_observations(&mut observations);
    compute_idle_runs(&observations)
}

/// Trailing window of days ending at the evaluation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleWindow {
    days: u32,
}

impl Default for IdleWindow {
    fn default() -> Self {
        Self {
            days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl IdleWindow {
    pub fn new(days: u32) -> Result<Self, IdleError> {
        if days == 0 {
            return Err(IdleError::EmptyWindow);
        }
        Ok(Self { days })
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// First date inside the window.
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.days)))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date >= self.start(today)
    }

    pub fn apply<I>(&self, observations: I, today: NaiveDate) -> Vec<IdleObservation>
    where
        I: IntoIterator<Item = IdleObservation>,
    {
        observations
            .into_iter()
            .filter(|obs| self.contains(obs.date, today))
            .collect()
    }
}

/// Latest idle state of one vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdleSnapshot {
    pub imo: i64,
    pub date: NaiveDate,
    pub idle: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdleSnapshots {
    by_imo: BTreeMap<i64, IdleSnapshot>,
}

impl IdleSnapshots {
    pub fn get(&self, imo: i64) -> Option<&IdleSnapshot> {
        self.by_imo.get(&imo)
    }

    /// Reported idle value for a vessel, 0 when it has no observation.
    pub fn reported_idle(&self, imo: i64) -> u32 {
        self.by_imo.get(&imo).map(|s| s.idle).unwrap_or(0)
    }
}

/// Keeps the maximum-date run of every vessel.
pub fn snapshot(runs: &[IdleRun]) -> IdleSnapshots {
    let mut by_imo: BTreeMap<i64, IdleSnapshot> = BTreeMap::new();
    for run in runs {
        let candidate = IdleSnapshot {
            imo: run.observation.imo,
            date: run.observation.date,
            idle: run.reported_idle(),
        };
        by_imo
            .entry(candidate.imo)
            .and_modify(|current| {
                if candidate.date > current.date {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }
    IdleSnapshots { by_imo }
}

/// Window, sort, accumulate and snapshot in one step.
pub fn idle_snapshots(
    observations: Vec<IdleObservation>,
    window: IdleWindow,
    today: NaiveDate,
) -> Result<IdleSnapshots, IdleError> {
    let runs = compute_sorted(window.apply(observations, today))?;
    Ok(snapshot(&runs))
}
