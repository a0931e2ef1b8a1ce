//! State shared between the refresh loop and the admin handler.

use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    #[default]
    Active,
    Paused,
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshState::Active => f.write_str("active"),
            RefreshState::Paused => f.write_str("paused"),
        }
    }
}

/// Whether scheduled refreshes run. Manual refreshes ignore the gate.
#[derive(Clone, Default)]
pub struct RefreshGate {
    state: Arc<RwLock<RefreshState>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        if let Ok(mut guard) = self.state.write() {
            *guard = RefreshState::Paused;
        }
    }

    pub fn resume(&self) {
        if let Ok(mut guard) = self.state.write() {
            *guard = RefreshState::Active;
        }
    }

    pub fn status(&self) -> RefreshState {
        self.state.read().map(|g| *g).unwrap_or(RefreshState::Paused)
    }

    pub fn is_active(&self) -> bool {
        self.status() == RefreshState::Active
    }
}

/// Outcome of the most recent export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRefresh {
    pub run_id: String,
    pub finished_at: DateTime<Utc>,
    pub ok: bool,
    pub rows: usize,
    pub error: Option<String>,
}

impl LastRefresh {
    pub fn succeeded(run_id: impl Into<String>, finished_at: DateTime<Utc>, rows: usize) -> Self {
        Self {
            run_id: run_id.into(),
            finished_at,
            ok: true,
            rows,
            error: None,
        }
    }

    pub fn failed(
        run_id: impl Into<String>,
        finished_at: DateTime<Utc>,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            finished_at,
            ok: false,
            rows: 0,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Clone, Default)]
pub struct RefreshStatus {
    last: Arc<RwLock<Option<LastRefresh>>>,
}

impl RefreshStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: LastRefresh) {
        if let Ok(mut guard) = self.last.write() {
            *guard = Some(outcome);
        }
    }

    pub fn last(&self) -> Option<LastRefresh> {
        self.last.read().ok().and_then(|g| g.clone())
    }
}
