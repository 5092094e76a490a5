//! Prediction history persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use super::Sample;
use crate::error::{EstimationError, Result};

/// One persisted prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionEntry {
    pub id: i64,
    pub company_id: String,
    pub recorded_at: DateTime<Utc>,
    pub co2e_total_kg: f64,
    pub input: Sample,
}

/// Stores predictions together with the sample that produced them
pub trait EmissionRecorder: Send + Sync {
    /// Persist a prediction and return its assigned id
    fn record(
        &self,
        company_id: &str,
        input: &Sample,
        co2e_total_kg: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<i64>;

    /// Entries for one company, oldest first
    fn history(&self, company_id: &str) -> Result<Vec<EmissionEntry>>;
}

#[derive(Debug, Default)]
struct RecorderState {
    next_id: i64,
    entries: HashMap<String, VecDeque<EmissionEntry>>,
}

/// Process-local recorder. History does not survive a restart; with a
/// limit set, only the newest entries per company are kept.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    state: RwLock<RecorderState>,
    limit: Option<usize>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` entries per company, dropping the oldest
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|s| s.entries.values().map(VecDeque::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmissionRecorder for InMemoryRecorder {
    fn record(
        &self,
        company_id: &str,
        input: &Sample,
        co2e_total_kg: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut state = self
            .state
            .write()
            .map_err(|_| EstimationError::Recorder("history lock poisoned".to_string()))?;
        state.next_id += 1;
        let id = state.next_id;
        let history = state.entries.entry(company_id.to_string()).or_default();
        history.push_back(EmissionEntry {
            id,
            company_id: company_id.to_string(),
            recorded_at,
            co2e_total_kg,
            input: input.clone(),
        });
        if let Some(limit) = self.limit {
            while history.len() > limit {
                history.pop_front();
            }
        }
        Ok(id)
    }

    fn history(&self, company_id: &str) -> Result<Vec<EmissionEntry>> {
        let state = self
            .state
            .read()
            .map_err(|_| EstimationError::Recorder("history lock poisoned".to_string()))?;
        Ok(state
            .entries
            .get(company_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase_across_companies() {
        let recorder = InMemoryRecorder::new();
        let now = Utc::now();
        let a = recorder.record("acme", &Sample::new(), 1.0, now).unwrap();
        let b = recorder.record("globex", &Sample::new(), 2.0, now).unwrap();
        assert!(b > a);
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_history_is_per_company() {
        let recorder = InMemoryRecorder::new();
        let now = Utc::now();
        recorder.record("acme", &Sample::new(), 1.0, now).unwrap();
        recorder.record("acme", &Sample::new(), 3.0, now).unwrap();
        recorder.record("globex", &Sample::new(), 2.0, now).unwrap();

        let history = recorder.history("acme").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].co2e_total_kg, 3.0);
        assert!(recorder.history("initech").unwrap().is_empty());
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let recorder = InMemoryRecorder::with_history_limit(2);
        let now = Utc::now();
        for kg in [1.0, 2.0, 3.0] {
            recorder.record("acme", &Sample::new(), kg, now).unwrap();
        }
        recorder.record("globex", &Sample::new(), 9.0, now).unwrap();

        let history = recorder.history("acme").unwrap();
        let kept: Vec<f64> = history.iter().map(|e| e.co2e_total_kg).collect();
        assert_eq!(kept, vec![2.0, 3.0]);
        assert_eq!(history[1].id, 3);
        assert_eq!(recorder.len(), 3);
    }
}
