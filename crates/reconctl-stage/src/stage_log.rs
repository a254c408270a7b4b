//! Per-run record of every Stage's terminal state and duration, threaded
//! through [`crate::RunContext`] so the `aggregate` Stage can build
//! `scan_info.stages` (spec §4.7) without the Pipeline Engine handing it
//! data out-of-band. The engine is the sole writer, one entry per Stage,
//! written once the Stage leaves RUNNING — the same event that triggers a
//! State Journal write.

use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalState {
    Ok,
    Failed,
    Skipped,
}

impl TerminalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Ok => "ok",
            TerminalState::Failed => "failed",
            TerminalState::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub name: String,
    pub state: TerminalState,
    pub reason: Option<String>,
    pub duration_ms: u64,
}

/// Append-mostly log guarded by a single `RwLock`; small (one entry per
/// Stage in the catalog), so no finer-grained locking is warranted.
#[derive(Debug, Default)]
pub struct StageLog {
    records: RwLock<Vec<StageRecord>>,
}

impl StageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: StageRecord) {
        let mut records = self.records.write().unwrap();
        if let Some(existing) = records.iter_mut().find(|r| r.name == record.name) {
            *existing = record;
        } else {
            records.push(record);
        }
    }

    pub fn snapshot(&self) -> Vec<StageRecord> {
        self.records.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_replaces_existing_entry_for_same_stage() {
        let log = StageLog::new();
        log.record(StageRecord {
            name: "passive_enum".into(),
            state: TerminalState::Ok,
            reason: None,
            duration_ms: 10,
        });
        log.record(StageRecord {
            name: "passive_enum".into(),
            state: TerminalState::Failed,
            reason: Some("boom".into()),
            duration_ms: 20,
        });
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].duration_ms, 20);
    }
}
