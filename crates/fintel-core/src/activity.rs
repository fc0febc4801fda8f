//! Activity logging for analysis runs
//!
//! The host application owns the audit trail; the engine only hands it one
//! `ai_analysis` entry per analysis call. Logger failures are reported via
//! `tracing` and otherwise ignored by the engine.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::Transaction;

/// Activity type used for every analysis entry
pub const AI_ANALYSIS: &str = "ai_analysis";

/// One activity log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub action: String,
    pub metadata: serde_json::Value,
}

impl ActivityEntry {
    pub fn analysis(action: &str, metadata: serde_json::Value) -> Self {
        Self {
            activity_type: AI_ANALYSIS.to_string(),
            action: action.to_string(),
            metadata,
        }
    }
}

/// Sink for activity entries
#[async_trait]
pub trait ActivityLogger: Send + Sync {
    async fn log(&self, entry: ActivityEntry) -> Result<()>;
}

/// Writes entries to the `tracing` subscriber
#[derive(Debug, Clone, Default)]
pub struct TracingActivityLogger;

#[async_trait]
impl ActivityLogger for TracingActivityLogger {
    async fn log(&self, entry: ActivityEntry) -> Result<()> {
        info!(
            activity = %entry.activity_type,
            action = %entry.action,
            metadata = %entry.metadata,
            "Activity"
        );
        Ok(())
    }
}

/// Discards entries
#[derive(Debug, Clone, Default)]
pub struct NoopActivityLogger;

#[async_trait]
impl ActivityLogger for NoopActivityLogger {
    async fn log(&self, _entry: ActivityEntry) -> Result<()> {
        Ok(())
    }
}

/// Keeps entries in memory (tests, or hosts that batch their own writes)
#[derive(Debug, Clone, Default)]
pub struct MemoryActivityLogger {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl MemoryActivityLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActivityLogger for MemoryActivityLogger {
    async fn log(&self, entry: ActivityEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| Error::Activity("Failed to acquire activity log lock".into()))?
            .push(entry);
        Ok(())
    }
}

/// Short, stable fingerprint of an input batch
///
/// Lets the host correlate activity entries with the data they describe
/// without storing the transactions themselves.
pub fn input_digest(transactions: &[Transaction]) -> String {
    let mut hasher = Sha256::new();
    for t in transactions {
        hasher.update(t.id.as_bytes());
        hasher.update([0u8]);
        if let Some(date) = t.date {
            hasher.update(date.to_string().as_bytes());
        }
        hasher.update([0u8]);
        if let Some(amount) = t.amount {
            hasher.update(amount.to_le_bytes());
        }
        hasher.update([0u8]);
    }
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_memory_logger_records_entries() {
        let logger = MemoryActivityLogger::new();
        logger
            .log(ActivityEntry::analysis(
                "detect_anomalies",
                serde_json::json!({"source": "heuristic"}),
            ))
            .await
            .unwrap();

        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].activity_type, "ai_analysis");
        assert_eq!(entries[0].action, "detect_anomalies");
    }

    #[test]
    fn test_entry_serializes_type_field() {
        let entry = ActivityEntry::analysis("identify_patterns", serde_json::json!({}));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "ai_analysis");
    }

    #[test]
    fn test_input_digest_stable_and_sensitive() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let a = vec![Transaction::new("t1", day, "Coffee", -3.0)];
        let b = vec![Transaction::new("t1", day, "Coffee", -3.5)];
        assert_eq!(input_digest(&a), input_digest(&a));
        assert_ne!(input_digest(&a), input_digest(&b));
        assert_eq!(input_digest(&a).len(), 16);
    }
}
