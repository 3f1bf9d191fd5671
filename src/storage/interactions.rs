//! Interaction log
//!
//! Every answered question is kept as one JSON row in sled.
//!
//! Key: UTC nanoseconds as u64 big-endian bytes (sorts chronologically).
//! Two records landing on the same nanosecond are bumped forward by one, so
//! nothing is overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum InteractionLogError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One chat exchange with its timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub user_question: String,
    pub bot_response: String,
    pub cit: f64,
    pub drt: f64,
    pub rgt: f64,
    pub personality: String,
    pub llm: String,
    /// Context block the answer was generated with
    pub relative_data: String,
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    /// Fresh record stamped with a new id and the current time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_question: &str,
        bot_response: &str,
        cit: f64,
        drt: f64,
        rgt: f64,
        personality: &str,
        llm: &str,
        relative_data: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_question: user_question.to_string(),
            bot_response: bot_response.to_string(),
            cit,
            drt,
            rgt,
            personality: personality.to_string(),
            llm: llm.to_string(),
            relative_data: relative_data.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn key_nanos(&self) -> u64 {
        self.timestamp
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0)
    }
}

/// Chronological sled log of chat exchanges
#[derive(Clone)]
pub struct InteractionLog {
    db: Arc<sled::Db>,
}

impl InteractionLog {
    /// Open or create the log at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, InteractionLogError> {
        let db = sled::open(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Append a record.
    ///
    /// Does not flush; sled persists in the background, so a crash may lose
    /// the last few rows.
    pub fn record(&self, record: &InteractionRecord) -> Result<(), InteractionLogError> {
        let value = serde_json::to_vec(record)?;
        let mut nanos = record.key_nanos();

        loop {
            let key = nanos.to_be_bytes();
            match self
                .db
                .compare_and_swap(key, None as Option<&[u8]>, Some(value.as_slice()))?
            {
                Ok(()) => {
                    debug!(id = %record.id, personality = %record.personality, "Interaction logged");
                    return Ok(());
                }
                Err(_) => nanos = nanos.wrapping_add(1),
            }
        }
    }

    /// Most recent `limit` records, newest first. Undecodable rows are
    /// skipped.
    pub fn recent(&self, limit: usize) -> Vec<InteractionRecord> {
        let mut records = Vec::with_capacity(limit.min(1024));

        for item in self.db.iter().rev() {
            if records.len() >= limit {
                break;
            }
            match item {
                Ok((_key, value)) => match serde_json::from_slice::<InteractionRecord>(&value) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(error = %e, "Skipping undecodable interaction row"),
                },
                Err(e) => {
                    warn!(error = %e, "Interaction log read failed");
                    break;
                }
            }
        }

        records
    }

    /// Total number of stored records
    pub fn count(&self) -> usize {
        self.db.len()
    }

    pub fn flush(&self) -> Result<(), InteractionLogError> {
        self.db.flush()?;
        Ok(())
    }
}
