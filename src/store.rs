//! Decision persistence
//!
//! The run controller depends on this capability, not on a concrete
//! database: `put_decision` is fire-and-forget (a failed write is logged
//! and the run continues) and `get_processed_count` drives resumption.
//! At-least-once semantics: resumption after a crash may reprocess the
//! record whose write was lost.

use crate::decision::MatchDecision;
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn put_decision(&self, session_id: &str, decision: &MatchDecision) -> Result<()>;
    async fn get_processed_count(&self, session_id: &str) -> Result<u64>;
}

/// Local SQLite store, one row per decision.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS analysis_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    product_name TEXT NOT NULL,
    comp_name TEXT,
    category TEXT NOT NULL,
    risk TEXT NOT NULL,
    confidence INTEGER NOT NULL,
    my_price REAL NOT NULL,
    comp_price REAL,
    recommended_price REAL,
    adjudication_reason TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_analysis_results_session
    ON analysis_results(session_id);
";

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            AnalysisError::Persistence(format!("Failed to open store {}: {}", path.display(), e))
        })?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AnalysisError::Persistence(format!("Failed to open store: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AnalysisError::Persistence(format!("Failed to create schema: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AnalysisError::Persistence("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl DecisionStore for SqliteStore {
    async fn put_decision(&self, session_id: &str, decision: &MatchDecision) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO analysis_results (
                session_id, product_name, comp_name, category, risk,
                confidence, my_price, comp_price, recommended_price,
                adjudication_reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                session_id,
                decision.merchant_record.display_name,
                decision
                    .matched_competitor
                    .as_ref()
                    .map(|c| c.display_name.as_str()),
                decision.category.as_str(),
                decision.risk.as_str(),
                decision.confidence as i64,
                decision.merchant_record.price,
                decision.matched_competitor.as_ref().map(|c| c.price),
                decision.recommended_price,
                decision.adjudication_reason.as_deref(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| AnalysisError::Persistence(format!("Failed to insert decision: {}", e)))?;
        Ok(())
    }

    async fn get_processed_count(&self, session_id: &str) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM analysis_results WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(|e| AnalysisError::Persistence(format!("Failed to count decisions: {}", e)))?;
        Ok(count as u64)
    }
}

/// In-memory store for tests and dry runs. Can be told to fail writes to
/// exercise the controller's keep-going policy.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<(String, MatchDecision)>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn decisions_for(&self, session_id: &str) -> Vec<MatchDecision> {
        self.rows
            .lock()
            .expect("memory store mutex poisoned")
            .iter()
            .filter(|(sid, _)| sid == session_id)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

#[async_trait]
impl DecisionStore for MemoryStore {
    async fn put_decision(&self, session_id: &str, decision: &MatchDecision) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AnalysisError::Persistence(
                "simulated write failure".to_string(),
            ));
        }
        self.rows
            .lock()
            .map_err(|_| AnalysisError::Persistence("store mutex poisoned".to_string()))?
            .push((session_id.to_string(), decision.clone()));
        Ok(())
    }

    async fn get_processed_count(&self, session_id: &str) -> Result<u64> {
        Ok(self
            .rows
            .lock()
            .map_err(|_| AnalysisError::Persistence("store mutex poisoned".to_string()))?
            .iter()
            .filter(|(sid, _)| sid == session_id)
            .count() as u64)
    }
}
