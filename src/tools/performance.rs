//! In-process query performance tracking.
//!
//! Every query, statement and in-transaction statement is recorded with its
//! duration, keyed by database ID. The tracker backs the per-database
//! performance tool: slow-query listing, aggregate metrics, heuristic query
//! analysis, reset and threshold adjustment. Metrics are best-effort and do
//! not survive a restart.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Default slow-query threshold in milliseconds.
const DEFAULT_SLOW_THRESHOLD_MS: u64 = 500;

/// Recorded statements kept per database.
const MAX_SAMPLES_PER_DB: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct QuerySample {
    pub sql: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbMetrics {
    pub database: String,
    pub total_queries: u64,
    pub slow_queries: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
    pub threshold_ms: u64,
}

#[derive(Default)]
struct DbStats {
    samples: Vec<QuerySample>,
    total_queries: u64,
    total_duration_ms: u64,
    max_duration_ms: u64,
}

struct State {
    threshold_ms: u64,
    per_db: HashMap<String, DbStats>,
}

/// Shared tracker; cheap to record into from any task.
pub struct PerformanceAnalyzer {
    state: Mutex<State>,
}

impl PerformanceAnalyzer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
                per_db: HashMap::new(),
            }),
        }
    }

    /// Record one executed statement.
    pub fn record(&self, db_id: &str, sql: &str, duration: Duration) {
        let duration_ms = duration.as_millis() as u64;
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let stats = state.per_db.entry(db_id.to_string()).or_default();
        stats.total_queries += 1;
        stats.total_duration_ms += duration_ms;
        stats.max_duration_ms = stats.max_duration_ms.max(duration_ms);
        if stats.samples.len() >= MAX_SAMPLES_PER_DB {
            stats.samples.remove(0);
        }
        stats.samples.push(QuerySample {
            sql: sql.to_string(),
            duration_ms,
        });
    }

    /// Recorded statements at or above the slow threshold, slowest first.
    pub fn slow_queries(&self, db_id: &str, limit: usize) -> Vec<QuerySample> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let threshold = state.threshold_ms;
        let mut slow: Vec<QuerySample> = state
            .per_db
            .get(db_id)
            .map(|stats| {
                stats
                    .samples
                    .iter()
                    .filter(|s| s.duration_ms >= threshold)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        slow.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
        slow.truncate(limit);
        slow
    }

    /// Aggregate metrics for one database.
    pub fn metrics(&self, db_id: &str) -> DbMetrics {
        let Ok(state) = self.state.lock() else {
            return DbMetrics {
                database: db_id.to_string(),
                total_queries: 0,
                slow_queries: 0,
                avg_duration_ms: 0.0,
                max_duration_ms: 0,
                threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            };
        };
        let threshold = state.threshold_ms;
        let stats = state.per_db.get(db_id);
        let (total, total_ms, max_ms, slow) = stats
            .map(|s| {
                let slow = s
                    .samples
                    .iter()
                    .filter(|q| q.duration_ms >= threshold)
                    .count() as u64;
                (s.total_queries, s.total_duration_ms, s.max_duration_ms, slow)
            })
            .unwrap_or((0, 0, 0, 0));

        DbMetrics {
            database: db_id.to_string(),
            total_queries: total,
            slow_queries: slow,
            avg_duration_ms: if total > 0 {
                total_ms as f64 / total as f64
            } else {
                0.0
            },
            max_duration_ms: max_ms,
            threshold_ms: threshold,
        }
    }

    /// Static analysis: flag common performance hazards in a statement.
    pub fn analyze(&self, sql: &str) -> Vec<String> {
        let upper = sql.to_uppercase();
        let mut advice = Vec::new();

        if upper.contains("SELECT *") {
            advice.push(
                "SELECT * fetches every column; list only the columns you need".to_string(),
            );
        }
        if (upper.starts_with("UPDATE") || upper.starts_with("DELETE"))
            && !upper.contains("WHERE")
        {
            advice.push("UPDATE/DELETE without WHERE touches every row".to_string());
        }
        if upper.contains("LIKE '%") || upper.contains("LIKE \"%") {
            advice.push("leading-wildcard LIKE cannot use an index".to_string());
        }
        if upper.starts_with("SELECT") && !upper.contains("LIMIT") && !upper.contains("FETCH FIRST")
        {
            advice.push("unbounded SELECT; consider LIMIT for large tables".to_string());
        }
        if upper.contains("OR ") {
            advice.push("OR conditions often defeat index usage; consider UNION".to_string());
        }

        if advice.is_empty() {
            advice.push("no obvious performance hazards found".to_string());
        }
        advice
    }

    /// Clear recorded samples for one database.
    pub fn reset(&self, db_id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.per_db.remove(db_id);
        }
    }

    /// Change the slow-query threshold; returns the effective value.
    pub fn set_threshold(&self, threshold_ms: u64) -> u64 {
        if let Ok(mut state) = self.state.lock() {
            state.threshold_ms = threshold_ms;
            state.threshold_ms
        } else {
            DEFAULT_SLOW_THRESHOLD_MS
        }
    }
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
