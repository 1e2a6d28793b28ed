use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub id: i64,
    pub project_id: String,
    pub timestamp: i64,
    pub active_count: usize,
    pub stalled_count: usize,
    pub ghost_count: usize,
    pub average_score: f64,
    pub snapshot_metadata: Option<String>, // JSON string
}
