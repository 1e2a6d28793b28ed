use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockerSignal {
    pub id: String,
    pub project_id: String,
    pub member_id: String,
    pub description: Option<String>,
    pub status: String, // "active" | "resolved"
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}
