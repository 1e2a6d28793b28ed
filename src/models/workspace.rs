use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub path: String,
    pub name: String,
    pub branch: Option<String>,
    pub project_count: usize,
    pub last_evaluation_at: Option<i64>,
}
