use super::member::MemberId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Commit,
    Pr,
    PrReview,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Commit => "commit",
            ActivityKind::Pr => "pr",
            ActivityKind::PrReview => "pr_review",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(ActivityKind::Commit),
            "pr" => Ok(ActivityKind::Pr),
            // "review" is accepted as shorthand for the stored "pr_review"
            "pr_review" | "review" => Ok(ActivityKind::PrReview),
            other => Err(format!("Unknown activity type: {other}")),
        }
    }
}

/// One immutable unit of contribution. `timestamp` is unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub member_id: MemberId,
    pub kind: ActivityKind,
    pub timestamp: i64,
    /// Dedupe key from the source system (commit sha, PR number)
    pub external_id: Option<String>,
    /// Source payload as JSON text, e.g. commit summary and author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl ActivityEvent {
    pub fn new(member_id: impl Into<MemberId>, kind: ActivityKind, timestamp: i64) -> Self {
        Self {
            member_id: member_id.into(),
            kind,
            timestamp,
            external_id: None,
            metadata: None,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}
