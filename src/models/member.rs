use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type MemberId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Leader => "leader",
            Role::Member => "member",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leader" => Ok(Role::Leader),
            "member" => Ok(Role::Member),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Derived classification of a member over the active window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Stalled,
    Ghost,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Stalled => "stalled",
            MemberStatus::Ghost => "ghost",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MemberStatus::Active),
            "stalled" => Ok(MemberStatus::Stalled),
            "ghost" => Ok(MemberStatus::Ghost),
            other => Err(format!("Unknown member status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounters {
    pub commits: u32,
    pub prs: u32,
    pub reviews: u32,
}

impl ActivityCounters {
    pub fn total(&self) -> u32 {
        self.commits + self.prs + self.reviews
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub project_id: String,
    pub user_id: String,
    pub github_username: Option<String>,
    pub role: Role,
    pub dependency_id: Option<MemberId>,
    pub status: MemberStatus,
    pub contribution_score: f64,
    pub created_at: i64,
    pub updated_at: i64,
}
