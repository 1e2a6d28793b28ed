use thiserror::Error;

pub type Result<T> = std::result::Result<T, GhostError>;

#[derive(Error, Debug)]
pub enum GhostError {
    /// Adding the edge would let a member reach itself through its dependency chain
    #[error("CYCLE: {member} cannot depend on {depends_on} without creating a cycle")]
    Cycle { member: String, depends_on: String },

    #[error("UNKNOWN_MEMBER: {0} is not a member of this project")]
    UnknownMember(String),

    #[error("INVALID_WINDOW: {0}")]
    InvalidWindow(String),

    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}
