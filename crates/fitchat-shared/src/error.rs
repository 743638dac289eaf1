use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid conversation id: {0:?}")]
    InvalidConversationId(String),

    #[error("Unknown platform profile: {0}")]
    UnknownPlatform(String),
}
