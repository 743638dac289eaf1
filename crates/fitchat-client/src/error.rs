use thiserror::Error;

/// Failures talking to the remote chat API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Chat API responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from chat API: {0}")]
    Decode(String),
}

impl ApiError {
    /// 401/403: the session is no longer accepted.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("No authenticated session")]
    NotAuthenticated,

    #[error("No conversation selected")]
    NoConversation,

    #[error("Store error: {0}")]
    Store(#[from] fitchat_store::StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
