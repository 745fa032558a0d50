use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The socket failed while waiting for the next message.
    #[error("Imagine websocket receive failed: {0}")]
    ChannelReceiveFailed(String),

    /// The upstream reported an explicit error event for this request.
    #[error("Imagine websocket error ({code}): {message}")]
    RemoteGeneration { code: String, message: String },

    #[error("Imagine websocket returned no completed images")]
    NoCompletedImages,

    #[error("Image edit requires at least one uploaded image")]
    MissingReferenceImages,

    #[error("Image edit request failed for {model}: {status}")]
    UpstreamEditRequestFailed {
        model: String,
        status: u16,
        body: String,
    },

    #[error("Image edit request failed")]
    EditRequestFailed,

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Asset error: {0}")]
    AssetError(String),
}

impl From<serde_json::Error> for ImagineError {
    fn from(err: serde_json::Error) -> Self {
        ImagineError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for ImagineError {
    fn from(err: reqwest::Error) -> Self {
        ImagineError::RequestError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImagineError>;
