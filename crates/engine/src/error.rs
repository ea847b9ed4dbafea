#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
