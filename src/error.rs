pub type PantinResult<T> = Result<T, PantinError>;

#[derive(thiserror::Error, Debug)]
pub enum PantinError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("rig error: {0}")]
    Rig(String),

    #[error("document error: {0}")]
    Document(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PantinError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn rig(msg: impl Into<String>) -> Self {
        Self::Rig(msg.into())
    }

    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
