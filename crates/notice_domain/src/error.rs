use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed for key `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("notification permission denied")]
    PermissionDenied,

    #[error("device notification service unavailable: {0}")]
    Unavailable(String),

    #[error("device rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum NoticeError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("failed to encode notification log: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("notification `{0}` is already in the log")]
    DuplicateRecord(String),

    #[error("invalid event date `{value}`: {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

pub type Result<T, E = NoticeError> = std::result::Result<T, E>;
