use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("name '{0}' is already in use")]
    NameTaken(String),

    #[error("could not acquire board lock: {0}")]
    ConcurrencyFailure(String),

    #[error("could not save {0}")]
    StorageFailure(String),

    #[error("unrecognized action '{0}'")]
    UnknownAction(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NameTaken(_) => "name_taken",
            Self::ConcurrencyFailure(_) => "concurrency_failure",
            Self::StorageFailure(_) => "storage_failure",
            Self::UnknownAction(_) => "unknown_action",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    /// Text shown to board clients. Validation failures carry their reason;
    /// internal failures are reported generically.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(_) | Self::NameTaken(_) | Self::UnknownAction(_) => self.to_string(),
            Self::ConcurrencyFailure(_) => "internal error".into(),
            Self::StorageFailure(_) => "could not save changes".into(),
            Self::Io(_) | Self::Json(_) => "internal error".into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
