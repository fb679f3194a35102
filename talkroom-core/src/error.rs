//! Error types for talkroom-core

use thiserror::Error;

/// Main error type for the talkroom-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A local wall-clock point that does not exist on the calendar
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Upload without a file name
    #[error("a chat export file is required")]
    MissingFile,

    /// Upload with an unsupported extension
    #[error("only .{expected} files are accepted: {file_name}")]
    InvalidFileType { file_name: String, expected: String },

    /// Upload larger than the configured limit
    #[error("file is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// Parsing produced no messages at all
    #[error("no messages found in chat export")]
    EmptyChat,

    /// Parsing produced messages but no attributable participants
    #[error("no participants found; is this a chat export file?")]
    NoParticipants,

    /// Statistics could not be computed
    #[error("statistics error: {0}")]
    Stats(String),

    /// Room store error
    #[error("room store error: {0}")]
    Store(String),

    /// Room not found
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// Room exists but is still processing or has failed
    #[error("room is not ready: {0}")]
    NotReady(String),

    /// Delete request without a token
    #[error("a delete token is required")]
    MissingToken,

    /// Delete token does not match the room
    #[error("invalid delete token")]
    InvalidToken,

    /// Narrative collaborator error (transport or invalid output)
    #[error("narrative error: {0}")]
    Narrative(String),
}

impl Error {
    /// Stable machine-readable code for the caller-facing boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "FILE_READ_FAILED",
            Error::Json(_) => "SERIALIZE_FAILED",
            Error::Config(_) => "CONFIG_INVALID",
            Error::InvalidDate(_) => "INVALID_DATE",
            Error::MissingFile => "MISSING_FILE",
            Error::InvalidFileType { .. } => "INVALID_FILE_TYPE",
            Error::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Error::EmptyChat => "EMPTY_CHAT",
            Error::NoParticipants => "NO_PARTICIPANTS",
            Error::Stats(_) => "STATS_FAILED",
            Error::Store(_) => "STORE_FAILED",
            Error::RoomNotFound(_) => "NOT_FOUND",
            Error::NotReady(_) => "NOT_READY",
            Error::MissingToken => "MISSING_TOKEN",
            Error::InvalidToken => "INVALID_TOKEN",
            Error::Narrative(_) => "AI_FAILED",
        }
    }
}

/// Result type alias for talkroom-core
pub type Result<T> = std::result::Result<T, Error>;
