// Domain errors - Error types for the domain layer

use std::fmt;

/// Errors raised behind a port (media tools, storage, configuration)
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid arguments provided
    BadArgs(String),
    /// File not found
    FileNotFound(String),
    /// Source media is unreadable or lacks a required track
    InvalidMedia(String),
    /// External tool or decoder failed
    ProcessingError(String),
    /// Snapshot write/read/delete failed
    PersistenceError(String),
    /// Encoding or decoding of a stored record failed
    SerializationError(String),
    /// Operation abandoned because its owner was torn down
    Cancelled,
    /// Internal error
    InternalError(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            DomainError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            DomainError::InvalidMedia(msg) => write!(f, "Invalid media: {}", msg),
            DomainError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            DomainError::PersistenceError(msg) => write!(f, "Unable to save or load draft: {}", msg),
            DomainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            DomainError::Cancelled => write!(f, "Operation cancelled"),
            DomainError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::SerializationError(e.to_string())
    }
}

/// User-facing validation failures of the timeline editor.
///
/// None of these change the draft; the message is meant to be shown as a
/// transient advisory.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Both In and Out must be set before adding a segment")]
    MissingInOut,

    #[error("In ({in_s:.2}s) must be before Out ({out_s:.2}s)")]
    InvalidRange { in_s: f64, out_s: f64 },

    #[error("Segment must be at least {min_s:.1}s long (got {len_s:.2}s)")]
    RangeTooShort { len_s: f64, min_s: f64 },

    #[error("No segment selected")]
    NoSelection,

    #[error("Segment {0} does not exist")]
    UnknownSegment(String),

    #[error("Playhead at {at_s:.2}s is not inside the segment (needs {min_s:.1}s from each edge)")]
    SplitOutOfBounds { at_s: f64, min_s: f64 },

    #[error("Selected segment has no following segment to merge with")]
    NoSuccessor,

    #[error("Marker at {at_s:.2}s is outside the selected segment")]
    MarkerOutsideSegment { at_s: f64 },

    #[error("Marker {0} does not exist")]
    UnknownMarker(String),

    #[error("Position {index} is outside the timeline (0..{len})")]
    InvalidPosition { index: usize, len: usize },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Result type for editor operations
pub type EditResult<T> = Result<T, EditError>;
