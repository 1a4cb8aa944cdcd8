use thiserror::Error;

/// Reasons a user intent was ignored. These never reach the user as errors;
/// they are logged and shown in the status line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("music folder is empty or unreadable: {0}")]
    InvalidPath(String),
    #[error("no track at row {0}")]
    OutOfRangeSelection(usize),
    #[error("no track selected")]
    NoSelection,
    #[error("playlist is empty")]
    EmptyPlaylist,
}
