use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("cannot select the next track from an empty queue")]
    EmptyQueue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no track loaded")]
    NoTrackLoaded,

    /// A previous track switch has not finished yet.
    #[error("a track switch is already in progress")]
    SwitchInProgress,

    #[error("{src} is not in the queue")]
    NotInQueue { src: String },

    #[error("queue is empty")]
    EmptyQueue,

    #[error("failed to load {src}: {reason}")]
    Load { src: String, reason: String },

    #[error("seek failed: {reason}")]
    Seek { reason: String },
}

impl From<SelectError> for SessionError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::EmptyQueue => Self::EmptyQueue,
        }
    }
}
