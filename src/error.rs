use thiserror::Error;

/// Failures of the alignment session that the caller has to act on.
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("insufficient points: need at least {required}, have {available}")]
    InsufficientPoints { required: usize, available: usize },

    #[error("zero distance between 3D points")]
    ZeroDistance,

    #[error("invalid distance: real-world distance must be greater than zero")]
    InvalidDistance,

    #[error("computed value is not finite")]
    NonFinite,

    #[error("cannot finalize: missing transform")]
    MissingTransform,

    #[error("cannot finalize: missing target record")]
    MissingTargetRecord,

    #[error("alignment session is already finalized")]
    AlreadyFinalized,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl AlignmentError {
    /// Whether the session can carry on after this error. Store and
    /// notification failures have to reach whoever drives the session.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AlignmentError::Store(_) | AlignmentError::Notify(_))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed store document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode notification: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reading a pick script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
