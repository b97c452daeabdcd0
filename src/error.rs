use thiserror::Error;

/// Result type for push pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse classification of a [`PipelineError`], used by `Map` to decide
/// which failures skip an item instead of aborting the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A composite item had the wrong shape
    Structural,
    /// A secondary source ran dry
    Exhausted,
    /// A value had the wrong type for the operation
    Type,
    /// A positional lookup was out of range
    Index,
    /// A keyed lookup missed
    Key,
    /// A value was of the right type but unacceptable
    Value,
    /// Invalid combinator parameters
    Config,
}

/// Errors that can occur while building or driving a pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// An item had fewer components than the node has children
    #[error("Structural mismatch: expected at least {expected} components, found {found}")]
    StructuralMismatch { expected: usize, found: usize },

    /// A pulled iterator ended while the pipeline still expected input
    #[error("Iterator exhausted before pipeline complete")]
    ExhaustedSource,

    /// A value was not of the type the operation needs
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Positional lookup failure
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Keyed lookup failure
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Error raised by a user-supplied callable
    #[error("{message}")]
    Callable { kind: ErrorKind, message: String },

    /// A shared node was pushed into while already handling an item
    #[error("Re-entrant push into shared node")]
    Reentrant,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Build an error from inside a user callable
    pub fn callable(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Callable {
            kind,
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StructuralMismatch { .. } | Self::Reentrant => ErrorKind::Structural,
            Self::ExhaustedSource => ErrorKind::Exhausted,
            Self::TypeMismatch { .. } => ErrorKind::Type,
            Self::IndexOutOfRange { .. } => ErrorKind::Index,
            Self::KeyNotFound(_) => ErrorKind::Key,
            Self::Callable { kind, .. } => *kind,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}
