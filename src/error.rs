//! Error types for the admission gate and document submission
use std::convert::Infallible;
use std::fmt;

/// Reasons a gate refuses to start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Capacity must be a positive number of permits.
    #[error("capacity must be > 0 (got {provided})")]
    InvalidCapacity {
        /// Value provided by caller.
        provided: i64,
    },
    /// Capacity exceeds what the permit pool can represent.
    #[error("capacity must be <= {max} (got {provided})")]
    CapacityTooLarge {
        /// Value provided by caller.
        provided: usize,
        /// Largest accepted capacity.
        max: usize,
    },
    /// The rate window spans zero time units.
    #[error("rate window must span at least one time unit")]
    EmptyWindow,
    /// Construction happened outside a tokio runtime.
    #[error("no tokio runtime available to host the replenish task")]
    NoRuntime,
}

/// Unified error type for gate admission and guarded submissions.
///
/// `E` is the collaborator's error. Gate-only operations use the default
/// `Infallible` and can be lifted with [`GateError::widen`].
#[derive(Debug, Clone)]
pub enum GateError<E = Infallible> {
    /// The gate could not be constructed.
    InvalidConfiguration(ConfigError),
    /// The gate has been shut down.
    Closed,
    /// The caller stopped waiting before a permit was granted.
    Interrupted,
    /// A permit was granted but the guarded call failed.
    SubmissionFailed(E),
}

impl<E: fmt::Display> fmt::Display for GateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration(e) => write!(f, "invalid gate configuration: {}", e),
            Self::Closed => write!(f, "admission gate is shut down"),
            Self::Interrupted => write!(f, "interrupted while waiting for a permit"),
            Self::SubmissionFailed(e) => write!(f, "submission failed: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GateError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfiguration(e) => Some(e),
            Self::SubmissionFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<ConfigError> for GateError<E> {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfiguration(err)
    }
}

impl GateError<Infallible> {
    /// Lift a gate-only error into one that can also carry a submission failure.
    pub fn widen<E>(self) -> GateError<E> {
        match self {
            GateError::InvalidConfiguration(e) => GateError::InvalidConfiguration(e),
            GateError::Closed => GateError::Closed,
            GateError::Interrupted => GateError::Interrupted,
            GateError::SubmissionFailed(never) => match never {},
        }
    }
}

impl<E> GateError<E> {
    /// Check if the gate rejected construction
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
    /// Check if this error is due to shutdown
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
    /// Check if the wait was cancelled
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
    /// Check if the guarded call failed after admission
    pub fn is_submission_failed(&self) -> bool {
        matches!(self, Self::SubmissionFailed(_))
    }
    /// Borrow the configuration error if present.
    pub fn config_error(&self) -> Option<&ConfigError> {
        match self {
            Self::InvalidConfiguration(e) => Some(e),
            _ => None,
        }
    }
    /// Get the collaborator error if this is a `SubmissionFailed` variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::SubmissionFailed(e) => Some(e),
            _ => None,
        }
    }
    /// Borrow the collaborator error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::SubmissionFailed(e) => Some(e),
            _ => None,
        }
    }
}
