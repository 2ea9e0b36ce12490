//! Document submission: the collaborator the gate admits calls into.
//!
//! [`DocumentSubmitter`] is the narrow contract the rest of the crate depends
//! on; [`HttpSubmitter`] is the production implementation.

pub mod document;
pub mod http;

pub use document::{Description, Document, Product};
pub use http::{HttpSubmitter, SubmissionBody};

use async_trait::async_trait;
use std::sync::Arc;

/// Why a submission attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The endpoint answered with a non-2xx status.
    #[error("endpoint rejected document with status {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if it could be read
        body: String,
    },
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The document could not be serialized.
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    /// The configured endpoint is not a valid URL.
    #[error("invalid endpoint url {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// Endpoint as configured
        endpoint: String,
        /// Parser message
        reason: String,
    },
}

impl SubmitError {
    /// HTTP status for `Status` failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Performs one document submission.
///
/// Implementations make exactly one attempt per call; retrying is the
/// caller's business.
#[async_trait]
pub trait DocumentSubmitter: Send + Sync {
    async fn submit(&self, document: &Document, signature: &str) -> Result<(), SubmitError>;
}

#[async_trait]
impl<T> DocumentSubmitter for Arc<T>
where
    T: DocumentSubmitter + ?Sized,
{
    async fn submit(&self, document: &Document, signature: &str) -> Result<(), SubmitError> {
        (**self).submit(document, signature).await
    }
}
