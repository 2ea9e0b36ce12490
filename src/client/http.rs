//! HTTP implementation of [`DocumentSubmitter`].

use super::{Document, DocumentSubmitter, SubmitError};
use crate::settings::ClientConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

const DOCUMENT_FORMAT: &str = "MANUAL";
const DOCUMENT_TYPE: &str = "LP_INTRODUCE_GOODS";

/// JSON body posted to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionBody {
    pub document_format: String,
    /// Base64 of the document's JSON
    pub product_document: String,
    pub product_group: String,
    /// Base64 of the detached signature
    pub signature: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Posts documents to the configured endpoint with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    client: Client,
    config: ClientConfig,
}

impl HttpSubmitter {
    /// Build a submitter with its own connection pool.
    pub fn new(config: ClientConfig) -> Result<Self, SubmitError> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { client, config })
    }

    /// Reuse an existing `reqwest::Client`.
    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `{endpoint}?pg={product_group}`
    pub fn request_url(&self) -> Result<Url, SubmitError> {
        Url::parse_with_params(&self.config.endpoint, &[("pg", &self.config.product_group)])
            .map_err(|e| SubmitError::InvalidEndpoint {
                endpoint: self.config.endpoint.clone(),
                reason: e.to_string(),
            })
    }

    pub fn request_body(
        &self,
        document: &Document,
        signature: &str,
    ) -> Result<SubmissionBody, SubmitError> {
        let json = serde_json::to_vec(document)?;
        Ok(SubmissionBody {
            document_format: DOCUMENT_FORMAT.to_string(),
            product_document: STANDARD.encode(json),
            product_group: self.config.product_group.clone(),
            signature: STANDARD.encode(signature.as_bytes()),
            kind: DOCUMENT_TYPE.to_string(),
        })
    }
}

#[async_trait]
impl DocumentSubmitter for HttpSubmitter {
    async fn submit(&self, document: &Document, signature: &str) -> Result<(), SubmitError> {
        let url = self.request_url()?;
        let body = self.request_body(document, signature)?;

        let response =
            self.client.post(url).bearer_auth(&self.config.token).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "document submission rejected");
            return Err(SubmitError::Status { status: status.as_u16(), body });
        }
        tracing::debug!(status = status.as_u16(), doc_id = ?document.doc_id, "document submitted");
        Ok(())
    }
}
