//! Public validation lookups behind the access-code gate.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rate_limit::FixedWindowLimiter;
use crate::config::SealConfig;
use crate::error::{Error, Result};
use crate::model::{DocumentStatus, PublicDocument, SigningEvent};
use crate::store::{DocumentRepository, SigningEventRepository};

/// How the access code arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSubmission {
    /// Page load; a missing or wrong code asks for one
    Query,
    /// Explicit code entry; a wrong code is refused
    Form,
}

/// Public validation lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationOutcome {
    /// A code is needed before anything is shown
    RequiresCode {
        /// Always `true`
        #[serde(rename = "requiresCode")]
        requires_code: bool,
    },
    /// Sanitized document and its signing events, oldest first
    Resolved {
        /// Document without access code or storage paths
        document: PublicDocument,
        /// Signing events
        events: Vec<SigningEvent>,
    },
}

/// Public read path for validation pages.
///
/// Every call counts against a per-IP window. Wrong access codes count
/// against a separate, stricter window per IP and document.
pub struct ValidationGateway {
    documents: Arc<dyn DocumentRepository>,
    events: Arc<dyn SigningEventRepository>,
    requests: FixedWindowLimiter,
    failed_codes: FixedWindowLimiter,
}

impl ValidationGateway {
    /// Create a gateway with limits taken from `config`.
    pub fn new(
        config: &SealConfig,
        documents: Arc<dyn DocumentRepository>,
        events: Arc<dyn SigningEventRepository>,
    ) -> Self {
        Self::with_limits(
            documents,
            events,
            FixedWindowLimiter::new(config.rate_limit_per_minute, Duration::from_secs(60)),
            FixedWindowLimiter::new(config.code_attempts, config.code_window),
        )
    }

    /// Create a gateway with explicit limiters.
    pub fn with_limits(
        documents: Arc<dyn DocumentRepository>,
        events: Arc<dyn SigningEventRepository>,
        requests: FixedWindowLimiter,
        failed_codes: FixedWindowLimiter,
    ) -> Self {
        Self {
            documents,
            events,
            requests,
            failed_codes,
        }
    }

    /// Per-IP limiter shared with other public endpoints.
    pub fn request_limiter(&self) -> &FixedWindowLimiter {
        &self.requests
    }

    /// Resolve a validation lookup.
    ///
    /// Unknown ids and unsigned drafts are both `NotFound`.
    pub async fn resolve(
        &self,
        document_id: Uuid,
        access_code: Option<&str>,
        submission: CodeSubmission,
        client_ip: &str,
    ) -> Result<ValidationOutcome> {
        self.requests.check(client_ip)?;

        let document = self
            .documents
            .get(document_id)
            .await?
            .filter(|d| matches!(d.status, DocumentStatus::Signed | DocumentStatus::Canceled))
            .ok_or(Error::NotFound("Document"))?;

        let gate = &document.metadata.access;
        if gate.requires_access_code {
            let attempt_key = format!("{}:{}", client_ip, document_id);
            self.failed_codes.ensure_available(&attempt_key)?;

            let supplied = access_code.map(str::trim).filter(|c| !c.is_empty());
            if !gate.accepts(supplied) {
                let Some(_) = supplied else {
                    return Ok(ValidationOutcome::RequiresCode { requires_code: true });
                };
                self.failed_codes.record(&attempt_key);
                debug!("wrong access code for document {} from {}", document_id, client_ip);
                return match submission {
                    CodeSubmission::Query => {
                        Ok(ValidationOutcome::RequiresCode { requires_code: true })
                    },
                    CodeSubmission::Form => {
                        Err(Error::Forbidden("invalid access code".to_string()))
                    },
                };
            }
        }

        let events = self.events.list_for_document(document_id).await?;
        info!("validation lookup for document {} ({} events)", document_id, events.len());
        Ok(ValidationOutcome::Resolved {
            document: document.to_public(),
            events,
        })
    }
}
