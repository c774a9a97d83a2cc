//! Multipart submission of a reconciled gallery.
//!
//! A [`SubmissionForm`] is the entity's text fields plus the gallery's
//! [`Reconciliation`]. On the wire it becomes one multipart body:
//!
//! | Part | Content |
//! |---|---|
//! | each text field | plain text |
//! | `image_field` (repeated) | one binary part per new file |
//! | `keep_field` | JSON array of kept identities |
//! | `delete_field` | JSON array of identities to delete |
//!
//! [`HttpApi`] posts it with reqwest's blocking client. Token refresh and
//! retry policy live outside this crate.

use crate::gallery::Reconciliation;
use reqwest::blocking::{Client, multipart};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable read by [`EnvCredentials::default`].
pub const TOKEN_ENV: &str = "UNIT_MEDIA_TOKEN";

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded {code}: {body}")]
    Status { code: u16, body: String },
    #[error("failed to encode form field: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created,
    Updated,
}

/// Map a response status to an outcome. `None` for anything but 200/201/204.
pub fn outcome_for_status(code: u16) -> Option<SubmitOutcome> {
    match code {
        201 => Some(SubmitOutcome::Created),
        200 | 204 => Some(SubmitOutcome::Updated),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitTarget {
    Create { collection: String },
    Update { collection: String, id: String },
}

impl SubmitTarget {
    /// Path relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            SubmitTarget::Create { collection } => collection.trim_matches('/').to_string(),
            SubmitTarget::Update { collection, id } => {
                format!("{}/{id}", collection.trim_matches('/'))
            }
        }
    }
}

/// Multipart field names the API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    pub image: String,
    pub keep: String,
    pub delete: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            image: "images".into(),
            keep: "existingImages".into(),
            delete: "deletedImages".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionForm {
    pub target: SubmitTarget,
    pub fields: Vec<(String, String)>,
    pub reconciliation: Reconciliation,
}

impl SubmissionForm {
    pub fn new(
        target: SubmitTarget,
        fields: Vec<(String, String)>,
        reconciliation: Reconciliation,
    ) -> Self {
        Self {
            target,
            fields,
            reconciliation,
        }
    }

    /// All non-binary parts in send order: user fields, then the keep and
    /// delete lists as JSON arrays.
    pub fn text_parts(&self, names: &FieldNames) -> Result<Vec<(String, String)>, SubmitError> {
        let mut parts = self.fields.clone();
        parts.push((
            names.keep.clone(),
            serde_json::to_string(&self.reconciliation.keep_identities)?,
        ));
        parts.push((
            names.delete.clone(),
            serde_json::to_string(&self.reconciliation.delete_identities)?,
        ));
        Ok(parts)
    }
}

/// The remote API accepting gallery submissions.
pub trait SubmissionApi {
    fn submit(&self, form: &SubmissionForm) -> Result<SubmitOutcome, SubmitError>;
}

/// Supplies the bearer credential, consulted once per request.
pub trait CredentialSource {
    fn bearer_token(&self) -> Option<String>;
}

/// Reads the bearer token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(TOKEN_ENV)
    }
}

impl CredentialSource for EnvCredentials {
    fn bearer_token(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|t| !t.is_empty())
    }
}

/// [`SubmissionApi`] over HTTP: `POST {base}/{collection}` to create,
/// `PUT {base}/{collection}/{id}` to update.
pub struct HttpApi<C> {
    client: Client,
    base_url: String,
    names: FieldNames,
    credentials: C,
}

impl<C: CredentialSource> HttpApi<C> {
    pub fn new(
        base_url: impl Into<String>,
        names: FieldNames,
        credentials: C,
        timeout: Duration,
    ) -> Result<Self, SubmitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        Ok(Self::with_client(client, base_url, names, credentials))
    }

    /// Use a preconfigured client (proxy, TLS roots, headers).
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        names: FieldNames,
        credentials: C,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            names,
            credentials,
        }
    }

    pub fn endpoint(&self, target: &SubmitTarget) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), target.path())
    }

    fn build_body(&self, form: &SubmissionForm) -> Result<multipart::Form, SubmitError> {
        let mut body = multipart::Form::new();
        for (name, value) in form.text_parts(&self.names)? {
            body = body.text(name, value);
        }
        for file in &form.reconciliation.new_files {
            let part = multipart::Part::bytes(file.bytes.clone())
                .file_name(file.name.clone())
                .mime_str(file.mime)
                .map_err(|e| SubmitError::Network(e.to_string()))?;
            body = body.part(self.names.image.clone(), part);
        }
        Ok(body)
    }
}

impl<C: CredentialSource> SubmissionApi for HttpApi<C> {
    fn submit(&self, form: &SubmissionForm) -> Result<SubmitOutcome, SubmitError> {
        let url = self.endpoint(&form.target);
        let body = self.build_body(form)?;
        let request = match form.target {
            SubmitTarget::Create { .. } => self.client.post(&url),
            SubmitTarget::Update { .. } => self.client.put(&url),
        };
        let request = match self.credentials.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => {
                debug!("no bearer token configured");
                request
            }
        };

        debug!(
            %url,
            files = form.reconciliation.new_files.len(),
            keep = form.reconciliation.keep_identities.len(),
            delete = form.reconciliation.delete_identities.len(),
            "submitting gallery"
        );
        let response = request
            .multipart(body)
            .send()
            .map_err(|e| SubmitError::Network(e.to_string()))?;

        let code = response.status().as_u16();
        match outcome_for_status(code) {
            Some(outcome) => {
                info!(%url, code, ?outcome, "submission accepted");
                Ok(outcome)
            }
            None => {
                let body = response.text().unwrap_or_default();
                warn!(%url, code, "submission rejected");
                Err(SubmitError::Status { code, body })
            }
        }
    }
}
