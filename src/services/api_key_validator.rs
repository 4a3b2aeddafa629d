//! Checking the deployment API key against the external licensing service.
//!
//! Verdicts are cached per key fingerprint so that the validator is asked at
//! most once per TTL. A key that validated successfully keeps being trusted
//! for the grace period while the validator cannot be reached.

use crate::errors::ServiceError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::debug;

#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    /// `Ok(valid)` is the validator's verdict; `Err` means no verdict could
    /// be obtained.
    async fn validate(&self, api_key: &str) -> Result<bool, ServiceError>;
}

#[derive(Serialize)]
struct ValidationRequest<'a> {
    api_key: &'a str,
}

#[derive(Deserialize)]
struct ValidationResponse {
    valid: bool,
}

/// Posts `{"api_key": ...}` to the configured URL and expects `{"valid": bool}`.
pub struct HttpApiKeyValidator {
    client: reqwest::Client,
    url: Option<String>,
}

impl HttpApiKeyValidator {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
        })
    }
}

#[async_trait]
impl ApiKeyValidator for HttpApiKeyValidator {
    async fn validate(&self, api_key: &str) -> Result<bool, ServiceError> {
        let url = self.url.as_deref().ok_or_else(|| {
            ServiceError::UpstreamUnavailable("no API key validator URL configured".into())
        })?;

        let response = self
            .client
            .post(url)
            .json(&ValidationRequest { api_key })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::UpstreamUnavailable("API key validator timed out".into())
                } else {
                    ServiceError::UpstreamUnavailable(format!("API key validator: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ServiceError::UpstreamUnavailable(format!(
                "API key validator answered {}",
                status
            )));
        }
        if status.is_client_error() {
            debug!(%status, "validator refused the key");
            return Ok(false);
        }

        let body: ValidationResponse = response.json().await.map_err(|e| {
            ServiceError::UpstreamUnavailable(format!("unreadable validator response: {}", e))
        })?;
        Ok(body.valid)
    }
}

/// Cache key for an API key; raw keys are never held in memory maps.
pub fn fingerprint(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

#[derive(Debug, Clone, Copy)]
struct Verdict {
    valid: bool,
    checked_at: Instant,
    last_success: Option<Instant>,
}

pub struct ValidationCache {
    entries: DashMap<String, Verdict>,
    ttl: Duration,
    grace: Duration,
}

impl ValidationCache {
    pub fn new(ttl: Duration, grace: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            grace,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Verdict younger than the TTL, if any.
    pub fn fresh(&self, fingerprint: &str) -> Option<bool> {
        self.entries
            .get(fingerprint)
            .filter(|v| v.checked_at.elapsed() < self.ttl)
            .map(|v| v.valid)
    }

    pub fn record(&self, fingerprint: &str, valid: bool) {
        let now = Instant::now();
        self.entries.insert(
            fingerprint.to_string(),
            Verdict {
                valid,
                checked_at: now,
                last_success: valid.then_some(now),
            },
        );
    }

    /// The key validated successfully within the grace period.
    pub fn within_grace(&self, fingerprint: &str) -> bool {
        self.entries
            .get(fingerprint)
            .and_then(|v| v.last_success)
            .map(|at| at.elapsed() < self.grace)
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
