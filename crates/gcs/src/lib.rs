//! Uploader storage adapter for Google Cloud Storage.
//!
//! Implements [`trigger::ObjectStore`] over the Cloud Storage JSON API. Only
//! the object's custom metadata is requested (`?fields=metadata`); object
//! bytes are never read.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL construction, credentials, status mapping and
//! timeouts live here. The [`trigger`] crate sees only
//! [`trigger::ObjectStore`] and [`trigger::StorageError`].
//!
//! ## Credentials
//!
//! In Cloud Run / Cloud Functions / GCE an OAuth access token for the default
//! service account is requested from the metadata server before each read.
//! When a storage emulator is configured, requests go to the emulator without
//! an `Authorization` header.
//!
//! Every read is a single request bounded by the configured timeout. Nothing
//! is retried and no token is cached between invocations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use trigger::errors::{parse_retry_after, truncate_body};
use trigger::{
    config, BucketName, ConfigError, CustomMetadata, ObjectDescriptor, ObjectName, ObjectStore,
    StorageConfig, StorageError,
};

/// Production JSON API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

/// Metadata-server endpoint issuing access tokens for the default service account.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How requests to the storage service are authorised.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Fetch a bearer token from the metadata server at `token_url`.
    MetadataServer { token_url: Url },
    /// Send no `Authorization` header (storage emulators).
    Anonymous,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// Object resource as returned with `fields=metadata`. The key is omitted
/// entirely when the object has no custom metadata.
#[derive(Debug, Deserialize)]
struct ObjectResource {
    metadata: Option<CustomMetadata>,
}

/// [`ObjectStore`] backed by the Cloud Storage JSON API.
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    client: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl GcsObjectStore {
    /// Builds the adapter from process configuration.
    ///
    /// Uses the emulator host when configured, otherwise the production
    /// endpoint with metadata-server credentials.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the emulator host is not a valid URL or
    /// the HTTP client cannot be built.
    pub fn from_config(cfg: &StorageConfig) -> Result<Self, ConfigError> {
        match cfg.emulator_host.as_deref() {
            Some(host) => {
                let base = if host.contains("://") {
                    host.to_string()
                } else {
                    format!("http://{host}")
                };
                tracing::warn!(emulator = %base, "using storage emulator without credentials");
                Self::new(&base, Credentials::Anonymous, cfg.timeout)
            }
            None => {
                let token_url = parse_url(METADATA_TOKEN_URL, "METADATA_TOKEN_URL")?;
                Self::new(
                    DEFAULT_BASE_URL,
                    Credentials::MetadataServer { token_url },
                    cfg.timeout,
                )
            }
        }
    }

    /// Builds the adapter against an explicit endpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `base_url` is not a valid base URL or the
    /// HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let base_url = parse_url(base_url, config::STORAGE_EMULATOR_HOST)?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| invalid(config::STORAGE_TIMEOUT_SECS, e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    /// `{base}/storage/v1/b/{bucket}/o/{object}?fields=metadata`, with the
    /// object name encoded as a single path segment (`/` becomes `%2F`).
    fn object_url(&self, bucket: &BucketName, object: &ObjectName) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StorageError::Transport {
                message: format!("storage base URL '{}' cannot carry a path", self.base_url),
                timed_out: false,
            })?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket.as_str(), "o", object.as_str()]);
        url.query_pairs_mut().append_pair("fields", "metadata");
        Ok(url)
    }

    async fn bearer_token(&self) -> Result<Option<String>, StorageError> {
        let Credentials::MetadataServer { token_url } = &self.credentials else {
            return Ok(None);
        };

        let credentials_error = |message: String| StorageError::Credentials { message };

        let response = self
            .client
            .get(token_url.clone())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| credentials_error(format!("metadata token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(credentials_error(format!(
                "metadata token request failed (status={status}): {}",
                truncate_body(body)
            )));
        }

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| credentials_error(format!("metadata token response unreadable: {e}")))?;
        Ok(Some(token.access_token))
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    #[tracing::instrument(name = "gcs.fetch_descriptor", skip_all, fields(%bucket, %object))]
    async fn fetch_descriptor(
        &self,
        bucket: &BucketName,
        object: &ObjectName,
    ) -> Result<ObjectDescriptor, StorageError> {
        let url = self.object_url(bucket, object)?;

        let mut request = self.client.get(url);
        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if status.is_success() {
            let resource: ObjectResource = response.json().await.map_err(transport_error)?;
            tracing::debug!(
                keys = resource.metadata.as_ref().map_or(0, |m| m.len()),
                "object descriptor re-read"
            );
            return Ok(ObjectDescriptor {
                custom_metadata: resource.metadata,
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                bucket: bucket.clone(),
                object: object.clone(),
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StorageError::AccessDenied {
                status: status.as_u16(),
            });
        }

        let retry_after = retry_after(&response);
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Status {
            status: status.as_u16(),
            body: truncate_body(body),
            retry_after,
        })
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

fn transport_error(err: reqwest::Error) -> StorageError {
    StorageError::Transport {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

fn parse_url(raw: &str, key: &'static str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| invalid(key, format!("'{raw}' is not a valid URL: {e}")))
}

fn invalid(key: &'static str, reason: String) -> ConfigError {
    ConfigError {
        missing: Vec::new(),
        invalid: vec![(key, reason)],
    }
}

#[cfg(test)]
mod tests;
