//! Error and retry-policy types for the uploader trigger.
//!
//! [`UploaderError`] is the top-level error for one invocation. Component-level
//! errors ([`StorageError`], [`DispatchError`], [`ConfigError`],
//! [`MissingMetadataKeys`]) are defined here too so both the ports and their
//! adapters can name them without depending on each other.
//!
//! Nothing in this workspace retries. [`RetryPolicy`] is a hint for the
//! hosting infrastructure, which owns redelivery.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BucketName, ObjectName};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether redelivering the same event could succeed.
///
/// Returned by [`UploaderError::retry_policy`] so the receiver can tell the
/// caller whether a redelivery is worthwhile.
///
/// - `Retryable`: transport failures, timeouts, `429` and `5xx` responses.
/// - `NonRetryable`: malformed events, missing configuration, incomplete
///   metadata, and `4xx` responses other than `429`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// A redelivery may succeed.
    Retryable {
        /// Minimum back-off before the next attempt, when the remote said so.
        after: Option<Duration>,
    },
    /// Redelivering the same event will fail the same way.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// Classifies an HTTP status returned by a remote collaborator, carrying
    /// over its `Retry-After` delay when the status is retryable.
    pub fn for_response(status: u16, retry_after: Option<Duration>) -> Self {
        if status == 429 || (500..=599).contains(&status) {
            Self::Retryable { after: retry_after }
        } else {
            Self::NonRetryable
        }
    }

    /// The back-off requested by the remote, if any.
    pub fn after(&self) -> Option<Duration> {
        match self {
            Self::Retryable { after } => *after,
            Self::NonRetryable => None,
        }
    }
}

/// Parses a `Retry-After` header value in its delay-seconds form.
///
/// The HTTP-date form yields `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// One or more configuration values are missing or invalid.
///
/// Always reports every problem at once so an operator can fix the
/// deployment in a single pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ConfigError {
    /// Required variables that were absent or empty, in lookup order.
    pub missing: Vec<&'static str>,
    /// Variables that were present but could not be parsed: `(name, reason)`.
    pub invalid: Vec<(&'static str, String)>,
}

impl ConfigError {
    /// Returns `true` when nothing is missing or invalid.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        for (name, reason) in &self.invalid {
            parts.push(format!("invalid {name}: {reason}"));
        }
        write!(f, "Configuration error: {}", parts.join("; "))
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Custom metadata was present but lacked one or more required keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Custom metadata is missing required keys: {}", .keys.join(", "))]
pub struct MissingMetadataKeys {
    /// The absent keys, in canonical order.
    pub keys: Vec<&'static str>,
}

// ---------------------------------------------------------------------------
// Storage port
// ---------------------------------------------------------------------------

/// Failure re-fetching an object descriptor from the storage service.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object no longer exists (deleted or overwritten since the event).
    #[error("Object gs://{bucket}/{object} not found")]
    NotFound {
        /// Bucket that was queried.
        bucket: BucketName,
        /// Object that was queried.
        object: ObjectName,
    },

    /// The service account may not read the object.
    #[error("Access denied reading object metadata (status {status})")]
    AccessDenied {
        /// HTTP status returned (`401` or `403`).
        status: u16,
    },

    /// Any other non-success status.
    #[error("Storage service returned status {status}: {body}")]
    Status {
        /// HTTP status returned.
        status: u16,
        /// Response body, truncated.
        body: String,
        /// Delay from the `Retry-After` response header.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout), or
    /// the response could not be decoded.
    #[error("Storage request failed: {message}")]
    Transport {
        /// Description of the underlying failure.
        message: String,
        /// Whether the failure was a request timeout.
        timed_out: bool,
    },

    /// No access token could be obtained for the storage service.
    #[error("Could not obtain storage access token: {message}")]
    Credentials {
        /// Description of the underlying failure.
        message: String,
    },
}

impl StorageError {
    /// Whether redelivering the event could get past this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::NotFound { .. } | Self::AccessDenied { .. } => RetryPolicy::NonRetryable,
            Self::Status {
                status,
                retry_after,
                ..
            } => RetryPolicy::for_response(*status, *retry_after),
            Self::Transport { .. } | Self::Credentials { .. } => {
                RetryPolicy::Retryable { after: None }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch port
// ---------------------------------------------------------------------------

/// Failure starting an orchestration run.
///
/// When this is returned the run may or may not exist: a timeout can fire
/// after the orchestration service has already accepted the request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The orchestration service answered with a non-success status.
    #[error("Orchestration service returned status {status}: {body}")]
    Status {
        /// HTTP status returned.
        status: u16,
        /// Response body, truncated.
        body: String,
        /// Delay from the `Retry-After` response header.
        retry_after: Option<Duration>,
    },

    /// The request was not sent or never produced a response.
    #[error("Dispatch request failed: {message}")]
    Transport {
        /// Description of the underlying failure.
        message: String,
        /// Whether the failure was a request timeout.
        timed_out: bool,
    },
}

impl DispatchError {
    /// Whether redelivering the event could get past this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Status {
                status,
                retry_after,
                ..
            } => RetryPolicy::for_response(*status, *retry_after),
            Self::Transport { .. } => RetryPolicy::Retryable { after: None },
        }
    }
}

/// Longest response body kept in a status error.
pub const MAX_ERROR_BODY: usize = 512;

/// Shortens a response body for inclusion in an error message.
pub fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

// ---------------------------------------------------------------------------
// Invocation-level errors
// ---------------------------------------------------------------------------

/// Every fatal outcome of one invocation.
///
/// Non-error early exits (ineligible suffix, empty metadata) are not errors;
/// see [`crate::Disposition`].
#[derive(Debug, Error)]
pub enum UploaderError {
    /// The trigger event lacked a required attribute or field, or its body
    /// could not be decoded.
    #[error("Malformed trigger event: {reason}")]
    MalformedEvent {
        /// What was wrong with the event.
        reason: String,
    },

    /// Required configuration is missing or invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The authoritative descriptor re-fetch failed. Nothing was dispatched.
    #[error(transparent)]
    StorageAccess(#[from] StorageError),

    /// Custom metadata was present but incomplete. Nothing was dispatched.
    #[error(transparent)]
    MetadataIncomplete(#[from] MissingMetadataKeys),

    /// The trigger call failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl UploaderError {
    /// Builds a [`UploaderError::MalformedEvent`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }

    /// Whether redelivering the same event could succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::MalformedEvent { .. } | Self::Configuration(_) | Self::MetadataIncomplete(_) => {
                RetryPolicy::NonRetryable
            }
            Self::StorageAccess(e) => e.retry_policy(),
            Self::Dispatch(e) => e.retry_policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_lists_every_problem() {
        let err = ConfigError {
            missing: vec!["AIRFLOW_USER", "LOGS_URL"],
            invalid: vec![("DISPATCH_TIMEOUT_SECS", "must be a positive integer".into())],
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: missing AIRFLOW_USER, LOGS_URL; \
             invalid DISPATCH_TIMEOUT_SECS: must be a positive integer"
        );
    }

    #[test]
    fn missing_keys_message_names_keys() {
        let err = MissingMetadataKeys {
            keys: vec!["file_id", "referer"],
        };
        assert_eq!(
            err.to_string(),
            "Custom metadata is missing required keys: file_id, referer"
        );
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundaries() {
        assert_eq!(truncate_body("short".into()), "short");
        let long = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate_body(long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_ERROR_BODY + 3);
    }

    #[test]
    fn status_classification() {
        assert!(RetryPolicy::for_response(503, None).is_retryable());
        assert!(RetryPolicy::for_response(429, None).is_retryable());
        assert!(!RetryPolicy::for_response(400, None).is_retryable());
        assert!(!RetryPolicy::for_response(401, None).is_retryable());
    }

    #[test]
    fn retry_after_is_kept_only_for_retryable_statuses() {
        let wait = Some(Duration::from_secs(30));
        assert_eq!(
            RetryPolicy::for_response(429, wait),
            RetryPolicy::Retryable { after: wait }
        );
        assert_eq!(RetryPolicy::for_response(404, wait).after(), None);

        let err = UploaderError::from(DispatchError::Status {
            status: 503,
            body: String::new(),
            retry_after: wait,
        });
        assert_eq!(err.retry_policy().after(), wait);
    }

    #[test]
    fn retry_after_accepts_delay_seconds_only() {
        assert_eq!(parse_retry_after(" 120 "), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }

    #[test]
    fn incomplete_metadata_is_never_retryable() {
        let err = UploaderError::from(MissingMetadataKeys { keys: vec!["index"] });
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn dispatch_transport_failure_is_retryable() {
        let err = UploaderError::from(DispatchError::Transport {
            message: "connection reset".into(),
            timed_out: false,
        });
        assert!(err.retry_policy().is_retryable());
    }
}
