//! Uploader orchestration adapter for Apache Airflow.
//!
//! Implements [`trigger::WorkflowTrigger`] by creating a DAG run through the
//! Airflow stable REST API:
//!
//! ```text
//! POST {AIRFLOW_WEBSERVER}/api/v1/dags/uploader_dag/dagRuns
//! Authorization: Basic ...
//! { "conf": { ...DispatchRequest... } }
//! ```
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Endpoint construction, authentication, payload
//! encoding and status mapping live here. The [`trigger`] crate sees only
//! [`trigger::WorkflowTrigger`] and [`trigger::DispatchError`].
//!
//! One request per run, bounded by the configured timeout, never retried.
//! The response body is read only to enrich error messages.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Url;
use trigger::errors::{parse_retry_after, truncate_body};
use trigger::{
    config, AirflowConfig, ConfigError, DispatchError, DispatchRequest, Secret, WorkflowTrigger,
};

/// DAG that ingests uploaded documents.
pub const DAG_ID: &str = "uploader_dag";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// [`WorkflowTrigger`] that starts runs of [`DAG_ID`].
#[derive(Debug, Clone)]
pub struct AirflowClient {
    client: reqwest::Client,
    endpoint: Url,
    user: String,
    password: Secret,
}

impl AirflowClient {
    /// Builds the client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the webserver URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(cfg: &AirflowConfig) -> Result<Self, ConfigError> {
        let raw = format!(
            "{}/api/v1/dags/{DAG_ID}/dagRuns",
            cfg.webserver.trim_end_matches('/')
        );
        let endpoint = Url::parse(&raw)
            .map_err(|e| e.to_string())
            .and_then(|url| match url.scheme() {
                "http" | "https" => Ok(url),
                other => Err(format!("unsupported scheme '{other}'")),
            })
            .map_err(|reason| {
                invalid(
                    config::AIRFLOW_WEBSERVER,
                    format!("'{}' is not a valid http(s) URL: {reason}", cfg.webserver),
                )
            })?;

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(cfg.timeout))
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| invalid(config::DISPATCH_TIMEOUT_SECS, e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            user: cfg.user.clone(),
            password: cfg.password.clone(),
        })
    }

    /// The `dagRuns` URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl WorkflowTrigger for AirflowClient {
    #[tracing::instrument(
        name = "airflow.start_run",
        skip_all,
        fields(dag_id = DAG_ID, transaction_id = %request.transaction_id)
    )]
    async fn start_run(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.user, Some(self.password.expose()))
            .json(&request.clone().into_body())
            .send()
            .await
            .map_err(|e| DispatchError::Transport {
                timed_out: e.is_timeout(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "orchestration service rejected run");
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
                retry_after,
            });
        }

        tracing::debug!(status = status.as_u16(), "dag run accepted");
        Ok(())
    }
}

fn invalid(key: &'static str, reason: String) -> ConfigError {
    ConfigError {
        missing: Vec::new(),
        invalid: vec![(key, reason)],
    }
}
