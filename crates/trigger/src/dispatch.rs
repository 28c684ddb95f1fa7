//! The run-trigger payload sent to the orchestration service.

use serde::Serialize;

use crate::{IncomingEvent, RequiredMetadata, TransactionId};

/// Parser the orchestration run is told to use.
pub const PARSER_TYPE: &str = "parsr";

/// Model the orchestration run is told to use.
pub const MODEL_TYPE: &str = "vitgpt";

/// Log index the orchestration run writes progress to.
pub const LOG_INDEX: &str = "disearch_dev";

/// Values read from configuration that every dispatch carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Forwarded verbatim as `logs_url`.
    pub logs_url: String,
}

/// The `conf` object of a DAG run request.
///
/// Field names are the orchestration DAG's contract and mix naming styles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRequest {
    #[serde(rename = "fileUrl")]
    pub file_url: String,
    pub index: String,
    pub parser_type: &'static str,
    /// JSON-encoded array of domain tags.
    pub domain: String,
    pub model_type: &'static str,
    pub file_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub user_id: String,
    pub referer: String,
    pub log_index: &'static str,
    pub logs_url: String,
    #[serde(rename = "transactionId")]
    pub transaction_id: TransactionId,
}

impl DispatchRequest {
    /// Builds the payload for one dispatch attempt.
    pub fn new(
        event: &IncomingEvent,
        metadata: &RequiredMetadata,
        settings: &DispatchSettings,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            file_url: event.object_url(),
            index: metadata.index.to_string(),
            parser_type: PARSER_TYPE,
            domain: metadata.domain.to_wire(),
            model_type: MODEL_TYPE,
            file_id: metadata.file_id.to_string(),
            file_name: metadata.file_name.clone(),
            user_id: metadata.user_id.to_string(),
            referer: metadata.referer.clone(),
            log_index: LOG_INDEX,
            logs_url: settings.logs_url.clone(),
            transaction_id,
        }
    }

    /// Wraps the payload in the `{"conf": ...}` envelope of a DAG run request.
    pub fn into_body(self) -> DagRunBody {
        DagRunBody { conf: self }
    }
}

/// Request body for `POST /api/v1/dags/{dag_id}/dagRuns`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DagRunBody {
    pub conf: DispatchRequest,
}
