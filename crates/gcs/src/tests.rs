use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use trigger::{BucketName, ObjectName, ObjectStore, StorageConfig, StorageError};

use super::{Credentials, GcsObjectStore};

// ---------------------------------------------------------------------------
// Throwaway Cloud Storage + metadata server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SeenRequest {
    bucket: String,
    object: String,
    fields: Option<String>,
    authorization: Option<String>,
}

#[derive(Clone)]
struct FakeGcs {
    status: StatusCode,
    body: Value,
    delay: Option<Duration>,
    retry_after: Option<&'static str>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeGcs {
    fn replying(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            delay: None,
            retry_after: None,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn get_object(
    State(fake): State<FakeGcs>,
    Path((bucket, object)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    fake.seen.lock().unwrap().push(SeenRequest {
        bucket,
        object,
        fields: query.get("fields").cloned(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
    if let Some(delay) = fake.delay {
        tokio::time::sleep(delay).await;
    }
    let mut headers = HeaderMap::new();
    if let Some(seconds) = fake.retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from_static(seconds));
    }
    (fake.status, headers, Json(fake.body.clone()))
}

async fn issue_token(headers: HeaderMap) -> impl IntoResponse {
    let flavored = headers
        .get("metadata-flavor")
        .and_then(|v| v.to_str().ok())
        == Some("Google");
    if flavored {
        (
            StatusCode::OK,
            Json(json!({ "access_token": "tok-123", "expires_in": 3599, "token_type": "Bearer" })),
        )
    } else {
        (StatusCode::FORBIDDEN, Json(json!({ "error": "missing Metadata-Flavor" })))
    }
}

/// Serves the fake on `127.0.0.1:0` and returns its base URL.
async fn serve(fake: FakeGcs) -> String {
    let app = Router::new()
        .route("/storage/v1/b/{bucket}/o/{object}", get(get_object))
        .route("/token", get(issue_token))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake gcs server");
    });
    format!("http://{addr}")
}

fn bucket() -> BucketName {
    BucketName::new("uploads").unwrap()
}

fn object(name: &str) -> ObjectName {
    ObjectName::new(name).unwrap()
}

fn anonymous(base: &str) -> GcsObjectStore {
    GcsObjectStore::new(base, Credentials::Anonymous, Duration::from_secs(5)).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reads_custom_metadata_with_encoded_object_name() {
    let fake = FakeGcs::replying(
        StatusCode::OK,
        json!({ "metadata": { "file_id": "f1", "domain": "finance,ops" } }),
    );
    let base = serve(fake.clone()).await;

    let descriptor = anonymous(&base)
        .fetch_descriptor(&bucket(), &object("reports/2024/q3.pdf"))
        .await
        .unwrap();

    let metadata = descriptor.custom_metadata.expect("metadata present");
    assert_eq!(metadata.get("file_id").map(String::as_str), Some("f1"));

    let seen = fake.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].bucket, "uploads");
    assert_eq!(seen[0].object, "reports/2024/q3.pdf");
    assert_eq!(seen[0].fields.as_deref(), Some("metadata"));
    assert_eq!(seen[0].authorization, None);
}

#[tokio::test]
async fn object_without_metadata_yields_empty_descriptor() {
    let fake = FakeGcs::replying(StatusCode::OK, json!({}));
    let base = serve(fake).await;

    let descriptor = anonymous(&base)
        .fetch_descriptor(&bucket(), &object("notes.txt"))
        .await
        .unwrap();

    assert_eq!(descriptor.custom_metadata, None);
    assert!(descriptor.non_empty_metadata().is_none());
}

#[tokio::test]
async fn uses_metadata_server_token_as_bearer() {
    let fake = FakeGcs::replying(StatusCode::OK, json!({ "metadata": { "a": "b" } }));
    let base = serve(fake.clone()).await;
    let credentials = Credentials::MetadataServer {
        token_url: format!("{base}/token").parse().unwrap(),
    };
    let store = GcsObjectStore::new(&base, credentials, Duration::from_secs(5)).unwrap();

    store
        .fetch_descriptor(&bucket(), &object("deck.pptx"))
        .await
        .unwrap();

    assert_eq!(
        fake.seen()[0].authorization.as_deref(),
        Some("Bearer tok-123")
    );
}

#[tokio::test]
async fn unreachable_metadata_server_is_a_credentials_error() {
    let fake = FakeGcs::replying(StatusCode::OK, json!({}));
    let base = serve(fake.clone()).await;
    let credentials = Credentials::MetadataServer {
        token_url: format!("{base}/no-such-token-endpoint").parse().unwrap(),
    };
    let store = GcsObjectStore::new(&base, credentials, Duration::from_secs(5)).unwrap();

    let err = store
        .fetch_descriptor(&bucket(), &object("deck.pptx"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Credentials { .. }), "{err:?}");
    assert!(fake.seen().is_empty(), "no object read without a token");
}

#[tokio::test]
async fn maps_error_statuses() {
    let cases = [
        (StatusCode::NOT_FOUND, "not_found"),
        (StatusCode::FORBIDDEN, "denied"),
        (StatusCode::UNAUTHORIZED, "denied"),
        (StatusCode::SERVICE_UNAVAILABLE, "status"),
    ];

    for (status, expected) in cases {
        let fake = FakeGcs::replying(status, json!({ "error": { "code": status.as_u16() } }));
        let base = serve(fake).await;

        let err = anonymous(&base)
            .fetch_descriptor(&bucket(), &object("q3.pdf"))
            .await
            .unwrap_err();

        let kind = match &err {
            StorageError::NotFound { .. } => "not_found",
            StorageError::AccessDenied { .. } => "denied",
            StorageError::Status { .. } => "status",
            _ => "other",
        };
        assert_eq!(kind, expected, "status {status}: {err:?}");
        assert_eq!(
            err.retry_policy().is_retryable(),
            status == StatusCode::SERVICE_UNAVAILABLE
        );
    }
}

#[tokio::test]
async fn unavailable_storage_reports_retry_after() {
    let mut fake = FakeGcs::replying(StatusCode::SERVICE_UNAVAILABLE, json!({}));
    fake.retry_after = Some("30");
    let base = serve(fake).await;

    let err = anonymous(&base)
        .fetch_descriptor(&bucket(), &object("q3.pdf"))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            StorageError::Status {
                status: 503,
                retry_after: Some(after),
                ..
            } if after == Duration::from_secs(30)
        ),
        "{err:?}"
    );
    assert_eq!(err.retry_policy().after(), Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn slow_storage_times_out_without_retry() {
    let mut fake = FakeGcs::replying(StatusCode::OK, json!({}));
    fake.delay = Some(Duration::from_secs(2));
    let base = serve(fake.clone()).await;
    let store =
        GcsObjectStore::new(&base, Credentials::Anonymous, Duration::from_millis(200)).unwrap();

    let err = store
        .fetch_descriptor(&bucket(), &object("q3.pdf"))
        .await
        .unwrap_err();

    assert!(
        matches!(err, StorageError::Transport { timed_out: true, .. }),
        "{err:?}"
    );
    assert_eq!(fake.seen().len(), 1);
}

#[tokio::test]
async fn emulator_host_without_scheme_is_accepted() {
    let fake = FakeGcs::replying(StatusCode::OK, json!({ "metadata": { "k": "v" } }));
    let base = serve(fake.clone()).await;
    let host = base.trim_start_matches("http://").to_string();

    let store = GcsObjectStore::from_config(&StorageConfig {
        emulator_host: Some(host),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    store
        .fetch_descriptor(&bucket(), &object("notes.txt"))
        .await
        .unwrap();

    assert_eq!(fake.seen()[0].authorization, None);
}

#[test]
fn rejects_unusable_base_url() {
    let err = GcsObjectStore::new("not a url", Credentials::Anonymous, Duration::from_secs(1))
        .unwrap_err();
    assert_eq!(err.invalid.len(), 1);
}
