// Drives the reqwest transport and the CDN uploader against a local axum
// server standing in for the hosted backend.

use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use omd_client::api::{ApiError, AuthClient, BackendClient};
use omd_client::upload::{CdnUploader, MediaFile, MediaUploader};

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    query: String,
    apikey: Option<String>,
    authorization: Option<String>,
    accept_profile: Option<String>,
    content_profile: Option<String>,
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
    uploads: Arc<Mutex<Vec<(String, String, usize)>>>,
}

impl Recorder {
    fn record(&self, method: Method, path: &str, query: Option<String>, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.seen.lock().unwrap().push(Seen {
            method,
            path: path.to_string(),
            query: query.unwrap_or_default(),
            apikey: header("apikey"),
            authorization: header("authorization"),
            accept_profile: header("accept-profile"),
            content_profile: header("content-profile"),
        });
    }

    fn last(&self) -> Seen {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

const USER_ID: &str = "7d3f4a9e-0c1b-4c57-9a0e-2f1f7f0e8b11";

async fn pins(
    State(rec): State<Recorder>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> impl IntoResponse {
    rec.record(method.clone(), "pins", query, &headers);
    if method == Method::HEAD {
        return (StatusCode::OK, [("content-range", "*/42")], String::new());
    }
    let rows = json!([{
        "id": Uuid::nil(),
        "lat": "12.5",
        "lng": -3.25,
        "note": "#coffee",
        "media_urls": ["a", "b"],
        "is_private": false
    }]);
    (StatusCode::OK, [("content-range", "0-0/1")], rows.to_string())
}

async fn reports(
    State(rec): State<Recorder>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> impl IntoResponse {
    rec.record(method, "pin_reports", query, &headers);
    (StatusCode::TOO_MANY_REQUESTS, r#"{"message":"slow down"}"#)
}

async fn profiles(
    State(rec): State<Recorder>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> impl IntoResponse {
    rec.record(method, "profiles", query, &headers);
    (StatusCode::BAD_GATEWAY, "<html><body>upstream down</body></html>")
}

async fn token(
    State(rec): State<Recorder>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    rec.record(Method::POST, "token", query, &headers);
    if body["password"] == "wrong" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": "user-token",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": { "id": USER_ID, "email": body["email"] }
        })),
    )
}

async fn upload(State(rec): State<Recorder>, mut multipart: Multipart) -> impl IntoResponse {
    let mut key = String::new();
    let mut path = String::new();
    let mut size = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or_default().to_string().as_str() {
            "file" => size = field.bytes().await.map(|b| b.len()).unwrap_or_default(),
            "key" => key = field.text().await.unwrap_or_default(),
            "path" => path = field.text().await.unwrap_or_default(),
            _ => {}
        }
    }
    rec.uploads.lock().unwrap().push((key.clone(), path, size));

    if key.contains("broken") {
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    if key.contains("hosted") {
        return (StatusCode::OK, json!({ "url": "https://media.example.com/hosted.jpg" }).to_string());
    }
    (StatusCode::OK, json!({ "ok": true }).to_string())
}

async fn spawn_backend() -> (String, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/rest/v1/pins", any(pins))
        .route("/rest/v1/pin_reports", any(reports))
        .route("/rest/v1/profiles", any(profiles))
        .route("/auth/v1/token", post(token))
        .route("/upload", post(upload))
        .with_state(recorder.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), recorder)
}

#[tokio::test]
async fn test_reads_carry_schema_and_anon_key() {
    let (base, rec) = spawn_backend().await;
    let client = BackendClient::http(base, "anon-key", "omd");

    let rows = client
        .from("pins")
        .select("*")
        .eq("is_private", false)
        .order("created_at", false)
        .fetch_values()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["note"], "#coffee");

    let seen = rec.last();
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.apikey.as_deref(), Some("anon-key"));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer anon-key"));
    assert_eq!(seen.accept_profile.as_deref(), Some("omd"));
    assert!(seen.query.contains("is_private=eq.false"), "{}", seen.query);
    assert!(seen.query.contains("order=created_at.desc"), "{}", seen.query);
}

#[tokio::test]
async fn test_count_reads_content_range() {
    let (base, rec) = spawn_backend().await;
    let client = BackendClient::http(base, "anon-key", "omd");

    let count = client.from("pins").eq("user_id", USER_ID).count().await.unwrap();
    assert_eq!(count, 42);
    assert_eq!(rec.last().method, Method::HEAD);
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let (base, rec) = spawn_backend().await;
    let client = BackendClient::http(base, "anon-key", "omd");

    let err = client
        .from("pin_reports")
        .insert_minimal(&json!({ "pin_id": Uuid::nil(), "reason": "spam" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::RateLimited(ref m) if m == "slow down"), "{:?}", err);
    assert_eq!(rec.last().content_profile.as_deref(), Some("omd"));

    let err = client
        .schema("public")
        .from("profiles")
        .fetch_values()
        .await
        .unwrap_err();
    match err {
        ApiError::Api { status, message } => {
            assert_eq!(status, 502);
            assert!(message.contains("check the backend URL"), "{}", message);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(rec.last().accept_profile.as_deref(), Some("public"));
}

#[tokio::test]
async fn test_sign_in_switches_bearer_token() {
    let (base, rec) = spawn_backend().await;
    let client = BackendClient::http(base, "anon-key", "omd");
    let auth = AuthClient::new(client.clone());

    let err = auth.sign_in("rider@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Invalid login credentials"));
    assert!(auth.current_user_id().is_none());

    let session = auth.sign_in("rider@example.com", "secret").await.unwrap();
    assert_eq!(session.user.id.to_string(), USER_ID);
    assert!(rec.last().query.contains("grant_type=password"));

    client.from("pins").fetch_values().await.unwrap();
    assert_eq!(rec.last().authorization.as_deref(), Some("Bearer user-token"));
    assert_eq!(rec.last().apikey.as_deref(), Some("anon-key"));
}

#[tokio::test]
async fn test_upload_prefers_worker_url_then_falls_back() {
    let (base, rec) = spawn_backend().await;
    let uploader = CdnUploader::new(format!("{}/upload", base), "https://cdn.example.com/");
    let file = MediaFile::new("shot.jpg", "image/jpeg", vec![1, 2, 3, 4]);

    let url = uploader.upload(&file, "onemoreday/posts/hosted/a.jpg").await.unwrap();
    assert_eq!(url, "https://media.example.com/hosted.jpg");

    let key = "onemoreday/posts/u1/2025/03/1700000000000-abc123.jpg";
    let url = uploader.upload(&file, key).await.unwrap();
    assert_eq!(url, format!("https://cdn.example.com/{}", key));

    let uploads = rec.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[1].0, key);
    assert_eq!(uploads[1].1, "onemoreday/posts/u1/2025/03");
    assert_eq!(uploads[1].2, 4);
}

#[tokio::test]
async fn test_upload_failure_reports_status() {
    let (base, _rec) = spawn_backend().await;
    let uploader = CdnUploader::new(format!("{}/upload", base), "https://cdn.example.com");
    let file = MediaFile::new("shot.jpg", "image/jpeg", vec![9; 16]);

    let err = uploader.upload(&file, "onemoreday/posts/broken/a.jpg").await.unwrap_err();
    match err {
        ApiError::Upload { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Upload failed (500)");
        }
        other => panic!("unexpected error {:?}", other),
    }

    // Rejected before any request is made
    let empty = MediaFile::new("empty.jpg", "image/jpeg", Vec::new());
    assert!(matches!(
        uploader.upload(&empty, "k").await,
        Err(ApiError::Validation(_))
    ));
}
