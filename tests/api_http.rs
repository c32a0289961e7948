// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use outbreak_tracker::api::{self, AppState};
use outbreak_tracker::{ClassifierHandle, HeadlineClassifier};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    let clf = HeadlineClassifier::with_embedded_tables().expect("embedded tables");
    api::router(AppState::new(ClassifierHandle::new(clf)))
}

async fn post_json(app: Router, uri: &str, payload: Json) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = test_router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "OK");
}

#[tokio::test]
async fn classify_returns_record_fields() {
    let (status, v) = post_json(
        test_router(),
        "/classify",
        json!({ "text": "Cholera cases rising across East Africa this week", "as_of": "2024-03-15" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["region"], "EastAfrica");
    assert_eq!(v["disease"], "Cholera");
    assert_eq!(v["severity"], "High");
    assert_eq!(v["date"], "2024-W11");
    assert_eq!(v["is_uganda"], false);
    assert_eq!(v["is_east_africa"], true);
    assert_eq!(
        v["raw_text"],
        "Cholera cases rising across East Africa this week"
    );
}

#[tokio::test]
async fn bad_reference_date_is_400() {
    let (status, v) = post_json(
        test_router(),
        "/classify",
        json!({ "text": "Ebola in Uganda", "as_of": "March 15" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap_or_default().contains("as_of"));
}

#[tokio::test]
async fn process_keeps_row_count_and_order() {
    let (status, v) = post_json(
        test_router(),
        "/process",
        json!({
            "headlines": ["Ebola outbreak confirmed in Uganda", "", "Flu season begins in Kenya"],
            "as_of": "2024-03-15"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = v["rows"].as_array().expect("rows array");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["disease"], "Ebola");
    assert_eq!(rows[1]["disease"], "Unknown");
    assert_eq!(rows[2]["country"], "Kenya");
    assert_eq!(v["stats"]["total"], 3);
    assert_eq!(v["stats"]["unparsed"], 1);
}

#[tokio::test]
async fn summary_scopes_to_uganda() {
    let (status, v) = post_json(
        test_router(),
        "/summary",
        json!({
            "headlines": [
                "Ebola outbreak confirmed in Uganda",
                "Measles in Gulu",
                "Flu season begins in Kenya"
            ],
            "scope": "uganda"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["summary"]["scope"], "uganda");
    assert_eq!(v["summary"]["total_outbreaks"], 2);
    assert_eq!(v["summary"]["high_severity_count"], 1);
    assert_eq!(v["diseases"]["Measles"]["severity"], "Medium");
    assert_eq!(v["severity"]["High"]["count"], 1);
    assert_eq!(v["high_priority"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn unknown_scope_is_400() {
    let (status, _) = post_json(
        test_router(),
        "/summary",
        json!({ "headlines": ["Ebola in Uganda"], "scope": "europe" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tables_reports_versions_and_sizes() {
    let req = Request::builder()
        .uri("/tables")
        .body(Body::empty())
        .unwrap();
    let resp = test_router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["version"], "2024.04");
    assert_eq!(v["severity_entries"], 10);
    assert!(v["places"].as_u64().unwrap_or(0) > 10);
}
