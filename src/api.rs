// src/api.rs
//! HTTP surface: classify single headlines or whole batches, summarize by region.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregate::{DiseaseStats, RegionScope, RegionSummary, RegionalAggregator, SeverityStats};
use crate::classifier::{ClassifierHandle, TablesInfo};
use crate::corpus::{BatchStats, CorpusProcessor, DatasetRow};
use crate::metrics::record_batch;
use crate::record::{OutbreakRecord, Severity};

#[derive(Clone)]
pub struct AppState {
    pub classifier: ClassifierHandle,
}

impl AppState {
    pub fn new(classifier: ClassifierHandle) -> Self {
        Self { classifier }
    }

    fn processor(&self, as_of: Option<NaiveDate>) -> CorpusProcessor {
        let p = CorpusProcessor::new(self.classifier.current());
        match as_of {
            Some(d) => p.with_reference_date(d),
            None => p,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/classify", post(classify))
        .route("/process", post(process))
        .route("/summary", post(summary))
        .route("/tables", get(tables))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/* ----------------------------
Errors
---------------------------- */

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

fn parse_as_of(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("as_of must be YYYY-MM-DD, got `{s}`"))),
    }
}

/* ----------------------------
Handlers
---------------------------- */

#[derive(Deserialize)]
struct ClassifyReq {
    text: String,
    #[serde(default)]
    as_of: Option<String>,
}

async fn classify(
    State(state): State<AppState>,
    Json(body): Json<ClassifyReq>,
) -> Result<Json<OutbreakRecord>, ApiError> {
    let as_of = parse_as_of(body.as_of.as_deref())?;
    let clf = state.classifier.current();
    let record = match as_of {
        Some(d) => clf.classify_at(&body.text, d),
        None => clf.classify(&body.text),
    };
    Ok(Json(record))
}

#[derive(Deserialize)]
struct BatchReq {
    headlines: Vec<String>,
    #[serde(default)]
    as_of: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    /// Restricts the severity breakdown to the last N days of dated records.
    #[serde(default)]
    window_days: Option<u64>,
}

#[derive(Serialize)]
struct ProcessResp {
    rows: Vec<DatasetRow>,
    stats: BatchStats,
}

async fn process(
    State(state): State<AppState>,
    Json(body): Json<BatchReq>,
) -> Result<Json<ProcessResp>, ApiError> {
    let as_of = parse_as_of(body.as_of.as_deref())?;
    let started = Instant::now();
    let dataset = state.processor(as_of).dataset(&body.headlines);
    let stats = dataset.stats();
    record_batch(&stats, started.elapsed().as_secs_f64() * 1000.0);

    Ok(Json(ProcessResp {
        rows: dataset.rows().collect(),
        stats,
    }))
}

#[derive(Serialize)]
struct SummaryResp {
    summary: RegionSummary,
    diseases: BTreeMap<String, DiseaseStats>,
    severity: BTreeMap<Severity, SeverityStats>,
    high_priority: Vec<DatasetRow>,
}

async fn summary(
    State(state): State<AppState>,
    Json(body): Json<BatchReq>,
) -> Result<Json<SummaryResp>, ApiError> {
    let as_of = parse_as_of(body.as_of.as_deref())?;
    let scope = match body.scope.as_deref() {
        None => RegionScope::All,
        Some(s) => s
            .parse::<RegionScope>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
    };

    let started = Instant::now();
    let dataset = state.processor(as_of).dataset(&body.headlines);
    record_batch(&dataset.stats(), started.elapsed().as_secs_f64() * 1000.0);

    let agg = RegionalAggregator::new(&dataset);
    Ok(Json(SummaryResp {
        summary: agg.summary(scope),
        diseases: agg.disease_distribution(scope),
        severity: agg.severity_breakdown(scope, body.window_days),
        high_priority: agg
            .high_priority(scope, Severity::High)
            .into_iter()
            .map(DatasetRow::from)
            .collect(),
    }))
}

async fn tables(State(state): State<AppState>) -> Json<TablesInfo> {
    Json(state.classifier.current().info())
}
