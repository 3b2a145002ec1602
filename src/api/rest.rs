use axum::{
    Router,
    routing::get,
    extract::{Query, State, Json},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::comparison::{compare_snapshot, ComparisonResult};
use crate::config::ComparisonConfig;
use crate::core::acquisition::{AcquisitionService, CommitOutcome};
use crate::error::Error;
use crate::ledger::WindowOrder;
use crate::observability::metrics::gather_text;
use crate::types::calendar::format_local;
use crate::types::snapshot::RateSnapshot;

pub struct ApiState {
    pub service: Arc<AcquisitionService>,
    pub timezone: Tz,
    pub comparison: ComparisonConfig,
    pub history_limit: usize,
}

pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/scrape", get(scrape).post(scrape))
        .route("/api/rates", get(latest_rates))
        .route("/api/history", get(history))
        .route("/api/compare", get(compare_latest))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Crate error carried out of a handler.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::AcquisitionInProgress => StatusCode::CONFLICT,
            Error::EmptyLedger => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", timestamp: Utc::now() })
}

/// Snapshot as served to clients, with its recording time in local display form.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RatesView {
    #[serde(flatten)]
    snapshot: RateSnapshot,
    last_updated: String,
}

impl RatesView {
    fn new(snapshot: RateSnapshot, tz: Tz) -> Self {
        let last_updated = format_local(snapshot.recorded_at, tz);
        RatesView { snapshot, last_updated }
    }
}

#[derive(Serialize)]
struct ScrapeResponse {
    success: bool,
    outcome: CommitOutcome,
    data: RatesView,
}

async fn scrape(State(state): State<Arc<ApiState>>) -> Result<Json<ScrapeResponse>, ApiError> {
    tracing::info!("Manual acquisition requested");
    let report = state.service.try_trigger().await?;

    Ok(Json(ScrapeResponse {
        success: true,
        outcome: report.outcome,
        data: RatesView::new(report.snapshot, state.timezone),
    }))
}

async fn latest_rates(State(state): State<Arc<ApiState>>) -> Result<Json<RatesView>, ApiError> {
    state.service.ledger().refresh().await;
    let latest = state.service.ledger().latest().await.ok_or(Error::EmptyLedger)?;
    Ok(Json(RatesView::new(latest, state.timezone)))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
    #[serde(default)]
    order: WindowOrder,
}

async fn history(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<RatesView>> {
    let limit = query.limit.unwrap_or(state.history_limit);
    state.service.ledger().refresh().await;
    let window = state.service.ledger().window(limit, query.order).await;

    Json(window.into_iter().map(|s| RatesView::new(s, state.timezone)).collect())
}

#[derive(Deserialize)]
struct CompareQuery {
    budget: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    budget: f64,
    calendar_day: NaiveDate,
    #[serde(flatten)]
    result: ComparisonResult,
}

async fn compare_latest(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<CompareResponse>, ApiError> {
    state.service.ledger().refresh().await;
    let latest = state.service.ledger().latest().await.ok_or(Error::EmptyLedger)?;

    Ok(Json(CompareResponse {
        budget: query.budget,
        calendar_day: latest.calendar_day,
        result: compare_snapshot(query.budget, &latest, &state.comparison),
    }))
}

async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_text(),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;
    use crate::ledger::memory::MemoryBackend;
    use crate::ledger::testing::snapshot;
    use crate::ledger::LedgerStore;
    use crate::rate_infra::aggregator::testing::{aggregator, FixedConnector};
    use crate::rate_infra::aggregator::RateAggregator;
    use crate::types::reading::SourceReading;
    use crate::types::snapshot::KioskRates;

    const KIOSK: KioskRates = KioskRates { twd_rate: 0.995, usd_rate: 31.36 };

    async fn make_state(backend: &MemoryBackend, aggregator: RateAggregator) -> Arc<ApiState> {
        let ledger = Arc::new(LedgerStore::open(Box::new(backend.clone()), 30).await);
        Arc::new(ApiState {
            service: Arc::new(AcquisitionService::new_with_dependencies(aggregator, ledger, true)),
            timezone: chrono_tz::Asia::Taipei,
            comparison: ComparisonConfig::default(),
            history_limit: 30,
        })
    }

    fn live_aggregator() -> RateAggregator {
        aggregator(SourceReading::Live(31.8), SourceReading::Live(KIOSK))
    }

    async fn send(state: Arc<ApiState>, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = make_state(&MemoryBackend::new(), live_aggregator()).await;
        let (status, body) = send(state, "GET", "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_rates_not_found_when_ledger_empty() {
        let state = make_state(&MemoryBackend::new(), live_aggregator()).await;

        let (status, _) = send(state.clone(), "GET", "/api/rates").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(state, "GET", "/api/compare?budget=50000").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scrape_then_read_latest() {
        let state = make_state(&MemoryBackend::new(), live_aggregator()).await;

        let (status, body) = send(state.clone(), "POST", "/api/scrape").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["bankSellUsd"], 31.8);

        let (status, body) = send(state, "GET", "/api/rates").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kioskUsdRate"], 31.36);
        assert_eq!(body["degraded"], false);
        assert!(body["lastUpdated"].as_str().unwrap().contains('/'));
    }

    #[tokio::test]
    async fn test_scrape_conflicts_while_cycle_running() {
        let slow = RateAggregator::new(
            Arc::new(FixedConnector::delayed(SourceReading::Live(31.8), Duration::from_millis(300))),
            Arc::new(FixedConnector::new(SourceReading::Live(KIOSK))),
            chrono_tz::Asia::Taipei,
        );
        let state = make_state(&MemoryBackend::new(), slow).await;

        let running = tokio::spawn({
            let service = state.service.clone();
            async move { service.trigger().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (status, body) = send(state, "GET", "/api/scrape").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("in progress"));

        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_scrape_storage_failure_is_500() {
        let backend = MemoryBackend::new();
        let state = make_state(&backend, live_aggregator()).await;
        backend.fail_commits(true);

        let (status, _) = send(state, "POST", "/api/scrape").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_history_limit_and_order() {
        let backend = MemoryBackend::with_records((0..5).map(|d| snapshot(d, 31.0 + d as f64)).collect());
        let state = make_state(&backend, live_aggregator()).await;

        let (status, body) = send(state.clone(), "GET", "/api/history?limit=3").await;
        assert_eq!(status, StatusCode::OK);
        let banks: Vec<f64> = body.as_array().unwrap().iter().map(|r| r["bankSellUsd"].as_f64().unwrap()).collect();
        assert_eq!(banks, vec![33.0, 34.0, 35.0]);

        let (_, body) = send(state, "GET", "/api/history?limit=2&order=descending").await;
        let banks: Vec<f64> = body.as_array().unwrap().iter().map(|r| r["bankSellUsd"].as_f64().unwrap()).collect();
        assert_eq!(banks, vec![35.0, 34.0]);
    }

    #[tokio::test]
    async fn test_rates_pick_up_records_written_elsewhere() {
        let backend = MemoryBackend::new();
        let state = make_state(&backend, live_aggregator()).await;
        let other = LedgerStore::open(Box::new(backend.clone()), 30).await;
        other.upsert(snapshot(0, 31.7)).await.unwrap();

        let (status, body) = send(state, "GET", "/api/rates").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bankSellUsd"], 31.7);
    }

    #[tokio::test]
    async fn test_compare_against_latest() {
        let mut latest = snapshot(0, 31.8);
        latest.kiosk_twd_rate = 0.995;
        latest.kiosk_usd_rate = 31.36;
        let state = make_state(&MemoryBackend::with_records(vec![latest]), live_aggregator()).await;

        let (status, body) = send(state, "GET", "/api/compare?budget=50000").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pathDirectTotal"], 49750);
        assert_eq!(body["pathCrossTotal"], 49297);
        assert_eq!(body["recommendedPath"], "DIRECT");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        crate::observability::metrics::register_metrics();
        let state = make_state(&MemoryBackend::new(), live_aggregator()).await;

        let response = create_router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&text).contains("ledger_entries"));
    }
}
