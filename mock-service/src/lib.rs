//! Mock target service and Loki push receiver used by the barrage tests and demos.
use axum::{
    debug_handler,
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub fn router() -> Router {
    Router::new()
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/fail/delay/ms/:delay_ms", get(fail))
        .route("/max/:max_rps/delay/ms/:delay_ms/name/:name", get(max))
        .route("/loki/api/v1/push", post(loki_push))
        .route("/loki/received", get(loki_received))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(addr: SocketAddr) {
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => serve(listener).await,
        Err(err) => tracing::error!("Unable to bind mock service to {addr}: {err}"),
    }
}

pub async fn serve(listener: tokio::net::TcpListener) {
    if let Err(err) = axum::serve(listener, router()).await {
        tracing::error!("Mock service exited: {err}");
    }
}

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) -> &'static str {
    counter!("mock-service.rps").increment(1);
    RPS_MEASURE.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    "ok"
}

#[debug_handler]
pub async fn fail(Path(delay_ms): Path<u64>) -> StatusCode {
    counter!("mock-service.rps").increment(1);
    RPS_MEASURE.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    StatusCode::INTERNAL_SERVER_ERROR
}

lazy_static! {
    static ref MAX_MAP: RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>> =
        RwLock::new(HashMap::new());
}

/// Fails every request above `max_rps` for a given name.
#[debug_handler]
pub async fn max(
    Path((max_rps, delay_ms, name)): Path<(u32, u64, String)>,
) -> Result<(), StatusCode> {
    RPS_MEASURE.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let existing = MAX_MAP
        .read()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .get(&name)
        .cloned();
    let limiter = match existing {
        Some(limiter) => limiter,
        None => {
            debug!(limiter = %name, max_rps, "New limited target");
            let limiter = Arc::new(rate_limiter(max_rps));
            MAX_MAP
                .write()
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
                .entry(name)
                .or_insert(limiter)
                .clone()
        }
    };

    limiter
        .check()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/** Loki **/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LokiStream {
    pub stream: BTreeMap<String, String>,
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LokiPush {
    pub streams: Vec<LokiStream>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedPush {
    pub tenant: Option<String>,
    pub authorization: Option<String>,
    pub body: LokiPush,
}

lazy_static! {
    static ref LOKI_PUSHES: Mutex<Vec<ReceivedPush>> = Mutex::new(vec![]);
}

#[debug_handler]
pub async fn loki_push(headers: HeaderMap, Json(body): Json<LokiPush>) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let entries: usize = body.streams.iter().map(|s| s.values.len()).sum();
    counter!("mock-service.loki.entries").increment(entries as u64);
    debug!(entries, "Loki push received");

    match LOKI_PUSHES.lock() {
        Ok(mut pushes) => {
            pushes.push(ReceivedPush {
                tenant: header("x-scope-orgid"),
                authorization: header("authorization"),
                body,
            });
            StatusCode::NO_CONTENT
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[debug_handler]
pub async fn loki_received() -> Json<Vec<ReceivedPush>> {
    Json(loki_pushes())
}

/// Every push received so far.
pub fn loki_pushes() -> Vec<ReceivedPush> {
    LOKI_PUSHES
        .lock()
        .map(|pushes| pushes.clone())
        .unwrap_or_default()
}

/** Utils **/

pub fn rate_limiter(rps: u32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(
        NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN),
    ))
}

/** RPS Printer **/

static RPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn rps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let requests = RPS_MEASURE.swap(0, Ordering::Relaxed);
        gauge!("mock-service.measured_rps").set(requests as f64);
        println!("{requests} RPS");
    }
}
