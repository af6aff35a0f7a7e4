// db-inspector/crates/db-inspector/src/metrics.rs

use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;
use tracing::warn;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static UPLOAD_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static ACTIVE_DATABASE: OnceLock<IntGauge> = OnceLock::new();

pub fn init_metrics() {
    match IntCounterVec::new(
        prometheus::opts!("requests_total", "Total requests per route"),
        &["route", "status"],
    ) {
        Ok(counter) => {
            if REQ_COUNTER.set(counter.clone()).is_ok() {
                REGISTRY.register(Box::new(counter)).ok();
            }
        }
        Err(e) => warn!("requests_total metric unavailable: {}", e),
    }

    match IntCounterVec::new(
        prometheus::opts!("uploads_total", "Database uploads by outcome"),
        &["outcome"],
    ) {
        Ok(counter) => {
            if UPLOAD_COUNTER.set(counter.clone()).is_ok() {
                REGISTRY.register(Box::new(counter)).ok();
            }
        }
        Err(e) => warn!("uploads_total metric unavailable: {}", e),
    }

    match IntGauge::new("active_database", "1 when a database is selected") {
        Ok(gauge) => {
            if ACTIVE_DATABASE.set(gauge.clone()).is_ok() {
                REGISTRY.register(Box::new(gauge)).ok();
            }
        }
        Err(e) => warn!("active_database metric unavailable: {}", e),
    }
}

pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}

pub fn inc_upload(outcome: &str) {
    if let Some(counter) = UPLOAD_COUNTER.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn set_active_database(active: bool) {
    if let Some(gauge) = ACTIVE_DATABASE.get() {
        gauge.set(i64::from(active));
    }
}

pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("failed to encode metrics: {}", e).into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}
