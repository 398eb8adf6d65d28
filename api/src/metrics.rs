use once_cell::sync::Lazy;
use prometheus::{
    opts, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder,
};

macro_rules! counter_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| IntCounterVec::new(opts!($name, $help), $labels).unwrap())
    };
}
macro_rules! histogram_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| {
            HistogramVec::new(HistogramOpts::new($name, $help).buckets(LATENCY_BUCKETS.to_vec()), $labels)
                .unwrap()
        })
    };
}
macro_rules! gauge {
    ($name:expr, $help:expr) => {
        Lazy::new(|| IntGauge::new($name, $help).unwrap())
    };
}

const LATENCY_BUCKETS: [f64; 14] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

// ── HTTP ────────────────────────────────────────────────────────────────────
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> =
    counter_vec!("http_requests_total", "Total HTTP requests", &["method", "path", "status"]);
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> =
    histogram_vec!("http_request_duration_seconds", "HTTP request latency", &["method", "path"]);
pub static HTTP_IN_FLIGHT: Lazy<IntGauge> = gauge!("http_requests_in_flight", "In-flight HTTP requests");

// ── Input screening ─────────────────────────────────────────────────────────
pub static VALIDATION_REJECTIONS_TOTAL: Lazy<IntCounterVec> = counter_vec!(
    "validation_rejections_total",
    "Inputs rejected by field validators",
    &["field"]
);
pub static SUSPICIOUS_INPUT_TOTAL: Lazy<IntCounterVec> = counter_vec!(
    "suspicious_input_total",
    "Inputs matching an injection or XSS indicator",
    &["kind"]
);
pub static SUSPICIOUS_USER_AGENTS_TOTAL: Lazy<IntCounterVec> = counter_vec!(
    "suspicious_user_agents_total",
    "Requests from user agents on the watch list",
    &["pattern"]
);

// ── Errors ──────────────────────────────────────────────────────────────────
pub static ERROR_RESPONSES_TOTAL: Lazy<IntCounterVec> = counter_vec!(
    "error_responses_total",
    "Error envelopes returned to callers",
    &["code", "status"]
);
pub static RATE_LIMITED_TOTAL: Lazy<IntCounterVec> = counter_vec!(
    "rate_limited_total",
    "Requests rejected by the rate limiter",
    &["endpoint"]
);

// ── Data source ─────────────────────────────────────────────────────────────
pub static DB_QUERY_DURATION: Lazy<HistogramVec> =
    histogram_vec!("db_query_duration_seconds", "Catalog query latency", &["query"]);

pub fn register_all(r: &Registry) -> prometheus::Result<()> {
    r.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    r.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    r.register(Box::new(HTTP_IN_FLIGHT.clone()))?;
    r.register(Box::new(VALIDATION_REJECTIONS_TOTAL.clone()))?;
    r.register(Box::new(SUSPICIOUS_INPUT_TOTAL.clone()))?;
    r.register(Box::new(SUSPICIOUS_USER_AGENTS_TOTAL.clone()))?;
    r.register(Box::new(ERROR_RESPONSES_TOTAL.clone()))?;
    r.register(Box::new(RATE_LIMITED_TOTAL.clone()))?;
    r.register(Box::new(DB_QUERY_DURATION.clone()))?;
    Ok(())
}

pub fn gather_metrics(r: &Registry) -> String {
    let encoder = TextEncoder::new();
    let families = r.gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf).unwrap_or_default();
    String::from_utf8(buf).unwrap_or_default()
}

pub fn observe_http(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn observe_error_response(code: &str, status: u16) {
    ERROR_RESPONSES_TOTAL
        .with_label_values(&[code, &status.to_string()])
        .inc();
}

pub fn observe_db_query(query: &str, duration_secs: f64) {
    DB_QUERY_DURATION
        .with_label_values(&[query])
        .observe(duration_secs);
}
