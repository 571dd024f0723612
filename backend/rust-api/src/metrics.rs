use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    // Store Metrics
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Generation Metrics
    pub static ref ARTIFACT_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "artifact_requests_total",
        "Artifact requests by kind and where the returned artifact came from",
        &["kind", "source"]
    )
    .unwrap();

    pub static ref GATEWAY_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gateway_calls_total",
        "Calls to the generation provider by kind and outcome",
        &["kind", "outcome"]
    )
    .unwrap();

    pub static ref GATEWAY_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "gateway_call_duration_seconds",
        "Generation provider round-trip in seconds",
        &["kind"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 60.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref QUIZ_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_attempts_total",
        "Total number of graded quiz attempts",
        &["passed"]
    )
    .unwrap();

    pub static ref EXTRACTION_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "extraction_jobs_total",
        "Background text extraction jobs by outcome",
        &["outcome"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track store operation with metrics
pub async fn track_db_operation<F, T, E>(operation: &str, collection: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

pub fn record_artifact_request(kind: &str, source: &str) {
    ARTIFACT_REQUESTS_TOTAL
        .with_label_values(&[kind, source])
        .inc();
}

pub fn record_gateway_call(kind: &str, outcome: &str) {
    GATEWAY_CALLS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = GATEWAY_CALLS_TOTAL
            .with_label_values(&["summary", "success"])
            .get();
    }

    #[test]
    fn test_render_metrics() {
        record_artifact_request("quiz", "fallback");

        let output = render_metrics().unwrap();
        assert!(output.contains("artifact_requests_total"));
    }

    #[tokio::test]
    async fn track_db_operation_passes_result_through() {
        let ok: Result<u8, String> =
            track_db_operation("find_one", "materials", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u8, String> =
            track_db_operation("find_one", "materials", async { Err("down".to_string()) }).await;
        assert!(err.is_err());
    }
}
