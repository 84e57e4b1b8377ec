//! Auxiliary HTTP surface for metrics: `/v1/metrics` (JSON) and
//! `/v1/metrics/prom` (Prometheus text exposition format), gated by the
//! same bearer-token check on both routes.

use crate::metrics::MetricsSnapshot;
use crate::state::AppState;
use axum::extract::State;
use axum::http::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

async fn enforce_metrics_auth(headers: &HeaderMap, state: &AppState) -> Result<(), StatusCode> {
    let Some(raw_header) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        tracing::warn!("unauthorized metrics access attempt: missing Authorization header");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Some(token) = raw_header.strip_prefix("Bearer ") else {
        tracing::warn!("unauthorized metrics access attempt: invalid Authorization scheme");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if let Some(expected) = state.config.security.metrics_auth_token.as_deref() {
        if token == expected {
            return Ok(());
        }
    }

    tracing::warn!("unauthorized metrics access attempt: token rejected");
    Err(StatusCode::UNAUTHORIZED)
}

/// `/v1/metrics`: the full [`MetricsSnapshot`] as JSON.
pub async fn metrics_handler(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> axum::response::Result<axum::response::Json<MetricsSnapshot>> {
    if state.config.security.require_metrics_auth {
        enforce_metrics_auth(&headers, &state).await?;
    }
    Ok(axum::response::Json(state.metrics.snapshot().await))
}

/// `/v1/metrics/prom`: the same snapshot rendered as Prometheus text
/// exposition format (version 0.0.4).
pub async fn prometheus_metrics_handler(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> axum::response::Result<Response> {
    if state.config.security.require_metrics_auth {
        enforce_metrics_auth(&headers, &state).await?;
    }

    let snapshot = state.metrics.snapshot().await;
    let body = render_prometheus_metrics(&snapshot);
    let headers = [(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    )];
    Ok((headers, body).into_response())
}

/// Render a [`MetricsSnapshot`] into Prometheus text exposition format.
fn render_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    use crate::metrics::OperationLatencyMetrics;
    use std::fmt::Write;

    fn write_metric(buf: &mut String, name: &str, help: &str, metric_type: &str, value: f64) {
        let _ = writeln!(buf, "# HELP {name} {help}");
        let _ = writeln!(buf, "# TYPE {name} {metric_type}");
        let _ = writeln!(buf, "{name} {value}");
    }

    fn counter(buf: &mut String, name: &str, help: &str, value: u64) {
        write_metric(buf, name, help, "counter", value as f64);
    }

    fn gauge(buf: &mut String, name: &str, help: &str, value: u64) {
        write_metric(buf, name, help, "gauge", value as f64);
    }

    fn gauge_f64(buf: &mut String, name: &str, help: &str, value: f64) {
        write_metric(buf, name, help, "gauge", value);
    }

    fn emit_latency_metrics(
        buf: &mut String,
        prefix: &str,
        description: &str,
        metrics: &OperationLatencyMetrics,
    ) {
        if let Some(value) = metrics.average_ms {
            gauge_f64(buf, &format!("{prefix}_average_ms"), &format!("Average {description} latency in milliseconds"), value);
        }
        if let Some(value) = metrics.p50_ms {
            gauge_f64(buf, &format!("{prefix}_p50_ms"), &format!("p50 {description} latency in milliseconds"), value);
        }
        if let Some(value) = metrics.p95_ms {
            gauge_f64(buf, &format!("{prefix}_p95_ms"), &format!("p95 {description} latency in milliseconds"), value);
        }
        if let Some(value) = metrics.p99_ms {
            gauge_f64(buf, &format!("{prefix}_p99_ms"), &format!("p99 {description} latency in milliseconds"), value);
        }
        if let Some(value) = metrics.min_ms {
            gauge_f64(buf, &format!("{prefix}_min_ms"), &format!("Minimum observed {description} latency in milliseconds"), value);
        }
        if let Some(value) = metrics.max_ms {
            gauge_f64(buf, &format!("{prefix}_max_ms"), &format!("Maximum observed {description} latency in milliseconds"), value);
        }
        counter(
            buf,
            &format!("{prefix}_samples_total"),
            &format!("Total samples recorded for {description} latency calculations"),
            metrics.sample_count,
        );
    }

    let mut buf = String::new();

    counter(&mut buf, "arena_relay_connections_total", "Total connections accepted since startup", snapshot.connections.total_connections);
    gauge(&mut buf, "arena_relay_connections_active", "Number of currently active connections", snapshot.connections.active_connections);
    counter(&mut buf, "arena_relay_connections_disconnections_total", "Total connection closures observed since startup", snapshot.connections.disconnections);
    counter(&mut buf, "arena_relay_connection_errors_total", "Total connection-level errors observed since startup", snapshot.connections.connection_errors);
    counter(&mut buf, "arena_relay_packets_received_total", "Total packets received across all services", snapshot.connections.packets_received);
    counter(&mut buf, "arena_relay_packets_sent_total", "Total packets sent across all services", snapshot.connections.packets_sent);
    counter(&mut buf, "arena_relay_packets_dropped_total", "Total packets dropped before dispatch", snapshot.connections.packets_dropped);

    counter(&mut buf, "arena_relay_login_attempts_total", "Total login attempts since startup", snapshot.auth.login_attempts);
    counter(&mut buf, "arena_relay_login_successes_total", "Total successful logins since startup", snapshot.auth.login_successes);
    counter(&mut buf, "arena_relay_login_failures_total", "Total failed logins since startup", snapshot.auth.login_failures);
    gauge(&mut buf, "arena_relay_sessions_active", "Number of currently active sessions", snapshot.auth.sessions_active);
    counter(&mut buf, "arena_relay_sessions_expired_total", "Total sessions expired since startup", snapshot.auth.sessions_expired);

    counter(&mut buf, "arena_relay_registrations_total", "Total game-server registrations accepted since startup", snapshot.registry.registrations);
    counter(&mut buf, "arena_relay_registration_failures_total", "Total game-server registration attempts rejected since startup", snapshot.registry.registration_failures);
    counter(&mut buf, "arena_relay_deregistrations_total", "Total game-server deregistrations since startup", snapshot.registry.deregistrations);
    counter(&mut buf, "arena_relay_probe_successes_total", "Total successful liveness probes since startup", snapshot.registry.probe_successes);
    counter(&mut buf, "arena_relay_probe_failures_total", "Total failed liveness probes since startup", snapshot.registry.probe_failures);
    emit_latency_metrics(&mut buf, "arena_relay_probe_latency", "liveness probe", &snapshot.registry.probe_latency);

    counter(&mut buf, "arena_relay_matching_requests_total", "Total matching requests received since startup", snapshot.matching.matching_requests);
    counter(&mut buf, "arena_relay_matching_allocations_total", "Total sessions allocated by the matching engine since startup", snapshot.matching.matching_allocations);
    counter(&mut buf, "arena_relay_matching_fallbacks_total", "Total matching requests satisfied by relaxing constraints", snapshot.matching.matching_fallbacks);
    counter(&mut buf, "arena_relay_matching_exhausted_total", "Total matching requests that found no candidate", snapshot.matching.matching_exhausted);

    counter(&mut buf, "arena_relay_storage_operations_total", "Total storage operations attempted since startup", snapshot.storage.storage_operations);
    counter(&mut buf, "arena_relay_storage_retries_total", "Total storage operation retries since startup", snapshot.storage.storage_retries);
    counter(&mut buf, "arena_relay_storage_failures_total", "Total storage operations that failed after exhausting retries", snapshot.storage.storage_failures);
    counter(&mut buf, "arena_relay_retry_attempts_total", "Total retry attempts across all retrying operations", snapshot.storage.retry_attempts);
    counter(&mut buf, "arena_relay_retry_successes_total", "Total retry attempts that eventually succeeded", snapshot.storage.retry_successes);
    gauge_f64(&mut buf, "arena_relay_retry_success_rate", "Fraction of retry attempts that succeeded", snapshot.storage.retry_success_rate);

    counter(&mut buf, "arena_relay_queries_total", "Total storage-backed queries issued since startup", snapshot.performance.query_count);
    emit_latency_metrics(&mut buf, "arena_relay_storage_latency", "storage", &snapshot.performance.storage_latency);
    counter(&mut buf, "arena_relay_latency_clamped_samples_total", "Latency samples that exceeded the histogram tracking range", snapshot.performance.latency_histogram_clamped_samples);

    counter(&mut buf, "arena_relay_rate_limit_rejections_total", "Total requests rejected by rate limiting", snapshot.rate_limiting.rate_limit_rejections);

    counter(&mut buf, "arena_relay_errors_total", "Total errors encountered since startup", snapshot.errors.total_errors);
    counter(&mut buf, "arena_relay_errors_validation_total", "Total validation errors encountered since startup", snapshot.errors.validation_errors);
    counter(&mut buf, "arena_relay_errors_internal_total", "Total internal errors encountered since startup", snapshot.errors.internal_errors);

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServerMetrics;

    #[tokio::test]
    async fn render_includes_core_counters() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_connections();
        metrics.decrement_active_connections();
        metrics.increment_query_count();
        metrics.increment_rate_limit_rejections();

        let snapshot = metrics.snapshot().await;
        let rendered = render_prometheus_metrics(&snapshot);

        assert!(rendered.contains("arena_relay_connections_total 2"));
        assert!(rendered.contains("arena_relay_connections_active 1"));
        assert!(rendered.contains("arena_relay_rate_limit_rejections_total 1"));
        assert!(rendered.contains("# TYPE arena_relay_queries_total counter"));
        assert!(rendered.contains("arena_relay_probe_latency_samples_total 0"));
    }

    async fn test_state(metrics_auth_token: Option<&str>) -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = crate::storage::create_backend(crate::storage::StorageBackendKind::Filesystem {
            root_dir: dir.path().to_path_buf(),
            disable_cache: false,
        })
        .await
        .unwrap();
        let storage = crate::storage::Storage::new(backend);
        let acl = crate::auth::AclGuard::open();
        let mut config = crate::config::Config::default();
        config.security.require_metrics_auth = true;
        config.security.metrics_auth_token = metrics_auth_token.map(str::to_string);

        let state = Arc::new(AppState::new(
            config,
            storage,
            crate::symbols::SymbolCache::empty(),
            acl,
            Arc::new(ServerMetrics::new()),
        ));
        (state, dir)
    }

    #[tokio::test]
    async fn metrics_auth_missing_header_rejected() {
        let (state, _dir) = test_state(Some("shared-token")).await;
        let headers = HeaderMap::new();
        assert_eq!(
            enforce_metrics_auth(&headers, &state).await.unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn metrics_auth_accepts_matching_token() {
        let (state, _dir) = test_state(Some("shared-token")).await;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer shared-token".parse().unwrap());
        assert!(enforce_metrics_auth(&headers, &state).await.is_ok());
    }

    #[tokio::test]
    async fn metrics_auth_wrong_token_rejected() {
        let (state, _dir) = test_state(Some("shared-token")).await;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer wrong-token".parse().unwrap());
        assert_eq!(
            enforce_metrics_auth(&headers, &state).await.unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn metrics_auth_invalid_scheme_rejected() {
        let (state, _dir) = test_state(Some("some-token")).await;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic some-token".parse().unwrap());
        assert_eq!(
            enforce_metrics_auth(&headers, &state).await.unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }
}
