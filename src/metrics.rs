use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Comprehensive metrics collection for the relay server (spec §10.5).
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub connection_errors: AtomicU64,

    // Per-service packet counters, keyed by service name at call sites
    pub packets_received: AtomicU64,
    pub packets_sent: AtomicU64,
    pub packets_dropped: AtomicU64,

    // Login / auth metrics
    pub login_attempts: AtomicU64,
    pub login_successes: AtomicU64,
    pub login_failures: AtomicU64,
    pub sessions_active: AtomicU64,
    pub sessions_expired: AtomicU64,

    // Game-server registry metrics
    pub registrations: AtomicU64,
    pub registration_failures: AtomicU64,
    pub deregistrations: AtomicU64,
    pub probe_successes: AtomicU64,
    pub probe_failures: AtomicU64,
    pub probe_latency_us: Arc<RwLock<ResponseTimeTracker>>,

    // Matching metrics
    pub matching_requests: AtomicU64,
    pub matching_allocations: AtomicU64,
    pub matching_fallbacks: AtomicU64,
    pub matching_exhausted: AtomicU64,

    // Storage metrics
    pub storage_operations: AtomicU64,
    pub storage_retries: AtomicU64,
    pub storage_failures: AtomicU64,
    pub retry_attempts: AtomicU64,
    pub retry_successes: AtomicU64,

    // Rate limiting metrics
    pub rate_limit_rejections: AtomicU64,

    // Performance metrics
    pub query_count: AtomicU64,
    pub average_response_times: Arc<RwLock<ResponseTimeTracker>>,
    pub latency_histogram_clamped_samples: AtomicU64,

    // Error tracking
    pub validation_errors: AtomicU64,
    pub internal_errors: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct ResponseTimeTracker {
    operations: HashMap<String, OperationLatencyHistogram>,
    lowest_discernible_micros: u64,
    highest_trackable_micros: u64,
    significant_figures: u8,
}

const DEFAULT_LOWEST_DISCERNIBLE_MICROS: u64 = 1;
const DEFAULT_HIGHEST_TRACKABLE_MICROS: u64 = 300_000_000; // 5 minutes in microseconds
const DEFAULT_SIGNIFICANT_FIGURES: u8 = 3;

#[derive(Debug, Clone)]
struct OperationLatencyHistogram {
    /// None if all creation attempts failed (should be rare)
    histogram: Option<Histogram<u64>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub auth: AuthMetrics,
    pub registry: RegistryMetrics,
    pub matching: MatchingMetrics,
    pub storage: StorageMetrics,
    pub performance: PerformanceMetrics,
    pub rate_limiting: RateLimitingMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub connection_errors: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
    pub packets_dropped: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthMetrics {
    pub login_attempts: u64,
    pub login_successes: u64,
    pub login_failures: u64,
    pub sessions_active: u64,
    pub sessions_expired: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryMetrics {
    pub registrations: u64,
    pub registration_failures: u64,
    pub deregistrations: u64,
    pub probe_successes: u64,
    pub probe_failures: u64,
    pub probe_latency: OperationLatencyMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchingMetrics {
    pub matching_requests: u64,
    pub matching_allocations: u64,
    pub matching_fallbacks: u64,
    pub matching_exhausted: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageMetrics {
    pub storage_operations: u64,
    pub storage_retries: u64,
    pub storage_failures: u64,
    pub retry_attempts: u64,
    pub retry_successes: u64,
    pub retry_success_rate: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceMetrics {
    pub query_count: u64,
    pub storage_latency: OperationLatencyMetrics,
    pub latency_histogram_clamped_samples: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct OperationLatencyMetrics {
    pub average_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub sample_count: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitingMetrics {
    pub rate_limit_rejections: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorMetrics {
    pub validation_errors: u64,
    pub internal_errors: u64,
    pub total_errors: u64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            login_attempts: AtomicU64::new(0),
            login_successes: AtomicU64::new(0),
            login_failures: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_expired: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            registration_failures: AtomicU64::new(0),
            deregistrations: AtomicU64::new(0),
            probe_successes: AtomicU64::new(0),
            probe_failures: AtomicU64::new(0),
            probe_latency_us: Arc::new(RwLock::new(ResponseTimeTracker::new())),
            matching_requests: AtomicU64::new(0),
            matching_allocations: AtomicU64::new(0),
            matching_fallbacks: AtomicU64::new(0),
            matching_exhausted: AtomicU64::new(0),
            storage_operations: AtomicU64::new(0),
            storage_retries: AtomicU64::new(0),
            storage_failures: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            retry_successes: AtomicU64::new(0),
            rate_limit_rejections: AtomicU64::new(0),
            query_count: AtomicU64::new(0),
            average_response_times: Arc::new(RwLock::new(ResponseTimeTracker::new())),
            latency_histogram_clamped_samples: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
        }
    }

    // Connection metrics
    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        let _ =
            self.active_connections
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                    if current > 0 {
                        Some(current - 1)
                    } else {
                        None
                    }
                });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connection_errors(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_packets_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_packets_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_packets_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Login / auth metrics
    pub fn increment_login_attempts(&self) {
        self.login_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_login_successes(&self) {
        self.login_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_login_failures(&self) {
        self.login_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sessions_active(&self) {
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_sessions_active(&self) {
        let _ = self
            .sessions_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                if current > 0 {
                    Some(current - 1)
                } else {
                    None
                }
            });
    }

    pub fn increment_sessions_expired(&self) {
        self.sessions_expired.fetch_add(1, Ordering::Relaxed);
    }

    // Registry metrics
    pub fn increment_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_registration_failures(&self) {
        self.registration_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deregistrations(&self) {
        self.deregistrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_probe_successes(&self) {
        self.probe_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_probe_failures(&self) {
        self.probe_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_probe_latency(&self, duration: Duration) {
        let mut tracker = self.probe_latency_us.write().await;
        let clamped = tracker.add_sample("udp_probe", duration);
        drop(tracker);
        if clamped {
            self.increment_latency_histogram_clamps();
        }
    }

    // Matching metrics
    pub fn increment_matching_requests(&self) {
        self.matching_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matching_allocations(&self) {
        self.matching_allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matching_fallbacks(&self) {
        self.matching_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matching_exhausted(&self) {
        self.matching_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    // Storage metrics
    pub fn increment_storage_operations(&self) {
        self.storage_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_storage_retries(&self) {
        self.storage_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_storage_failures(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_attempts(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_successes(&self) {
        self.retry_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_storage_latency(&self, duration: Duration) {
        let mut tracker = self.average_response_times.write().await;
        let clamped = tracker.add_sample("storage", duration);
        drop(tracker);
        if clamped {
            self.increment_latency_histogram_clamps();
        }
    }

    pub fn increment_latency_histogram_clamps(&self) {
        self.latency_histogram_clamped_samples
            .fetch_add(1, Ordering::Relaxed);
    }

    // Rate limiting metrics
    pub fn increment_rate_limit_rejections(&self) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    // Performance metrics
    pub fn increment_query_count(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    pub fn increment_validation_errors(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let tracker = self.average_response_times.read().await;
        let storage_latency = tracker.get_latency_metrics("storage").unwrap_or_default();
        drop(tracker);

        let probe_tracker = self.probe_latency_us.read().await;
        let probe_latency = probe_tracker
            .get_latency_metrics("udp_probe")
            .unwrap_or_default();
        drop(probe_tracker);

        let retry_attempts = self.retry_attempts.load(Ordering::Relaxed);
        let retry_successes = self.retry_successes.load(Ordering::Relaxed);
        let retry_success_rate = if retry_attempts > 0 {
            (retry_successes as f64) / (retry_attempts as f64)
        } else {
            1.0
        };

        let validation_errors = self.validation_errors.load(Ordering::Relaxed);
        let internal_errors = self.internal_errors.load(Ordering::Relaxed);
        let total_errors = validation_errors + internal_errors;

        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: self.total_connections.load(Ordering::Relaxed),
                active_connections: self.active_connections.load(Ordering::Relaxed),
                disconnections: self.disconnections.load(Ordering::Relaxed),
                connection_errors: self.connection_errors.load(Ordering::Relaxed),
                packets_received: self.packets_received.load(Ordering::Relaxed),
                packets_sent: self.packets_sent.load(Ordering::Relaxed),
                packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            },
            auth: AuthMetrics {
                login_attempts: self.login_attempts.load(Ordering::Relaxed),
                login_successes: self.login_successes.load(Ordering::Relaxed),
                login_failures: self.login_failures.load(Ordering::Relaxed),
                sessions_active: self.sessions_active.load(Ordering::Relaxed),
                sessions_expired: self.sessions_expired.load(Ordering::Relaxed),
            },
            registry: RegistryMetrics {
                registrations: self.registrations.load(Ordering::Relaxed),
                registration_failures: self.registration_failures.load(Ordering::Relaxed),
                deregistrations: self.deregistrations.load(Ordering::Relaxed),
                probe_successes: self.probe_successes.load(Ordering::Relaxed),
                probe_failures: self.probe_failures.load(Ordering::Relaxed),
                probe_latency,
            },
            matching: MatchingMetrics {
                matching_requests: self.matching_requests.load(Ordering::Relaxed),
                matching_allocations: self.matching_allocations.load(Ordering::Relaxed),
                matching_fallbacks: self.matching_fallbacks.load(Ordering::Relaxed),
                matching_exhausted: self.matching_exhausted.load(Ordering::Relaxed),
            },
            storage: StorageMetrics {
                storage_operations: self.storage_operations.load(Ordering::Relaxed),
                storage_retries: self.storage_retries.load(Ordering::Relaxed),
                storage_failures: self.storage_failures.load(Ordering::Relaxed),
                retry_attempts,
                retry_successes,
                retry_success_rate,
            },
            performance: PerformanceMetrics {
                query_count: self.query_count.load(Ordering::Relaxed),
                storage_latency,
                latency_histogram_clamped_samples: self
                    .latency_histogram_clamped_samples
                    .load(Ordering::Relaxed),
            },
            rate_limiting: RateLimitingMetrics {
                rate_limit_rejections: self.rate_limit_rejections.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                validation_errors,
                internal_errors,
                total_errors,
            },
        }
    }

    /// Human-readable health status derived from current counters.
    pub async fn health_status(&self) -> HealthStatus {
        let snapshot = self.snapshot().await;

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        let total_registrations = snapshot.registry.registrations;
        if total_registrations > 0 {
            let failure_rate =
                (snapshot.registry.registration_failures as f64) / (total_registrations as f64);
            if failure_rate > 0.2 {
                issues.push(format!(
                    "High registration failure rate: {:.1}%",
                    failure_rate * 100.0
                ));
            } else if failure_rate > 0.05 {
                warnings.push(format!(
                    "Elevated registration failure rate: {:.1}%",
                    failure_rate * 100.0
                ));
            }
        }

        if snapshot.storage.retry_success_rate < 0.9 && snapshot.storage.retry_attempts > 0 {
            warnings.push(format!(
                "Storage retry issues: {:.1}% success rate",
                snapshot.storage.retry_success_rate * 100.0
            ));
        }

        if snapshot.matching.matching_exhausted > 0 {
            warnings.push(format!(
                "Matching requests exhausted candidates: {}",
                snapshot.matching.matching_exhausted
            ));
        }

        let status = if !issues.is_empty() {
            HealthStatusLevel::Unhealthy
        } else if !warnings.is_empty() {
            HealthStatusLevel::Degraded
        } else {
            HealthStatusLevel::Healthy
        };

        HealthStatus {
            status,
            issues,
            warnings,
            metrics: snapshot,
        }
    }
}

impl Default for ResponseTimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseTimeTracker {
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
            lowest_discernible_micros: DEFAULT_LOWEST_DISCERNIBLE_MICROS,
            highest_trackable_micros: DEFAULT_HIGHEST_TRACKABLE_MICROS,
            significant_figures: DEFAULT_SIGNIFICANT_FIGURES,
        }
    }

    #[cfg(test)]
    pub fn with_bounds(
        lowest_discernible_micros: u64,
        highest_trackable_micros: u64,
        significant_figures: u8,
    ) -> Self {
        Self {
            operations: HashMap::new(),
            lowest_discernible_micros: lowest_discernible_micros.max(1),
            highest_trackable_micros: highest_trackable_micros
                .max(lowest_discernible_micros.max(1)),
            significant_figures: significant_figures.clamp(1, 5),
        }
    }

    pub fn add_sample(&mut self, operation: &str, duration: Duration) -> bool {
        let micros = duration_to_micros(duration);
        let lowest = self.lowest_discernible_micros;
        let highest = self.highest_trackable_micros;
        let significant = self.significant_figures;
        let histogram = self
            .operations
            .entry(operation.to_string())
            .or_insert_with(|| OperationLatencyHistogram::new(lowest, highest, significant));

        histogram.record(micros, highest)
    }

    #[allow(dead_code)]
    pub fn get_average(&self, operation: &str) -> Option<f64> {
        self.get_latency_metrics(operation)
            .and_then(|metrics| metrics.average_ms)
    }

    pub fn get_latency_metrics(&self, operation: &str) -> Option<OperationLatencyMetrics> {
        let histogram = self.operations.get(operation)?;
        histogram.metrics()
    }
}

impl OperationLatencyHistogram {
    fn new(
        lowest_discernible_micros: u64,
        highest_trackable_micros: u64,
        significant_figures: u8,
    ) -> Self {
        let lowest = lowest_discernible_micros.max(1);
        let highest = highest_trackable_micros.max(lowest);
        let sig_figs = significant_figures.clamp(1, 5);

        let histogram = Histogram::new_with_bounds(lowest, highest, sig_figs)
            .or_else(|e| {
                tracing::warn!(
                    target: "metrics",
                    error = %e,
                    lowest,
                    highest,
                    sig_figs,
                    "Failed to create histogram with requested bounds, using unbounded fallback"
                );
                Histogram::new(2)
            })
            .or_else(|_| {
                tracing::error!(target: "metrics", "Histogram::new(2) failed, trying sig_figs=1");
                Histogram::new(1)
            })
            .ok();

        if histogram.is_none() {
            tracing::error!(target: "metrics", "All histogram creation attempts failed - metrics will not be recorded");
        }

        Self { histogram }
    }

    fn record(&mut self, micros: u64, highest_trackable_micros: u64) -> bool {
        let was_clamped = micros > highest_trackable_micros;
        let value = if was_clamped {
            highest_trackable_micros
        } else {
            micros
        };
        if let Some(ref mut histogram) = self.histogram {
            if let Err(error) = histogram.record(value) {
                tracing::warn!(
                    target: "metrics",
                    %error,
                    clamped_value = value,
                    highest_trackable_micros,
                    "failed to record latency sample"
                );
            }
        }
        was_clamped
    }

    fn metrics(&self) -> Option<OperationLatencyMetrics> {
        let histogram = self.histogram.as_ref()?;
        if histogram.is_empty() {
            return None;
        }

        Some(OperationLatencyMetrics {
            average_ms: Some(histogram.mean() / MICROS_PER_MS),
            p50_ms: Some(self.percentile(50.0)),
            p95_ms: Some(self.percentile(95.0)),
            p99_ms: Some(self.percentile(99.0)),
            min_ms: Some(histogram.min() as f64 / MICROS_PER_MS),
            max_ms: Some(histogram.max() as f64 / MICROS_PER_MS),
            sample_count: histogram.len(),
        })
    }

    fn percentile(&self, percentile: f64) -> f64 {
        self.histogram
            .as_ref()
            .map(|h| h.value_at_percentile(percentile) as f64 / MICROS_PER_MS)
            .unwrap_or(0.0)
    }
}

const MICROS_PER_MS: f64 = 1000.0;

fn duration_to_micros(duration: Duration) -> u64 {
    duration.as_micros().min(u128::from(u64::MAX)) as u64
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthStatus {
    pub status: HealthStatusLevel,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum HealthStatusLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Utility for timing an operation and recording it into `ServerMetrics`.
pub struct OperationTimer {
    operation: String,
    start: Instant,
    metrics: Arc<ServerMetrics>,
}

impl OperationTimer {
    pub fn new(operation: &str, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
            metrics,
        }
    }

    #[allow(dead_code)]
    pub async fn finish(self) {
        let duration = self.start.elapsed();
        if self.operation == "udp_probe" {
            self.metrics.record_probe_latency(duration).await;
        } else {
            self.metrics.record_storage_latency(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_decrement_active_connections_no_underflow() {
        let metrics = ServerMetrics::new();

        for _ in 0..10 {
            metrics.decrement_active_connections();
        }

        let value = metrics.active_connections.load(Ordering::Relaxed);
        assert_eq!(
            value, 0,
            "active_connections should remain 0 after decrement from 0, got {value}"
        );
        assert_eq!(metrics.disconnections.load(Ordering::Relaxed), 10);
    }

    #[tokio::test]
    async fn test_decrement_sessions_active_no_underflow() {
        let metrics = ServerMetrics::new();

        for _ in 0..10 {
            metrics.decrement_sessions_active();
        }

        assert_eq!(metrics.sessions_active.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_concurrent_increment_decrement_active_connections() {
        let metrics = Arc::new(ServerMetrics::new());

        let inc_barrier = Arc::new(tokio::sync::Barrier::new(100));
        let mut handles = Vec::with_capacity(100);
        for _ in 0..100 {
            let metrics = Arc::clone(&metrics);
            let barrier = Arc::clone(&inc_barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                metrics.increment_connections();
            }));
        }
        for handle in handles {
            handle.await.expect("increment task should not panic");
        }

        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 100);

        let dec_barrier = Arc::new(tokio::sync::Barrier::new(50));
        let mut handles = Vec::with_capacity(50);
        for _ in 0..50 {
            let metrics = Arc::clone(&metrics);
            let barrier = Arc::clone(&dec_barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                metrics.decrement_active_connections();
            }));
        }
        for handle in handles {
            handle.await.expect("decrement task should not panic");
        }

        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 50);
        assert_eq!(metrics.total_connections.load(Ordering::Relaxed), 100);
    }

    #[tokio::test]
    async fn snapshot_reports_retry_success_rate() {
        let metrics = ServerMetrics::new();
        metrics.increment_retry_attempts();
        metrics.increment_retry_attempts();
        metrics.increment_retry_successes();

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.storage.retry_attempts, 2);
        assert_eq!(snapshot.storage.retry_success_rate, 0.5);
    }
}
