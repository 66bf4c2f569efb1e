use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;
use warp::Filter;

use crate::report::{FailureKind, ProbeResult};

const LATENCY_BUCKETS_MS: &[f64] = &[
    0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
];

/// Probe counters, owned per prober rather than kept in process-wide statics.
pub struct ProbeMetrics {
    registry: Registry,
    attempts: IntCounter,
    failures: IntCounterVec,
    timeouts: IntCounterVec,
    latency: GaugeVec,
    // Optional histogram for latency history - only registered if enabled
    latency_hist: Option<HistogramVec>,
}

impl ProbeMetrics {
    pub fn new(enable_latency_history: bool) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let attempts = IntCounter::new("probe_attempts_total", "Total number of connection attempts")?;
        registry.register(Box::new(attempts.clone()))?;

        let failures = IntCounterVec::new(
            Opts::new("probe_failure_total", "Total number of failed connection attempts"),
            &["target"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        let timeouts = IntCounterVec::new(
            Opts::new("probe_timeout_total", "Total number of probe timeouts"),
            &["target"],
        )?;
        registry.register(Box::new(timeouts.clone()))?;

        let latency = GaugeVec::new(
            Opts::new(
                "probe_latency_milliseconds_current",
                "Current connect latency in milliseconds",
            ),
            &["target"],
        )?;
        registry.register(Box::new(latency.clone()))?;

        let latency_hist = if enable_latency_history {
            let hist = HistogramVec::new(
                HistogramOpts {
                    common_opts: Opts::new("probe_latency_milliseconds", "Connect latency in milliseconds"),
                    buckets: LATENCY_BUCKETS_MS.to_vec(),
                },
                &["target"],
            )?;
            registry.register(Box::new(hist.clone()))?;
            Some(hist)
        } else {
            None
        };

        Ok(Self {
            registry,
            attempts,
            failures,
            timeouts,
            latency,
            latency_hist,
        })
    }

    pub fn record_attempt(&self) {
        self.attempts.inc();
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.get()
    }

    pub fn record(&self, result: &ProbeResult) {
        let target = result.target.to_string();
        match (result.failure, result.latency_ms) {
            (Some(FailureKind::Timeout), _) => self.inc_timeout(&target),
            (Some(FailureKind::Dial), _) => self.failures.with_label_values(&[target.as_str()]).inc(),
            (None, Some(latency_ms)) => self.observe_latency(&target, latency_ms),
            (None, None) => {}
        }
    }

    pub fn observe_latency(&self, target: &str, latency_ms: f64) {
        // Always observe current latency in gauge
        self.latency.with_label_values(&[target]).set(latency_ms);

        if let Some(hist) = &self.latency_hist {
            hist.with_label_values(&[target]).observe(latency_ms);
        }
    }

    pub fn inc_timeout(&self, target: &str) {
        self.timeouts.with_label_values(&[target]).inc();
    }

    /// Prometheus text exposition of everything in this registry.
    pub fn encode(&self) -> prometheus::Result<Vec<u8>> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(buf)
    }
}

pub async fn serve_metrics(metrics: Arc<ProbeMetrics>, addr: SocketAddr) {
    let metrics_route = warp::path!("metrics").map(move || {
        let body = metrics.encode().unwrap_or_else(|e| {
            error!("failed to encode metrics: {:?}", e);
            Vec::new()
        });
        warp::reply::with_header(body, "Content-Type", prometheus::TEXT_FORMAT)
    });

    warp::serve(metrics_route).run(addr).await;
}
