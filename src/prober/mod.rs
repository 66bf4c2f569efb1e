//! Concurrent reachability probing.
//!
//! A [`Prober`] expands hosts x ports into targets, probes each target once on
//! a bounded pool of tokio tasks and folds the outcomes back into a
//! [`Report`] in input order, whatever order the probes finish in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{ConfigError, ProbeError};
use crate::metrics::ProbeMetrics;
use crate::report::{FailureKind, ProbeResult, Report};
use crate::target::Target;

pub mod tcp_connect;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Upper bound for a single target, resolution included.
    pub timeout: Duration,
    /// Maximum number of simultaneous connection attempts.
    pub concurrency: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ProbeOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::ConcurrencyTooLarge(self.concurrency));
        }
        Ok(())
    }
}

pub struct Prober {
    options: ProbeOptions,
    metrics: Arc<ProbeMetrics>,
}

impl Prober {
    pub fn new(options: ProbeOptions, metrics: Arc<ProbeMetrics>) -> Self {
        Self { options, metrics }
    }

    pub fn options(&self) -> ProbeOptions {
        self.options
    }

    pub fn metrics(&self) -> &Arc<ProbeMetrics> {
        &self.metrics
    }

    pub async fn probe(&self, hosts: &[String], ports: &[u16]) -> Result<Report, ProbeError> {
        self.probe_until(hosts, ports, &CancellationToken::new()).await
    }

    /// Like [`Prober::probe`], but stops early once `cancel` fires. In-flight
    /// probes are aborted and the report keeps only finished pairs, with
    /// `cancelled` set.
    pub async fn probe_until(
        &self,
        hosts: &[String],
        ports: &[u16],
        cancel: &CancellationToken,
    ) -> Result<Report, ProbeError> {
        self.options.validate()?;
        let targets = Target::cross(hosts, ports)?;

        info!(
            hosts = hosts.len(),
            ports = ports.len(),
            timeout_ms = self.options.timeout.as_millis() as u64,
            concurrency = self.options.concurrency,
            "starting probe run"
        );

        // no point holding more permits than there are targets
        let pool_size = self.options.concurrency.min(targets.len()).max(1);
        let permits = Arc::new(Semaphore::new(pool_size));
        let mut tasks = JoinSet::new();
        let mut slot_of = HashMap::with_capacity(targets.len());

        for (idx, target) in targets.iter().cloned().enumerate() {
            let permits = permits.clone();
            let metrics = self.metrics.clone();
            let limit = self.options.timeout;

            let handle = tasks.spawn(async move {
                // The semaphore is never closed while tasks are running.
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (idx, ProbeResult::failed(target, FailureKind::Dial, "worker pool closed"));
                };
                metrics.record_attempt();
                let result = tcp_connect::probe_tcp(&target, limit).await;
                metrics.record(&result);
                (idx, result)
            });
            slot_of.insert(handle.id(), idx);
        }

        let mut slots: Vec<Option<ProbeResult>> = vec![None; targets.len()];
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => {
                    warn!("probe run cancelled, abandoning {} in-flight probes", tasks.len());
                    cancelled = true;
                    tasks.abort_all();
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((idx, result))) => slots[idx] = Some(result),
                    // aborted by cancellation; the pair stays unfinished
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => {
                        error!("probe task failed: {:?}", e);
                        if let Some(&idx) = slot_of.get(&e.id()) {
                            slots[idx] = Some(self.task_failed(&targets[idx], &e));
                        }
                    }
                }
            }
        }

        let report = Report::assemble(hosts, ports.len(), slots, cancelled);
        info!(
            results = report.len(),
            reachable = report.results().filter(|r| r.reachable).count(),
            cancelled,
            "probe run finished"
        );
        Ok(report)
    }

    /// Result for a pair whose task died; counted like any other dial failure.
    fn task_failed(&self, target: &Target, reason: &dyn std::fmt::Display) -> ProbeResult {
        let result = ProbeResult::failed(
            target.clone(),
            FailureKind::Dial,
            format!("probe task failed: {}", reason),
        );
        self.metrics.record(&result);
        result
    }
}

/// Probe every host x port pair once with default concurrency and a fresh
/// metrics registry.
pub async fn probe(hosts: &[String], ports: &[u16], timeout: Duration) -> Result<Report, ProbeError> {
    let options = ProbeOptions {
        timeout,
        ..ProbeOptions::default()
    };
    options.validate()?;

    let metrics = Arc::new(ProbeMetrics::new(false)?);
    Prober::new(options, metrics).probe(hosts, ports).await
}
