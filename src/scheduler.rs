use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};
use tokio_util::sync::CancellationToken;
use anyhow::Result;

pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval_ms: u64) -> Result<Self> {
        if interval_ms == 0 {
            return Err(anyhow::anyhow!("probe interval must be greater than zero"));
        }
        Ok(Self {
            interval: Duration::from_millis(interval_ms),
        })
    }

    /// job: async closure for each tick, until `cancel` fires. Jobs still
    /// running at that point are awaited before returning.
    pub async fn run<J, F>(&self, cancel: CancellationToken, mut job: J) -> Result<()>
    where
        J: FnMut() -> F + Send + 'static,
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut running: Vec<JoinHandle<()>> = Vec::new();
        let mut next = Instant::now();
        loop {
            next += self.interval;
            running.retain(|handle| !handle.is_finished());
            // spawn job so next tick unaffected by job duration
            running.push(tokio::spawn(job()));
            tokio::select! {
                _ = sleep_until(next) => {}
                _ = cancel.cancelled() => break,
            }
        }

        debug!("scheduler stopping, waiting on {} running jobs", running.len());
        for handle in running {
            if let Err(e) = handle.await {
                warn!("scheduled job failed: {:?}", e);
            }
        }
        Ok(())
    }
}
