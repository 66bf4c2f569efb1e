use reachability_probe::config::{LogFormat, OutputFormat, ProbeConfig};
use reachability_probe::metrics::{self, ProbeMetrics};
use reachability_probe::scheduler::Scheduler;
use reachability_probe::{Prober, Report};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    // Load config first to get log level
    let config = ProbeConfig::load().await?;
    let log_level = config.get_tracing_level()?;

    // Init tracing with configured log level; stdout is reserved for the report
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("reachability_probe={}", log_level.as_str().to_lowercase()).parse()?);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let metrics = Arc::new(ProbeMetrics::new(config.enable_latency_history)?);
    if let Some(addr) = config.metrics_addr {
        info!("serving metrics on http://{}/metrics", addr);
        tokio::spawn(metrics::serve_metrics(metrics.clone(), addr));
    }

    let options = config.probe_options();
    options.validate()?;
    let prober = Arc::new(Prober::new(options, metrics));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping");
                cancel.cancel();
            }
        });
    }

    let hosts = Arc::new(config.hosts.clone());
    let ports = Arc::new(config.ports.clone());
    let output = config.output;

    match config.probe_interval_ms {
        None => {
            let report = prober.probe_until(&hosts, &ports, &cancel).await?;
            print_report(&report, output)?;
        }
        Some(interval_ms) => {
            let scheduler = Scheduler::new(interval_ms)?;
            let job_cancel = cancel.clone();
            scheduler.run(cancel, move || {
                let prober = prober.clone();
                let hosts = hosts.clone();
                let ports = ports.clone();
                let cancel = job_cancel.clone();
                async move {
                    match prober.probe_until(&hosts, &ports, &cancel).await {
                        Ok(report) => {
                            if let Err(e) = print_report(&report, output) {
                                error!("failed to print report: {:?}", e);
                            }
                        }
                        Err(e) => error!("probe run failed: {:?}", e),
                    }
                }
            }).await?;
        }
    }

    Ok(())
}

fn print_report(report: &Report, output: OutputFormat) -> anyhow::Result<()> {
    let json = match output {
        OutputFormat::Summary => serde_json::to_string_pretty(&report.summary())?,
        OutputFormat::Detailed => serde_json::to_string_pretty(report)?,
    };
    println!("{}", json);
    Ok(())
}
