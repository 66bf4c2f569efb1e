pub mod config;
pub mod error;
pub mod metrics;
pub mod prober;
pub mod report;
pub mod scheduler;
pub mod target;

pub use error::{ConfigError, ProbeError};
pub use metrics::ProbeMetrics;
pub use prober::{probe, ProbeOptions, Prober};
pub use report::{FailureKind, HostReport, ProbeResult, Report, Summary};
pub use target::Target;
