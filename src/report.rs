use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::target::Target;

pub const CONNECTED: &str = "Successfully connected!";
pub const FAILED: &str = "Failed to connect!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Refused, unresolvable, unreachable, or any other non-timeout error.
    Dial,
    Timeout,
}

/// Outcome of probing a single target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(flatten)]
    pub target: Target,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl ProbeResult {
    pub fn connected(target: Target, latency: Duration) -> Self {
        Self {
            target,
            reachable: true,
            failure: None,
            error: None,
            latency_ms: Some(latency.as_secs_f64() * 1000.0),
        }
    }

    pub fn failed(target: Target, kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            target,
            reachable: false,
            failure: Some(kind),
            error: Some(error.into()),
            latency_ms: None,
        }
    }

    pub fn timed_out(target: Target) -> Self {
        Self::failed(target, FailureKind::Timeout, "timeout")
    }

    pub fn response(&self) -> &'static str {
        if self.reachable { CONNECTED } else { FAILED }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostReport {
    pub host: String,
    pub results: Vec<ProbeResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub hosts: Vec<HostReport>,
    /// Set when the run was cancelled; unfinished pairs are missing from their group.
    #[serde(default)]
    pub cancelled: bool,
}

impl Report {
    /// Group host-major slots back under their hosts. `None` slots are pairs
    /// that never finished and are left out.
    pub fn assemble(
        hosts: &[String],
        ports_per_host: usize,
        slots: Vec<Option<ProbeResult>>,
        cancelled: bool,
    ) -> Self {
        let mut slots = slots.into_iter();
        let hosts = hosts
            .iter()
            .map(|host| HostReport {
                host: host.clone(),
                results: slots.by_ref().take(ports_per_host).flatten().collect(),
            })
            .collect();

        Self { hosts, cancelled }
    }

    pub fn results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.hosts.iter().flat_map(|h| h.results.iter())
    }

    pub fn len(&self) -> usize {
        self.hosts.iter().map(|h| h.results.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Legacy `{"websites": [...]}` rendering.
    pub fn summary(&self) -> Summary {
        Summary {
            websites: self
                .hosts
                .iter()
                .map(|h| Website {
                    host_name: h.host.clone(),
                    ports: h
                        .results
                        .iter()
                        .map(|r| PortSummary {
                            port_number: r.target.port,
                            response: r.response().to_string(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub websites: Vec<Website>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub host_name: String,
    pub ports: Vec<PortSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSummary {
    pub port_number: u16,
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(host: &str, port: u16) -> Option<ProbeResult> {
        Some(ProbeResult::connected(
            Target::new(host, port),
            Duration::from_millis(2),
        ))
    }

    fn refused(host: &str, port: u16) -> Option<ProbeResult> {
        Some(ProbeResult::failed(
            Target::new(host, port),
            FailureKind::Dial,
            "connection refused",
        ))
    }

    #[test]
    fn assemble_groups_in_input_order() {
        let hosts = vec!["a".to_string(), "b".to_string()];
        let slots = vec![ok("a", 443), refused("a", 22), refused("b", 443), ok("b", 22)];

        let report = Report::assemble(&hosts, 2, slots, false);

        assert_eq!(report.hosts.len(), 2);
        assert_eq!(report.len(), 4);
        assert_eq!(report.hosts[0].host, "a");
        assert_eq!(report.hosts[1].results[0].target, Target::new("b", 443));
        assert!(report.hosts[1].results[1].reachable);
    }

    #[test]
    fn assemble_without_ports_keeps_host_groups() {
        let hosts = vec!["a".to_string(), "b".to_string()];
        let report = Report::assemble(&hosts, 0, Vec::new(), false);

        assert_eq!(report.hosts.len(), 2);
        assert!(report.is_empty());
    }

    #[test]
    fn assemble_skips_unfinished_slots() {
        let hosts = vec!["a".to_string(), "b".to_string()];
        let slots = vec![ok("a", 1), None, None, refused("b", 2)];

        let report = Report::assemble(&hosts, 2, slots, true);

        assert!(report.cancelled);
        assert_eq!(report.hosts[0].results.len(), 1);
        assert_eq!(report.hosts[1].results.len(), 1);
        assert_eq!(report.hosts[1].results[0].target.port, 2);
    }

    #[test]
    fn summary_matches_legacy_shape() {
        let hosts = vec!["google.com".to_string()];
        let report = Report::assemble(&hosts, 2, vec![ok("google.com", 443), refused("google.com", 22)], false);

        let value = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(
            value,
            json!({
                "websites": [{
                    "host_name": "google.com",
                    "ports": [
                        { "port_number": 443, "response": "Successfully connected!" },
                        { "port_number": 22, "response": "Failed to connect!" }
                    ]
                }]
            })
        );
    }

    #[test]
    fn detailed_result_serialization() {
        let timed_out = ProbeResult::timed_out(Target::new("10.0.0.1", 80));
        let value = serde_json::to_value(&timed_out).unwrap();
        assert_eq!(
            value,
            json!({
                "host": "10.0.0.1",
                "port": 80,
                "reachable": false,
                "failure": "timeout",
                "error": "timeout"
            })
        );
    }
}
