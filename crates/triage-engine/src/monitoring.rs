//! Monitoring events

use metrics::{counter, histogram};
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use triage_core::error::Result;
use triage_core::models::{ResolutionPath, SourceFlags, TriageResult, UrgencyLevel};

/// One completed triage request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageEvent {
    /// End-to-end latency
    pub latency: Duration,
    /// Resolved urgency
    pub urgency: UrgencyLevel,
    /// Path taken
    pub resolution: ResolutionPath,
    /// Sources that answered
    pub sources: SourceFlags,
}

impl TriageEvent {
    /// Event for a finished result
    pub fn new(result: &TriageResult, latency: Duration) -> Self {
        Self {
            latency,
            urgency: result.urgency_level,
            resolution: result.resolution,
            sources: result.sources,
        }
    }

    /// Anything short of full synthesis with every source answering
    pub fn degraded(&self) -> bool {
        self.resolution != ResolutionPath::FullSynthesis
            || !self.sources.knowledge
            || !self.sources.graph
    }
}

/// Receives one event per triage request
pub trait MonitoringSink: Send + Sync {
    /// Record the event
    fn record(&self, event: &TriageEvent) -> Result<()>;
}

/// Publishes events through the `metrics` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsMonitor;

impl MonitoringSink for MetricsMonitor {
    fn record(&self, event: &TriageEvent) -> Result<()> {
        let resolution = match event.resolution {
            ResolutionPath::FullSynthesis => "full_synthesis",
            ResolutionPath::EvidenceFallback => "evidence_fallback",
            ResolutionPath::SafeDefault => "safe_default",
        };

        counter!(
            "triage_requests_total",
            "urgency" => event.urgency.as_str(),
            "resolution" => resolution
        )
        .increment(1);
        histogram!("triage_request_duration_seconds").record(event.latency.as_secs_f64());

        if event.degraded() {
            counter!("triage_degraded_total", "resolution" => resolution).increment(1);
        }
        for (source, ok) in [
            ("knowledge", event.sources.knowledge),
            ("graph", event.sources.graph),
            ("reasoning", event.sources.reasoning),
        ] {
            if !ok {
                counter!("triage_source_failures_total", "source" => source).increment(1);
            }
        }
        Ok(())
    }
}

/// Writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMonitor;

impl MonitoringSink for LogMonitor {
    fn record(&self, event: &TriageEvent) -> Result<()> {
        info!(
            latency_ms = event.latency.as_millis() as u64,
            urgency = %event.urgency,
            resolution = ?event.resolution,
            degraded = event.degraded(),
            "triage completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(resolution: ResolutionPath, sources: SourceFlags) -> TriageEvent {
        TriageEvent {
            latency: Duration::from_millis(42),
            urgency: UrgencyLevel::Emergency,
            resolution,
            sources,
        }
    }

    #[test]
    fn test_degraded() {
        let all = SourceFlags {
            knowledge: true,
            graph: true,
            reasoning: true,
        };
        assert!(!event(ResolutionPath::FullSynthesis, all).degraded());
        assert!(event(ResolutionPath::EvidenceFallback, all).degraded());

        let no_graph = SourceFlags { graph: false, ..all };
        assert!(event(ResolutionPath::FullSynthesis, no_graph).degraded());
    }

    #[test]
    fn test_sinks_accept_events() {
        let e = event(ResolutionPath::SafeDefault, SourceFlags::default());
        assert!(MetricsMonitor.record(&e).is_ok());
        assert!(LogMonitor.record(&e).is_ok());
    }
}
