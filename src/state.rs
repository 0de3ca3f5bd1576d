use serde::Serialize;

use crate::analysis::{AverageProbabilities, ProbabilityMetrics, SystemCapacity};
use crate::server::{Lifecycle, ServerCounters};
use crate::traffic::TrafficTotals;

/// Cluster-wide request accounting at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SimulationTotals {
    pub generated: u64,
    pub served: u64,
    pub dropped_queue_full: u64,
    pub dropped_high_load: u64,
    pub dropped_offline: u64,
    pub dropped_timeout_in_queue: u64,
    pub dropped_timeout_awaiting_worker: u64,
    pub dropped_no_server_available: u64,
}

impl SimulationTotals {
    pub fn dropped_timeout(&self) -> u64 {
        self.dropped_timeout_in_queue + self.dropped_timeout_awaiting_worker
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_queue_full
            + self.dropped_high_load
            + self.dropped_offline
            + self.dropped_timeout()
            + self.dropped_no_server_available
    }

    pub fn accounted(&self) -> u64 {
        self.served + self.dropped()
    }

    pub fn all_accounted_for(&self) -> bool {
        self.accounted() == self.generated
    }

    pub fn success_rate(&self) -> f64 {
        self.served as f64 / self.generated.max(1) as f64
    }

    pub fn drop_rate(&self) -> f64 {
        self.dropped() as f64 / self.generated.max(1) as f64
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServerSnapshot {
    pub server_id: String,
    pub lifecycle: Lifecycle,
    pub cpu_utilization: f64,
    pub queue_utilization: f64,
    pub queue_length: usize,
    pub active_workers: usize,
    pub health: f64,
    pub counters: ServerCounters,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: f64,
    pub totals: SimulationTotals,
    pub legitimate: TrafficTotals,
    pub botnet: TrafficTotals,
    pub probabilities: ProbabilityMetrics,
    pub servers: Vec<ServerSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServerOutcome {
    pub server_id: String,
    pub counters: ServerCounters,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunMetadata {
    pub seed: u64,
    pub duration: f64,
    pub servers: usize,
    pub legitimate_clients: usize,
    pub malicious_clients: usize,
    pub report_interval: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProbabilitySummary {
    pub capacity: SystemCapacity,
    pub averages: AverageProbabilities,
    pub latest: Option<ProbabilityMetrics>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationResult {
    pub metadata: RunMetadata,
    pub totals: SimulationTotals,
    pub legitimate: TrafficTotals,
    pub botnet: TrafficTotals,
    pub servers: Vec<ServerOutcome>,
    pub probabilities: ProbabilitySummary,
    pub samples: Vec<Sample>,
}

impl SimulationResult {
    /// Samples whose timestamp falls on a multiple of `interval`.
    pub fn interval_samples(&self, interval: f64) -> Vec<&Sample> {
        if interval <= 0.0 {
            return self.samples.iter().take(1).collect();
        }
        let on_interval: Vec<&Sample> = self
            .samples
            .iter()
            .filter(|sample| {
                let offset = sample.timestamp % interval;
                offset.abs() < 1e-6 || (interval - offset).abs() < 1e-6
            })
            .collect();
        if on_interval.is_empty() {
            return self.samples.iter().take(1).collect();
        }
        on_interval
    }
}
