use serde::Serialize;

use crate::models::{SimConfig, UtilizationThresholds};

/// Legitimate success rate expected from an unattacked cluster.
pub const IDEALIZED_SUCCESS_NO_ATTACK: f64 = 0.85;

const CRITICAL_BASE: f64 = 0.90;
const CRITICAL_SLOPE: f64 = 0.50;
const HIGH_BASE: f64 = 0.70;
const HIGH_PROGRESS: f64 = 0.20;
const INCREASED_BASE: f64 = 0.30;
const INCREASED_PROGRESS: f64 = 0.40;
const NORMAL_MULTIPLIER: f64 = 0.50;

/// Upper bound on the number of terms summed for bandwidth exhaustion.
const MAX_SYSTEM_CAPACITY_CAP: u64 = 1000;
const DEFAULT_TREND_WINDOW: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProbabilityMetrics {
    pub timestamp: f64,
    pub bandwidth_exhaustion: f64,
    pub victim_resource_depletion: f64,
    pub successful_attack: f64,
}

/// Snapshot of the cluster handed to [`ProbabilityEngine::update`].
#[derive(Clone, Copy, Debug)]
pub struct ProbabilityInputs {
    pub attack_rate: f64,
    pub memory_utilization: f64,
    pub successful_malicious_requests: u64,
    pub current_server_capacity: f64,
    pub legitimate_success_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SystemCapacity {
    pub total_processing_capacity: f64,
    pub total_concurrent_capacity: u64,
    pub max_queue_capacity: u64,
    pub capacity_threshold: u64,
    pub max_system_capacity: u64,
}

impl SystemCapacity {
    pub fn from_config(config: &SimConfig) -> Self {
        let count = config.servers.count as u64;
        let total_processing_capacity = config.servers.processing_power * count as f64;
        let total_concurrent_capacity = config.servers.max_concurrent as u64 * count;
        let max_queue_capacity = config.servers.max_queue_length as u64 * count;

        Self {
            total_processing_capacity,
            total_concurrent_capacity,
            max_queue_capacity,
            capacity_threshold: (total_processing_capacity * 0.8) as u64,
            max_system_capacity: (total_concurrent_capacity + max_queue_capacity)
                .min(MAX_SYSTEM_CAPACITY_CAP),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AverageProbabilities {
    pub bandwidth_exhaustion: f64,
    pub victim_resource_depletion: f64,
    pub successful_attack: f64,
}

/// Analytic risk scores computed alongside the simulation, kept as a history.
#[derive(Clone, Debug)]
pub struct ProbabilityEngine {
    capacity: SystemCapacity,
    thresholds: UtilizationThresholds,
    history: Vec<ProbabilityMetrics>,
}

impl ProbabilityEngine {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            capacity: SystemCapacity::from_config(config),
            thresholds: config.thresholds,
            history: Vec::new(),
        }
    }

    pub fn capacity(&self) -> &SystemCapacity {
        &self.capacity
    }

    pub fn history(&self) -> &[ProbabilityMetrics] {
        &self.history
    }

    /// Erlang-style blocking ratio `a^c / Σ_{i=0..=e} a^i / i!`.
    ///
    /// Falls back to `attack_rate / total_processing_capacity` when any
    /// intermediate value leaves the finite range of `f64`.
    pub fn bandwidth_exhaustion(&self, attack_rate: f64, legitimate_success_rate: f64) -> f64 {
        if attack_rate <= 0.0 {
            return 0.0;
        }
        let c = self.capacity.capacity_threshold;
        if c == 0 {
            return 1.0;
        }

        match erlang_ratio(attack_rate, c, self.capacity.max_system_capacity) {
            Some(mut probability) => {
                if legitimate_success_rate > 0.2 {
                    probability *= 0.8;
                }
                probability.clamp(0.0, 1.0)
            }
            None => (attack_rate / self.capacity.total_processing_capacity).clamp(0.0, 1.0),
        }
    }

    /// Piecewise-linear exhaustion risk keyed on the utilization thresholds.
    pub fn memory_exhaustion(&self, utilization: f64) -> f64 {
        let t = &self.thresholds;
        if utilization >= t.critical {
            CRITICAL_BASE + (utilization - t.critical) * CRITICAL_SLOPE
        } else if utilization >= t.high {
            let progress = (utilization - t.high) / (t.critical - t.high);
            HIGH_BASE + progress * HIGH_PROGRESS
        } else if utilization >= t.increased {
            let progress = (utilization - t.increased) / (t.high - t.increased);
            INCREASED_BASE + progress * INCREASED_PROGRESS
        } else {
            (utilization * NORMAL_MULTIPLIER).max(0.0)
        }
    }

    pub fn victim_resource_depletion(
        &self,
        bandwidth: f64,
        memory: f64,
        legitimate_success_rate: f64,
    ) -> f64 {
        let base = 1.0 - (1.0 - bandwidth) * (1.0 - memory);
        (base * (1.0 - legitimate_success_rate)).min(1.0)
    }

    /// Degradation of legitimate service relative to the unattacked baseline.
    pub fn successful_attack(
        &self,
        legitimate_success_rate: f64,
        simulation_time: f64,
        current_server_capacity: f64,
    ) -> f64 {
        if simulation_time <= 0.0 {
            return 0.0;
        }
        if current_server_capacity <= 0.0 {
            return 1.0;
        }
        let degradation = ((IDEALIZED_SUCCESS_NO_ATTACK - legitimate_success_rate)
            / IDEALIZED_SUCCESS_NO_ATTACK)
            .max(0.0);
        degradation.min(1.0)
    }

    pub fn update(&mut self, inputs: &ProbabilityInputs, now: f64) -> ProbabilityMetrics {
        let bandwidth = self.bandwidth_exhaustion(inputs.attack_rate, inputs.legitimate_success_rate);
        let memory = self.memory_exhaustion(inputs.memory_utilization);
        let metrics = ProbabilityMetrics {
            timestamp: now,
            bandwidth_exhaustion: bandwidth,
            victim_resource_depletion: self.victim_resource_depletion(
                bandwidth,
                memory,
                inputs.legitimate_success_rate,
            ),
            successful_attack: self.successful_attack(
                inputs.legitimate_success_rate,
                now,
                inputs.current_server_capacity,
            ),
        };
        self.history.push(metrics);
        metrics
    }

    pub fn averages(&self) -> AverageProbabilities {
        if self.history.is_empty() {
            return AverageProbabilities::default();
        }
        let count = self.history.len() as f64;
        let mut averages = AverageProbabilities::default();
        for metrics in &self.history {
            averages.bandwidth_exhaustion += metrics.bandwidth_exhaustion;
            averages.victim_resource_depletion += metrics.victim_resource_depletion;
            averages.successful_attack += metrics.successful_attack;
        }
        averages.bandwidth_exhaustion /= count;
        averages.victim_resource_depletion /= count;
        averages.successful_attack /= count;
        averages
    }

    /// The most recent `window` entries, oldest first.
    pub fn trend(&self, window: usize) -> &[ProbabilityMetrics] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    pub fn latest_trend(&self) -> &[ProbabilityMetrics] {
        self.trend(DEFAULT_TREND_WINDOW)
    }
}

fn erlang_ratio(a: f64, c: u64, e: u64) -> Option<f64> {
    let numerator = a.powf(c as f64);
    if !numerator.is_finite() {
        return None;
    }

    let mut denominator = 0.0;
    let mut factorial = 1.0_f64;
    for i in 0..=e {
        if i > 0 {
            factorial *= i as f64;
        }
        let power = a.powf(i as f64);
        if !factorial.is_finite() || !power.is_finite() {
            return None;
        }
        let term = power / factorial;
        denominator += term;
        if term < 1e-15 && i > c {
            break;
        }
    }

    if denominator == 0.0 {
        return Some(1.0);
    }
    Some(numerator / denominator)
}
