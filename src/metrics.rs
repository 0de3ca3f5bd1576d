use tracing::{debug, error};

use crate::analysis::{ProbabilityEngine, ProbabilityInputs};
use crate::error::{Error, Result};
use crate::models::SimConfig;
use crate::network::Network;
use crate::sim::SimTime;
use crate::state::{
    ProbabilitySummary, RunMetadata, Sample, ServerOutcome, ServerSnapshot, SimulationResult,
    SimulationTotals,
};
use crate::traffic::TrafficNetwork;

/// Periodic read-only observer of the network and both traffic populations.
pub struct Collector {
    probabilities: ProbabilityEngine,
    processing_power: f64,
    samples: Vec<Sample>,
    last_attack_sample: Option<(SimTime, u64)>,
}

impl Collector {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            probabilities: ProbabilityEngine::new(config),
            processing_power: config.servers.processing_power,
            samples: Vec::new(),
            last_attack_sample: None,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(
        &mut self,
        now: SimTime,
        network: &Network,
        legitimate: &TrafficNetwork,
        botnet: &TrafficNetwork,
    ) -> &Sample {
        let legitimate_totals = legitimate.totals();
        let botnet_totals = botnet.totals();

        let inputs = ProbabilityInputs {
            attack_rate: self.attack_rate(now, botnet),
            memory_utilization: average_cpu_utilization(network),
            successful_malicious_requests: botnet_totals.successful_response,
            current_server_capacity: network.online_servers() as f64 * self.processing_power,
            legitimate_success_rate: legitimate_totals.success_rate(),
        };
        let probabilities = self.probabilities.update(&inputs, now.as_secs());

        let sample = Sample {
            timestamp: now.as_secs(),
            totals: simulation_totals(network),
            legitimate: legitimate_totals,
            botnet: botnet_totals,
            probabilities,
            servers: server_snapshots(network),
        };
        debug!(
            at = %now,
            generated = sample.totals.generated,
            served = sample.totals.served,
            online = network.online_servers(),
            attack_rate = inputs.attack_rate,
            "sample"
        );
        self.samples.push(sample);
        &self.samples[self.samples.len() - 1]
    }

    /// Final accounting. Call after in-flight work has been drained; fails
    /// if any generated request is unaccounted for.
    pub fn finish(
        self,
        metadata: RunMetadata,
        network: &Network,
        legitimate: &TrafficNetwork,
        botnet: &TrafficNetwork,
    ) -> Result<SimulationResult> {
        let totals = simulation_totals(network);
        check_conservation(&totals)?;

        let servers = network
            .servers()
            .iter()
            .map(|server| ServerOutcome {
                server_id: server.server_id().to_string(),
                counters: *server.counters(),
            })
            .collect();

        let probabilities = ProbabilitySummary {
            capacity: *self.probabilities.capacity(),
            averages: self.probabilities.averages(),
            latest: self.probabilities.latest_trend().last().copied(),
        };

        Ok(SimulationResult {
            metadata,
            totals,
            legitimate: legitimate.totals(),
            botnet: botnet.totals(),
            servers,
            probabilities,
            samples: self.samples,
        })
    }

    /// Observed botnet send rate since the previous sample. The first sample
    /// reports the nominal rate.
    fn attack_rate(&mut self, now: SimTime, botnet: &TrafficNetwork) -> f64 {
        if botnet.clients().is_empty() {
            return 0.0;
        }
        let sent = botnet.totals().requests_sent;
        let rate = match self.last_attack_sample {
            None => {
                self.last_attack_sample = Some((now, 0));
                return botnet.nominal_rate();
            }
            Some((at, previous)) => {
                let elapsed = now - at;
                if elapsed > 0.0 {
                    (sent - previous) as f64 / elapsed
                } else {
                    botnet.nominal_rate()
                }
            }
        };
        self.last_attack_sample = Some((now, sent));
        rate
    }
}

pub fn simulation_totals(network: &Network) -> SimulationTotals {
    let mut totals = SimulationTotals {
        generated: network.incoming_request_count(),
        dropped_no_server_available: network.dropped_no_server_available(),
        ..SimulationTotals::default()
    };
    for server in network.servers() {
        let counters = server.counters();
        totals.served += counters.processed;
        totals.dropped_queue_full += counters.dropped_queue_full;
        totals.dropped_high_load += counters.dropped_high_load;
        totals.dropped_offline += counters.dropped_offline;
        totals.dropped_timeout_in_queue += counters.dropped_timeout_in_queue;
        totals.dropped_timeout_awaiting_worker += counters.dropped_timeout_awaiting_worker;
    }
    totals
}

pub fn check_conservation(totals: &SimulationTotals) -> Result<()> {
    if totals.all_accounted_for() {
        return Ok(());
    }
    error!(
        generated = totals.generated,
        accounted = totals.accounted(),
        "request accounting mismatch"
    );
    Err(Error::AccountingMismatch {
        generated: totals.generated,
        accounted: totals.accounted(),
    })
}

fn average_cpu_utilization(network: &Network) -> f64 {
    let servers = network.servers();
    if servers.is_empty() {
        return 0.0;
    }
    servers
        .iter()
        .map(|server| server.cpu_utilization())
        .sum::<f64>()
        / servers.len() as f64
}

fn server_snapshots(network: &Network) -> Vec<ServerSnapshot> {
    network
        .servers()
        .iter()
        .map(|server| ServerSnapshot {
            server_id: server.server_id().to_string(),
            lifecycle: server.lifecycle(),
            cpu_utilization: server.cpu_utilization(),
            queue_utilization: server.queue_utilization(),
            queue_length: server.queue_len(),
            active_workers: server.active_workers(),
            health: server.health(),
            counters: *server.counters(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventQueue, SimContext};
    use crate::models::{Bounds, ServerProfile, TrafficProfile};
    use crate::request::TrafficType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn population(traffic_type: TrafficType, clients: usize, rate: f64) -> TrafficNetwork {
        TrafficNetwork::new(
            traffic_type,
            TrafficProfile {
                clients,
                rate,
                load_size: Bounds::new(1.0, 2.0),
            },
        )
    }

    #[test]
    fn attack_rate_uses_send_deltas_after_first_sample() {
        let mut config = SimConfig::default();
        config.servers.count = 2;
        let mut collector = Collector::new(&config);
        let network = Network::new(2, &config.server_profile());
        let legitimate = population(TrafficType::Legitimate, 1, 1.0);
        let botnet = population(TrafficType::Malicious, 3, 5.0);
        let mut queue = EventQueue::new();
        let mut rng = StdRng::seed_from_u64(2);

        let first = collector.sample(SimTime(0.0), &network, &legitimate, &botnet);
        assert_eq!(first.probabilities.bandwidth_exhaustion, 15.0 / 400.0);

        let mut ctx = SimContext {
            scheduler: &mut queue,
            rng: &mut rng,
        };
        for _ in 0..8 {
            botnet.emit(0, &mut ctx).unwrap();
        }

        assert_eq!(collector.attack_rate(SimTime(2.0), &botnet), 4.0);
        assert_eq!(collector.attack_rate(SimTime(3.0), &botnet), 0.0);
    }

    #[test]
    fn attack_rate_is_zero_without_botnet() {
        let config = SimConfig::default();
        let mut collector = Collector::new(&config);
        let botnet = population(TrafficType::Malicious, 0, 20.0);
        assert_eq!(collector.attack_rate(SimTime(0.0), &botnet), 0.0);
    }

    #[test]
    fn sample_records_server_gauges() {
        let config = SimConfig::default();
        let mut collector = Collector::new(&config);
        let network = Network::new(3, &ServerProfile::default());
        let legitimate = population(TrafficType::Legitimate, 0, 1.0);
        let botnet = population(TrafficType::Malicious, 0, 1.0);

        let sample = collector.sample(SimTime(1.0), &network, &legitimate, &botnet);
        assert_eq!(sample.servers.len(), 3);
        assert_eq!(sample.servers[2].server_id, "server-2");
        assert_eq!(sample.totals, SimulationTotals::default());
        assert_eq!(collector.samples().len(), 1);
    }

    #[test]
    fn conservation_mismatch_is_an_error() {
        let totals = SimulationTotals {
            generated: 5,
            served: 3,
            ..SimulationTotals::default()
        };
        let err = check_conservation(&totals).unwrap_err();
        assert_eq!(
            err.to_string(),
            "discrepancy detected: 5 requests generated vs. 3 requests accounted for"
        );
    }
}
