use std::fmt::Write;

use crate::error::{Error, Result};
use crate::models::SimConfig;
use crate::request::DropReason;
use crate::state::{Sample, SimulationResult, SimulationTotals};
use crate::traffic::TrafficTotals;

const RULE: &str = "==================================================";

pub trait Formatter {
    fn write(&self, result: &SimulationResult) -> String;
}

/// Interval reports, probability analysis, per-server outcomes and final
/// totals.
pub struct HumanFormatter;

/// Final totals only.
pub struct SummaryFormatter;

pub struct JsonFormatter;

impl Formatter for HumanFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        let mut out = String::new();
        let meta = &result.metadata;
        let _ = writeln!(
            out,
            "Simulation: {} servers, {} legitimate clients, {} malicious clients, {:.1}s, seed {}",
            meta.servers, meta.legitimate_clients, meta.malicious_clients, meta.duration, meta.seed
        );

        for sample in result.interval_samples(meta.report_interval) {
            write_interval(&mut out, sample);
        }

        write_probability_analysis(&mut out, result);
        write_server_outcomes(&mut out, result);
        write_final_outcomes(&mut out, &result.totals);
        out
    }
}

impl Formatter for SummaryFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        let mut out = String::new();
        write_final_outcomes(&mut out, &result.totals);
        out
    }
}

impl Formatter for JsonFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        match serde_json::to_string_pretty(result) {
            Ok(json) => format!("{}\n", json),
            Err(err) => format!("{{\"error\": \"{}\"}}\n", err),
        }
    }
}

/// Resolved configuration as TOML, loadable again with `--config`.
pub fn render_config(config: &SimConfig) -> Result<String> {
    toml::to_string_pretty(config)
        .map_err(|err| Error::ConfigParse(format!("failed to render TOML: {}", err)))
}

fn write_interval(out: &mut String, sample: &Sample) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "METRICS AT TIME: {:.1}", sample.timestamp);
    let _ = writeln!(out, "{}", RULE);

    let totals = &sample.totals;
    let _ = writeln!(out, "SIMULATION OVERVIEW:");
    let _ = writeln!(out, "  Total Generated: {}", totals.generated);
    let _ = writeln!(out, "  Total Served: {}", totals.served);
    write_drops(out, totals, "  ");
    let _ = writeln!(out, "  Success Rate: {:.2}%", totals.success_rate() * 100.0);
    let _ = writeln!(out, "  Drop Rate: {:.2}%", totals.drop_rate() * 100.0);

    let p = &sample.probabilities;
    let _ = writeln!(out, "DDoS ATTACK PROBABILITIES:");
    let _ = writeln!(
        out,
        "  Bandwidth Exhaustion: {:.4}",
        p.bandwidth_exhaustion
    );
    let _ = writeln!(
        out,
        "  Victim Resource Depletion: {:.4}",
        p.victim_resource_depletion
    );
    let _ = writeln!(out, "  Successful Attack: {:.4}", p.successful_attack);

    write_traffic(out, "LEGITIMATE TRAFFIC", &sample.legitimate);
    write_traffic(out, "BOTNET TRAFFIC", &sample.botnet);

    let _ = writeln!(out, "SERVER STATUS:");
    for server in &sample.servers {
        let _ = writeln!(
            out,
            "  {}: {:?}, cpu {:.2}, queue {} ({:.2}), workers {}, health {:.3}",
            server.server_id,
            server.lifecycle,
            server.cpu_utilization,
            server.queue_length,
            server.queue_utilization,
            server.active_workers,
            server.health
        );
    }
}

fn write_traffic(out: &mut String, title: &str, totals: &TrafficTotals) {
    let _ = writeln!(out, "{}:", title);
    let _ = writeln!(out, "  Requests Sent: {}", totals.requests_sent);
    let _ = writeln!(out, "  Successful Responses: {}", totals.successful_response);
    let _ = writeln!(out, "  No Response: {}", totals.no_response);
    let _ = writeln!(out, "  Success Rate: {:.2}%", totals.success_rate() * 100.0);
}

fn write_probability_analysis(out: &mut String, result: &SimulationResult) {
    let summary = &result.probabilities;
    let capacity = &summary.capacity;
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "DDoS PROBABILITY ANALYSIS");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "System Capacity Info:");
    let _ = writeln!(
        out,
        "  Total Processing Capacity: {:.1}",
        capacity.total_processing_capacity
    );
    let _ = writeln!(
        out,
        "  Total Concurrent Capacity: {}",
        capacity.total_concurrent_capacity
    );
    let _ = writeln!(out, "  Max Queue Capacity: {}", capacity.max_queue_capacity);
    let _ = writeln!(out, "  Capacity Threshold: {}", capacity.capacity_threshold);
    let _ = writeln!(
        out,
        "  Max System Capacity: {}",
        capacity.max_system_capacity
    );

    let averages = &summary.averages;
    let _ = writeln!(out, "Average Probabilities:");
    let _ = writeln!(
        out,
        "  Bandwidth Exhaustion: {:.4}",
        averages.bandwidth_exhaustion
    );
    let _ = writeln!(
        out,
        "  Victim Resource Depletion: {:.4}",
        averages.victim_resource_depletion
    );
    let _ = writeln!(
        out,
        "  Successful Attack: {:.4}",
        averages.successful_attack
    );

    if let Some(latest) = &summary.latest {
        let _ = writeln!(out, "Latest ({:.1}s):", latest.timestamp);
        let _ = writeln!(
            out,
            "  Bandwidth Exhaustion: {:.4}",
            latest.bandwidth_exhaustion
        );
        let _ = writeln!(
            out,
            "  Victim Resource Depletion: {:.4}",
            latest.victim_resource_depletion
        );
        let _ = writeln!(
            out,
            "  Successful Attack: {:.4}",
            latest.successful_attack
        );
    }
}

fn write_server_outcomes(out: &mut String, result: &SimulationResult) {
    let _ = writeln!(out);
    let _ = writeln!(out, "SERVER OUTCOMES:");
    for server in &result.servers {
        let counters = &server.counters;
        let _ = writeln!(
            out,
            "  {}: received {}, processed {}, dropped {}, shutdowns {}",
            server.server_id,
            counters.received,
            counters.processed,
            counters.dropped_total(),
            counters.shutdowns
        );
    }
}

fn write_final_outcomes(out: &mut String, totals: &SimulationTotals) {
    let _ = writeln!(out, "FINAL SIMULATION OUTCOMES:");
    let _ = writeln!(out, "Total Requests Generated: {}", totals.generated);
    let _ = writeln!(out, "Total Served Requests: {}", totals.served);
    write_drops(out, totals, "");
    let _ = writeln!(
        out,
        "All Requests Accounted For: {}",
        totals.all_accounted_for()
    );
}

fn write_drops(out: &mut String, totals: &SimulationTotals, indent: &str) {
    for reason in DropReason::ALL {
        let _ = writeln!(
            out,
            "{}Total Drops ({}): {}",
            indent,
            reason,
            drops_for(totals, reason)
        );
    }
}

fn drops_for(totals: &SimulationTotals, reason: DropReason) -> u64 {
    match reason {
        DropReason::QueueFull => totals.dropped_queue_full,
        DropReason::HighLoad => totals.dropped_high_load,
        DropReason::Offline => totals.dropped_offline,
        DropReason::TimeoutInQueue => totals.dropped_timeout_in_queue,
        DropReason::TimeoutAwaitingWorker => totals.dropped_timeout_awaiting_worker,
        DropReason::NoServerAvailable => totals.dropped_no_server_available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AverageProbabilities, SystemCapacity};
    use crate::state::{ProbabilitySummary, RunMetadata};

    fn result() -> SimulationResult {
        let config = SimConfig::default();
        SimulationResult {
            metadata: RunMetadata {
                seed: 7,
                duration: 10.0,
                servers: 2,
                legitimate_clients: 4,
                malicious_clients: 1,
                report_interval: 5.0,
            },
            totals: SimulationTotals {
                generated: 12,
                served: 9,
                dropped_queue_full: 2,
                dropped_no_server_available: 1,
                ..SimulationTotals::default()
            },
            legitimate: TrafficTotals {
                requests_sent: 10,
                successful_response: 9,
                no_response: 1,
            },
            botnet: TrafficTotals {
                requests_sent: 2,
                successful_response: 0,
                no_response: 2,
            },
            servers: Vec::new(),
            probabilities: ProbabilitySummary {
                capacity: SystemCapacity::from_config(&config),
                averages: AverageProbabilities::default(),
                latest: None,
            },
            samples: Vec::new(),
        }
    }

    #[test]
    fn summary_lists_final_outcomes() {
        let expected = concat!(
            "FINAL SIMULATION OUTCOMES:\n",
            "Total Requests Generated: 12\n",
            "Total Served Requests: 9\n",
            "Total Drops (queue full): 2\n",
            "Total Drops (high load): 0\n",
            "Total Drops (server offline): 0\n",
            "Total Drops (timeout in queue): 0\n",
            "Total Drops (timeout awaiting worker): 0\n",
            "Total Drops (no server available): 1\n",
            "All Requests Accounted For: true\n",
        );
        assert_eq!(SummaryFormatter.write(&result()), expected);
    }

    #[test]
    fn human_output_ends_with_final_outcomes() {
        let output = HumanFormatter.write(&result());
        assert!(output.starts_with("Simulation: 2 servers, 4 legitimate clients"));
        assert!(output.contains("DDoS PROBABILITY ANALYSIS"));
        assert!(output.ends_with("All Requests Accounted For: true\n"));
    }

    #[test]
    fn json_output_is_parseable() {
        let output = JsonFormatter.write(&result());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["totals"]["generated"], 12);
        assert_eq!(value["metadata"]["seed"], 7);
    }

    #[test]
    fn rendered_config_loads_back() {
        let mut config = SimConfig::default();
        config.seed = Some(11);
        config.servers.count = 4;
        let rendered = render_config(&config).unwrap();
        let parsed: SimConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.seed, Some(11));
        assert_eq!(parsed.servers.count, 4);
        assert_eq!(parsed.malicious.load_size, config.malicious.load_size);
    }
}
