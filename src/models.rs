use serde::{Deserialize, Deserializer, Serialize};

use crate::request::TrafficType;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated seconds to run.
    pub duration: f64,
    /// Collector sampling period.
    pub sample_interval: f64,
    /// Spacing of the interval reports in human output.
    pub report_interval: f64,
    pub seed: Option<u64>,
    pub servers: ServerConfig,
    pub health: HealthConfig,
    pub thresholds: UtilizationThresholds,
    pub admission: AdmissionConfig,
    #[serde(deserialize_with = "legitimate_profile")]
    pub legitimate: TrafficProfile,
    #[serde(deserialize_with = "malicious_profile")]
    pub malicious: TrafficProfile,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub count: usize,
    /// Load units processed per second by one worker.
    pub processing_power: f64,
    pub max_concurrent: usize,
    pub max_queue_length: usize,
    pub request_timeout: f64,
    pub server_timeout: f64,
    pub timeout_jitter: Bounds,
    /// Queue utilization a shut-down server must drain below before
    /// returning online.
    pub offline_clear_threshold: f64,
    pub recovery_cpu_utilization: f64,
    /// Queue slots below capacity at which the near-full trigger fires.
    /// Zero disables it.
    pub near_full_margin: usize,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    pub cpu_weight: f64,
    pub queue_weight: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct UtilizationThresholds {
    pub increased: f64,
    pub high: f64,
    pub critical: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub high_utilization_rejection_rate: f64,
    pub shutdown_on_full_probability: f64,
    pub shutdown_near_full_probability: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrafficProfile {
    pub clients: usize,
    /// Requests per second per client.
    pub rate: f64,
    pub load_size: Bounds,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration: 120.0,
            sample_interval: 1.0,
            report_interval: 30.0,
            seed: None,
            servers: ServerConfig::default(),
            health: HealthConfig::default(),
            thresholds: UtilizationThresholds::default(),
            admission: AdmissionConfig::default(),
            legitimate: TrafficProfile::for_type(TrafficType::Legitimate),
            malicious: TrafficProfile::for_type(TrafficType::Malicious),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            count: 10,
            processing_power: 200.0,
            max_concurrent: 20,
            max_queue_length: 500,
            request_timeout: 10.0,
            server_timeout: 2.0,
            timeout_jitter: Bounds::new(-0.5, 2.0),
            offline_clear_threshold: 0.6,
            recovery_cpu_utilization: 0.1,
            near_full_margin: 2,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cpu_weight: 0.4,
            queue_weight: 0.6,
        }
    }
}

impl Default for UtilizationThresholds {
    fn default() -> Self {
        Self {
            increased: 0.70,
            high: 0.85,
            critical: 0.95,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            high_utilization_rejection_rate: 0.2,
            shutdown_on_full_probability: 0.8,
            shutdown_near_full_probability: 0.3,
        }
    }
}

impl TrafficProfile {
    pub fn for_type(traffic_type: TrafficType) -> Self {
        match traffic_type {
            TrafficType::Legitimate => Self {
                clients: 500,
                rate: 2.0,
                load_size: Bounds::new(1.0, 3.0),
            },
            TrafficType::Malicious => Self {
                clients: 100,
                rate: 20.0,
                load_size: Bounds::new(10.0, 25.0),
            },
        }
    }

    pub fn mean_load(&self) -> f64 {
        (self.load_size.lower + self.load_size.upper) / 2.0
    }
}

/// Partial traffic section; missing keys fall back to the defaults of the
/// traffic type the section belongs to.
#[derive(Deserialize)]
struct TrafficOverrides {
    clients: Option<usize>,
    rate: Option<f64>,
    load_size: Option<Bounds>,
}

impl TrafficOverrides {
    fn apply(self, base: TrafficProfile) -> TrafficProfile {
        TrafficProfile {
            clients: self.clients.unwrap_or(base.clients),
            rate: self.rate.unwrap_or(base.rate),
            load_size: self.load_size.unwrap_or(base.load_size),
        }
    }
}

fn legitimate_profile<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<TrafficProfile, D::Error> {
    TrafficOverrides::deserialize(deserializer)
        .map(|overrides| overrides.apply(TrafficProfile::for_type(TrafficType::Legitimate)))
}

fn malicious_profile<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<TrafficProfile, D::Error> {
    TrafficOverrides::deserialize(deserializer)
        .map(|overrides| overrides.apply(TrafficProfile::for_type(TrafficType::Malicious)))
}

impl SimConfig {
    /// Per-server settings as seen by one `Server`.
    pub fn server_profile(&self) -> ServerProfile {
        ServerProfile {
            server: self.servers.clone(),
            health: self.health,
            thresholds: self.thresholds,
            admission: self.admission,
        }
    }
}

/// Everything a single server needs from the configuration.
#[derive(Clone, Debug)]
pub struct ServerProfile {
    pub server: ServerConfig,
    pub health: HealthConfig,
    pub thresholds: UtilizationThresholds,
    pub admission: AdmissionConfig,
}

impl Default for ServerProfile {
    fn default() -> Self {
        SimConfig::default().server_profile()
    }
}
