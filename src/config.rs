use std::fs;
use std::path::Path;
use tracing::warn;

use crate::cli::ConfigArgs;
use crate::error::{Error, Result};
use crate::models::{Bounds, SimConfig, TrafficProfile};

pub fn load_config(path: &Path) -> Result<SimConfig> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigIo(format!(
            "failed to read config '{}': {}",
            path.display(),
            err
        ))
    })?;
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("");

    match ext {
        "toml" => toml::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse TOML: {}", err))),
        "json" => serde_json::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse JSON: {}", err))),
        "" => Err(Error::UnsupportedConfigFormat("unknown".to_string())),
        _ => Err(Error::UnsupportedConfigFormat(ext.to_string())),
    }
}

/// Resolves file settings and command-line overrides into a validated config.
pub fn build_config(args: &ConfigArgs) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SimConfig::default(),
    };

    if let Some(servers) = args.servers {
        config.servers.count = servers;
    }
    if let Some(duration) = args.duration {
        config.duration = duration;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(clients) = args.legit_clients {
        config.legitimate.clients = clients;
    }
    if let Some(clients) = args.bot_clients {
        config.malicious.clients = clients;
    }

    validate(&config)?;
    warn_outside_recommended(&config);
    Ok(config)
}

/// Hard constraints. A config that fails these cannot be simulated.
pub fn validate(config: &SimConfig) -> Result<()> {
    positive("duration", config.duration)?;
    positive("sample_interval", config.sample_interval)?;
    positive("report_interval", config.report_interval)?;

    let servers = &config.servers;
    if servers.count == 0 {
        return Err(Error::NoServers);
    }
    positive("servers.processing_power", servers.processing_power)?;
    positive("servers.max_concurrent", servers.max_concurrent as f64)?;
    positive("servers.max_queue_length", servers.max_queue_length as f64)?;
    positive("servers.request_timeout", servers.request_timeout)?;
    positive("servers.server_timeout", servers.server_timeout)?;
    ordered("servers.timeout_jitter", servers.timeout_jitter)?;
    let shortest_shutdown = servers.server_timeout + servers.timeout_jitter.lower;
    if shortest_shutdown <= 0.0 {
        return Err(Error::ShutdownDelay(shortest_shutdown));
    }
    unit("servers.offline_clear_threshold", servers.offline_clear_threshold)?;
    unit(
        "servers.recovery_cpu_utilization",
        servers.recovery_cpu_utilization,
    )?;
    if servers.near_full_margin >= servers.max_queue_length {
        return Err(Error::NearFullMargin {
            margin: servers.near_full_margin,
            max: servers.max_queue_length,
        });
    }

    let health = &config.health;
    unit("health.cpu_weight", health.cpu_weight)?;
    unit("health.queue_weight", health.queue_weight)?;
    let weight_sum = health.cpu_weight + health.queue_weight;
    if (weight_sum - 1.0).abs() > 0.001 {
        return Err(Error::HealthWeights(weight_sum));
    }

    let t = &config.thresholds;
    if !(0.0 < t.increased && t.increased < t.high && t.high < t.critical && t.critical <= 1.0) {
        return Err(Error::ThresholdOrder {
            increased: t.increased,
            high: t.high,
            critical: t.critical,
        });
    }

    let admission = &config.admission;
    unit(
        "admission.high_utilization_rejection_rate",
        admission.high_utilization_rejection_rate,
    )?;
    unit(
        "admission.shutdown_on_full_probability",
        admission.shutdown_on_full_probability,
    )?;
    unit(
        "admission.shutdown_near_full_probability",
        admission.shutdown_near_full_probability,
    )?;

    traffic(
        "legitimate.rate",
        "legitimate.load_size",
        &config.legitimate,
    )?;
    traffic("malicious.rate", "malicious.load_size", &config.malicious)?;
    Ok(())
}

/// Operating ranges the model was calibrated for. Values outside them are
/// allowed but logged.
pub fn warn_outside_recommended(config: &SimConfig) -> usize {
    let checks = [
        ("duration", config.duration, 60.0, 1800.0),
        ("servers.count", config.servers.count as f64, 5.0, 50.0),
        (
            "servers.request_timeout",
            config.servers.request_timeout,
            5.0,
            30.0,
        ),
        (
            "servers.server_timeout",
            config.servers.server_timeout,
            1.0,
            10.0,
        ),
        (
            "servers.processing_power",
            config.servers.processing_power,
            100.0,
            500.0,
        ),
        (
            "servers.max_concurrent",
            config.servers.max_concurrent as f64,
            10.0,
            50.0,
        ),
        (
            "servers.max_queue_length",
            config.servers.max_queue_length as f64,
            100.0,
            1000.0,
        ),
        ("thresholds.increased", config.thresholds.increased, 0.70, 0.80),
        ("thresholds.high", config.thresholds.high, 0.81, 0.90),
        ("thresholds.critical", config.thresholds.critical, 0.91, 1.0),
        ("legitimate.rate", config.legitimate.rate, 1.0, 5.0),
        (
            "legitimate.clients",
            config.legitimate.clients as f64,
            100.0,
            2000.0,
        ),
        ("malicious.rate", config.malicious.rate, 10.0, 50.0),
        (
            "malicious.clients",
            config.malicious.clients as f64,
            50.0,
            500.0,
        ),
    ];

    let mut warnings = 0;
    for (field, value, low, high) in checks {
        if !(low..=high).contains(&value) {
            warn!(field, value, low, high, "outside recommended range");
            warnings += 1;
        }
    }

    let malicious_mean = config.malicious.mean_load();
    let legitimate_mean = config.legitimate.mean_load();
    if malicious_mean <= legitimate_mean {
        warn!(
            malicious_mean,
            legitimate_mean, "average malicious load is not above average legitimate load"
        );
        warnings += 1;
    }
    warnings
}

fn positive(field: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::NonPositive { field, value })
    }
}

fn unit(field: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::OutOfUnitRange { field, value })
    }
}

fn ordered(field: &'static str, bounds: Bounds) -> Result<()> {
    if bounds.lower <= bounds.upper {
        Ok(())
    } else {
        Err(Error::InvertedBounds {
            field,
            lower: bounds.lower,
            upper: bounds.upper,
        })
    }
}

fn traffic(rate: &'static str, load: &'static str, profile: &TrafficProfile) -> Result<()> {
    positive(rate, profile.rate)?;
    positive(load, profile.load_size.lower)?;
    ordered(load, profile.load_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flood-sim-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_are_valid_and_in_range() {
        let config = SimConfig::default();
        validate(&config).unwrap();
        assert_eq!(warn_outside_recommended(&config), 0);
    }

    #[test]
    fn overrides_apply_on_top_of_file() {
        let path = write_temp(
            "overrides.toml",
            "duration = 300.0\nseed = 1\n[servers]\ncount = 4\n",
        );
        let args = ConfigArgs {
            config: Some(path),
            servers: Some(6),
            seed: Some(42),
            bot_clients: Some(0),
            ..ConfigArgs::default()
        };

        let config = build_config(&args).unwrap();
        assert_eq!(config.duration, 300.0);
        assert_eq!(config.servers.count, 6);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.malicious.clients, 0);
        assert_eq!(config.legitimate.clients, 500);
    }

    #[test]
    fn json_config_is_supported() {
        let path = write_temp(
            "sim.json",
            r#"{ "duration": 90.0, "legitimate": { "rate": 3.0 } }"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.duration, 90.0);
        assert_eq!(config.legitimate.rate, 3.0);
        assert_eq!(config.legitimate.clients, 500);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let path = write_temp("sim.yaml", "duration: 10");
        let err = load_config(&path).unwrap_err();
        assert_eq!(err.to_string(), "unsupported config format 'yaml'");
    }

    #[test]
    fn zero_servers_is_rejected() {
        let args = ConfigArgs {
            servers: Some(0),
            ..ConfigArgs::default()
        };
        let err = build_config(&args).unwrap_err();
        assert_eq!(err.to_string(), "server count must be greater than 0");
    }

    #[test]
    fn health_weights_must_sum_to_one() {
        let mut config = SimConfig::default();
        config.health.cpu_weight = 0.5;
        let err = validate(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cpu and queue health weights must total 1.0 (got 1.100)"
        );
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let mut config = SimConfig::default();
        config.thresholds.high = 0.6;
        assert!(matches!(
            validate(&config),
            Err(Error::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn inverted_load_bounds_are_rejected() {
        let mut config = SimConfig::default();
        config.malicious.load_size = Bounds::new(30.0, 10.0);
        let err = validate(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malicious.load_size lower bound (30) cannot be greater than upper bound (10)"
        );
    }

    #[test]
    fn shutdown_delay_must_stay_positive() {
        let mut config = SimConfig::default();
        config.servers.server_timeout = 0.4;
        assert!(matches!(validate(&config), Err(Error::ShutdownDelay(_))));
    }

    #[test]
    fn out_of_range_values_only_warn() {
        let mut config = SimConfig::default();
        config.servers.count = 2;
        config.malicious.clients = 0;
        validate(&config).unwrap();
        assert_eq!(warn_outside_recommended(&config), 2);
    }
}
