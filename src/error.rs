use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("server count must be greater than 0")]
    NoServers,
    #[error("{field} must be greater than 0 (got {value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must be between 0.0 and 1.0 (got {value})")]
    OutOfUnitRange { field: &'static str, value: f64 },
    #[error("cpu and queue health weights must total 1.0 (got {0:.3})")]
    HealthWeights(f64),
    #[error(
        "utilization thresholds must satisfy increased < high < critical <= 1.0 (got {increased}, {high}, {critical})"
    )]
    ThresholdOrder {
        increased: f64,
        high: f64,
        critical: f64,
    },
    #[error("{field} lower bound ({lower}) cannot be greater than upper bound ({upper})")]
    InvertedBounds {
        field: &'static str,
        lower: f64,
        upper: f64,
    },
    #[error("near_full_margin ({margin}) must be smaller than max_queue_length ({max})")]
    NearFullMargin { margin: usize, max: usize },
    #[error("server_timeout plus minimum jitter must be greater than 0 (got {0})")]
    ShutdownDelay(f64),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error("discrepancy detected: {generated} requests generated vs. {accounted} requests accounted for")]
    AccountingMismatch { generated: u64, accounted: u64 },
    #[error("{0}")]
    ConfigIo(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("unsupported config format '{0}'")]
    UnsupportedConfigFormat(String),
    #[error("{0}")]
    Cli(String),
}

/// Broken accounting contracts. These are never simulation outcomes; any of
/// them aborts the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("request {}: field '{field}' assigned twice", request_label(.request_id))]
    FieldAlreadySet {
        field: &'static str,
        request_id: Option<u64>,
    },
    #[error("request {}: field '{field}' was never assigned", request_label(.request_id))]
    MissingField {
        field: &'static str,
        request_id: Option<u64>,
    },
    #[error("request {} is already routed", request_label(.request_id))]
    AlreadyRouted { request_id: Option<u64> },
    #[error("request {} is already served", request_label(.request_id))]
    AlreadyServed { request_id: Option<u64> },
    #[error("server {server}: worker {worker} is not {expected}")]
    WorkerState {
        server: String,
        worker: usize,
        expected: &'static str,
    },
    #[error("no server at index {0}")]
    UnknownServer(usize),
    #[error("no {traffic} client at index {client}")]
    UnknownClient { traffic: String, client: usize },
}

fn request_label(request_id: &Option<u64>) -> String {
    match request_id {
        Some(id) => format!("#{}", id),
        None => "#?".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_messages_name_the_request() {
        let err = InvariantViolation::FieldAlreadySet {
            field: "arrival_time",
            request_id: Some(7),
        };
        assert_eq!(
            err.to_string(),
            "request #7: field 'arrival_time' assigned twice"
        );

        let err = InvariantViolation::AlreadyRouted { request_id: None };
        assert_eq!(err.to_string(), "request #? is already routed");
    }

    #[test]
    fn invariant_converts_into_error() {
        let err: Error = InvariantViolation::AlreadyServed {
            request_id: Some(3),
        }
        .into();
        assert_eq!(err.to_string(), "request #3 is already served");
    }
}
