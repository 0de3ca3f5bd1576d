use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::error::InvariantViolation;
use crate::sim::SimTime;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
pub enum TrafficType {
    Legitimate,
    Malicious,
}

impl fmt::Display for TrafficType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrafficType::Legitimate => write!(f, "Legitimate"),
            TrafficType::Malicious => write!(f, "Malicious"),
        }
    }
}

/// Terminal classification of a request that was not served.
#[derive(Clone, Copy, Debug, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    QueueFull,
    HighLoad,
    Offline,
    TimeoutInQueue,
    TimeoutAwaitingWorker,
    NoServerAvailable,
}

impl DropReason {
    pub const ALL: [DropReason; 6] = [
        DropReason::QueueFull,
        DropReason::HighLoad,
        DropReason::Offline,
        DropReason::TimeoutInQueue,
        DropReason::TimeoutAwaitingWorker,
        DropReason::NoServerAvailable,
    ];
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DropReason::QueueFull => "queue full",
            DropReason::HighLoad => "high load",
            DropReason::Offline => "server offline",
            DropReason::TimeoutInQueue => "timeout in queue",
            DropReason::TimeoutAwaitingWorker => "timeout awaiting worker",
            DropReason::NoServerAvailable => "no server available",
        };
        write!(f, "{}", label)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Served,
    Dropped(DropReason),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Served)
    }
}

/// Receives the terminal outcome of every request it is attached to.
pub trait OutcomeListener {
    fn notify(&self, request: &Request, outcome: Outcome);
}

/// One unit of work. Identity fields are write-once.
pub struct Request {
    source_id: String,
    traffic_type: TrafficType,
    load_size: f64,
    request_id: Option<u64>,
    arrival_time: Option<SimTime>,
    served_time: Option<SimTime>,
    seen_by: Option<String>,
    is_served: bool,
    is_routed: bool,
    on_completion: Option<Rc<dyn OutcomeListener>>,
}

impl Request {
    pub fn new(source_id: impl Into<String>, traffic_type: TrafficType, load_size: f64) -> Self {
        Self {
            source_id: source_id.into(),
            traffic_type,
            load_size,
            request_id: None,
            arrival_time: None,
            served_time: None,
            seen_by: None,
            is_served: false,
            is_routed: false,
            on_completion: None,
        }
    }

    pub fn with_listener(mut self, listener: Rc<dyn OutcomeListener>) -> Self {
        self.on_completion = Some(listener);
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn traffic_type(&self) -> TrafficType {
        self.traffic_type
    }

    pub fn load_size(&self) -> f64 {
        self.load_size
    }

    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }

    pub fn arrival_time(&self) -> Option<SimTime> {
        self.arrival_time
    }

    pub fn served_time(&self) -> Option<SimTime> {
        self.served_time
    }

    pub fn seen_by(&self) -> Option<&str> {
        self.seen_by.as_deref()
    }

    pub fn is_served(&self) -> bool {
        self.is_served
    }

    pub fn is_routed(&self) -> bool {
        self.is_routed
    }

    pub fn set_request_id(&mut self, id: u64) -> Result<(), InvariantViolation> {
        let request_id = self.request_id;
        set_once(&mut self.request_id, id, "request_id", request_id)
    }

    pub fn set_arrival_time(&mut self, at: SimTime) -> Result<(), InvariantViolation> {
        set_once(&mut self.arrival_time, at, "arrival_time", self.request_id)
    }

    pub fn set_served_time(&mut self, at: SimTime) -> Result<(), InvariantViolation> {
        set_once(&mut self.served_time, at, "served_time", self.request_id)
    }

    pub fn set_seen_by(&mut self, server_id: impl Into<String>) -> Result<(), InvariantViolation> {
        set_once(
            &mut self.seen_by,
            server_id.into(),
            "seen_by",
            self.request_id,
        )
    }

    pub fn mark_routed(&mut self) -> Result<(), InvariantViolation> {
        if self.is_routed {
            return Err(InvariantViolation::AlreadyRouted {
                request_id: self.request_id,
            });
        }
        self.is_routed = true;
        Ok(())
    }

    /// Marks the request served and notifies the listener with success.
    pub fn mark_served(&mut self) -> Result<(), InvariantViolation> {
        if self.is_served {
            return Err(InvariantViolation::AlreadyServed {
                request_id: self.request_id,
            });
        }
        self.is_served = true;
        self.notify(Outcome::Served);
        Ok(())
    }

    /// Notifies the listener of a drop. Has no effect once served.
    pub fn mark_failed(&self, reason: DropReason) {
        if !self.is_served {
            self.notify(Outcome::Dropped(reason));
        }
    }

    fn notify(&self, outcome: Outcome) {
        if let Some(listener) = &self.on_completion {
            listener.notify(self, outcome);
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_id", &self.request_id)
            .field("source_id", &self.source_id)
            .field("traffic_type", &self.traffic_type)
            .field("load_size", &self.load_size)
            .field("arrival_time", &self.arrival_time)
            .field("served_time", &self.served_time)
            .field("seen_by", &self.seen_by)
            .field("is_routed", &self.is_routed)
            .field("is_served", &self.is_served)
            .finish()
    }
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    field: &'static str,
    request_id: Option<u64>,
) -> Result<(), InvariantViolation> {
    if slot.is_some() {
        return Err(InvariantViolation::FieldAlreadySet { field, request_id });
    }
    *slot = Some(value);
    Ok(())
}
