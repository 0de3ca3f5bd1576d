use rand::RngCore;

use crate::request::TrafficType;
use crate::sim::{EventKey, Prioritized, Scheduler};

/// Wake-ups for one server's logical processes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerEvent {
    /// A worker received an item from the queue.
    Resume { worker: usize },
    /// The slot branch of a worker's race won.
    SlotGranted { worker: usize },
    /// The timeout branch of a worker's race fired.
    SlotTimeout { worker: usize },
    ServiceComplete { worker: usize },
    /// Shutdown timer or backlog poll tick.
    RecoveryCheck,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    Server { server: usize, event: ServerEvent },
    ClientSend { traffic: TrafficType, client: usize },
    Sample,
}

impl Prioritized for Event {
    // A slot grant and a race timeout landing on the same instant resolve in
    // favour of the grant; samples observe the instant after it settles.
    fn priority(&self) -> u8 {
        match self {
            Event::Server {
                event: ServerEvent::SlotTimeout { .. },
                ..
            } => 1,
            Event::Sample => 2,
            _ => 0,
        }
    }
}

pub type EventQueue = Scheduler<Event>;

/// Mutable simulation services handed to logical processes.
pub struct SimContext<'a> {
    pub scheduler: &'a mut EventQueue,
    pub rng: &'a mut dyn RngCore,
}

impl SimContext<'_> {
    pub fn server_event(&mut self, server: usize, delay: f64, event: ServerEvent) -> EventKey {
        self.scheduler.schedule_in(delay, Event::Server { server, event })
    }
}
