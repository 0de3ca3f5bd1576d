use rand::Rng;
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;
use tracing::trace;

use crate::error::{InvariantViolation, Result};
use crate::events::{Event, SimContext};
use crate::models::TrafficProfile;
use crate::request::{Outcome, OutcomeListener, Request, TrafficType};

/// Per-client response bookkeeping, fed by request outcomes.
#[derive(Debug, Default)]
pub struct ClientStats {
    requests_sent: Cell<u64>,
    successful_response: Cell<u64>,
    no_response: Cell<u64>,
}

impl ClientStats {
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.get()
    }

    pub fn successful_response(&self) -> u64 {
        self.successful_response.get()
    }

    pub fn no_response(&self) -> u64 {
        self.no_response.get()
    }

    fn record_sent(&self) {
        self.requests_sent.set(self.requests_sent.get() + 1);
    }
}

impl OutcomeListener for ClientStats {
    fn notify(&self, _request: &Request, outcome: Outcome) {
        let counter = if outcome.is_success() {
            &self.successful_response
        } else {
            &self.no_response
        };
        counter.set(counter.get() + 1);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TrafficTotals {
    pub requests_sent: u64,
    pub successful_response: u64,
    pub no_response: u64,
}

impl TrafficTotals {
    pub fn success_rate(&self) -> f64 {
        self.successful_response as f64 / self.requests_sent.max(1) as f64
    }
}

#[derive(Debug)]
pub struct Client {
    client_id: String,
    stats: Rc<ClientStats>,
}

impl Client {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }
}

/// A population of clients of one traffic type, each sending requests with
/// exponential inter-arrival times.
#[derive(Debug)]
pub struct TrafficNetwork {
    traffic_type: TrafficType,
    profile: TrafficProfile,
    clients: Vec<Client>,
}

impl TrafficNetwork {
    pub fn new(traffic_type: TrafficType, profile: TrafficProfile) -> Self {
        let clients = (0..profile.clients)
            .map(|idx| Client {
                client_id: format!("{} Client No. {}", traffic_type, idx + 1),
                stats: Rc::new(ClientStats::default()),
            })
            .collect();

        Self {
            traffic_type,
            profile,
            clients,
        }
    }

    pub fn traffic_type(&self) -> TrafficType {
        self.traffic_type
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    /// Schedules the first send of every client.
    pub fn start(&self, ctx: &mut SimContext<'_>) {
        for client in 0..self.clients.len() {
            self.schedule_next(client, ctx);
        }
    }

    /// Builds the next request of `client` and schedules the send after it.
    pub fn emit(&self, client: usize, ctx: &mut SimContext<'_>) -> Result<Request> {
        let sender = self
            .clients
            .get(client)
            .ok_or_else(|| InvariantViolation::UnknownClient {
                traffic: self.traffic_type.to_string(),
                client,
            })?;

        let bounds = self.profile.load_size;
        let load_size = ctx.rng.gen_range(bounds.lower..=bounds.upper);
        sender.stats.record_sent();
        trace!(at = %ctx.scheduler.now(), client = %sender.client_id, load_size, "send request");

        let request = Request::new(sender.client_id.clone(), self.traffic_type, load_size)
            .with_listener(sender.stats.clone());
        self.schedule_next(client, ctx);
        Ok(request)
    }

    pub fn totals(&self) -> TrafficTotals {
        self.clients
            .iter()
            .fold(TrafficTotals::default(), |mut totals, client| {
                totals.requests_sent += client.stats.requests_sent();
                totals.successful_response += client.stats.successful_response();
                totals.no_response += client.stats.no_response();
                totals
            })
    }

    /// Aggregate offered rate of the whole population, requests per second.
    pub fn nominal_rate(&self) -> f64 {
        self.profile.rate * self.clients.len() as f64
    }

    fn schedule_next(&self, client: usize, ctx: &mut SimContext<'_>) {
        if self.profile.rate <= 0.0 {
            return;
        }
        let mut u = ctx.rng.gen::<f64>();
        if u <= f64::MIN_POSITIVE {
            u = f64::MIN_POSITIVE;
        }
        let inter_arrival = -u.ln() / self.profile.rate;
        ctx.scheduler.schedule_in(
            inter_arrival,
            Event::ClientSend {
                traffic: self.traffic_type,
                client,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventQueue;
    use crate::models::Bounds;
    use crate::request::DropReason;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn profile(clients: usize, rate: f64) -> TrafficProfile {
        TrafficProfile {
            clients,
            rate,
            load_size: Bounds::new(10.0, 25.0),
        }
    }

    #[test]
    fn clients_are_named_by_type_and_position() {
        let botnet = TrafficNetwork::new(TrafficType::Malicious, profile(2, 20.0));
        let names: Vec<&str> = botnet.clients().iter().map(Client::client_id).collect();
        assert_eq!(names, vec!["Malicious Client No. 1", "Malicious Client No. 2"]);
    }

    #[test]
    fn start_schedules_one_send_per_client() {
        let traffic = TrafficNetwork::new(TrafficType::Legitimate, profile(4, 2.0));
        let mut queue = EventQueue::new();
        let mut rng = StdRng::seed_from_u64(5);
        let mut ctx = SimContext {
            scheduler: &mut queue,
            rng: &mut rng,
        };

        traffic.start(&mut ctx);
        assert_eq!(queue.pending(), 4);
    }

    #[test]
    fn emitted_requests_carry_profile_load_and_listener() {
        let traffic = TrafficNetwork::new(TrafficType::Malicious, profile(1, 20.0));
        let mut queue = EventQueue::new();
        let mut rng = StdRng::seed_from_u64(5);
        let mut ctx = SimContext {
            scheduler: &mut queue,
            rng: &mut rng,
        };

        let mut served = traffic.emit(0, &mut ctx).unwrap();
        assert!((10.0..=25.0).contains(&served.load_size()));
        assert_eq!(served.traffic_type(), TrafficType::Malicious);
        served.mark_served().unwrap();

        let dropped = traffic.emit(0, &mut ctx).unwrap();
        dropped.mark_failed(DropReason::QueueFull);

        assert_eq!(
            traffic.totals(),
            TrafficTotals {
                requests_sent: 2,
                successful_response: 1,
                no_response: 1,
            }
        );
        assert_eq!(queue.pending(), 2);
    }

    #[test]
    fn mean_inter_arrival_tracks_rate() {
        let traffic = TrafficNetwork::new(TrafficType::Legitimate, profile(1, 4.0));
        let mut queue = EventQueue::new();
        let mut rng = StdRng::seed_from_u64(11);

        {
            let mut ctx = SimContext {
                scheduler: &mut queue,
                rng: &mut rng,
            };
            traffic.start(&mut ctx);
        }
        let mut sends = 0u32;
        while queue.pop_until(crate::sim::SimTime(500.0)).is_some() {
            sends += 1;
            let mut ctx = SimContext {
                scheduler: &mut queue,
                rng: &mut rng,
            };
            traffic.emit(0, &mut ctx).unwrap();
        }

        // 4 req/s over 500 s.
        assert!((1800..2200).contains(&sends), "sends = {}", sends);
    }

    #[test]
    fn success_rate_handles_no_traffic() {
        assert_eq!(TrafficTotals::default().success_rate(), 0.0);
    }
}
