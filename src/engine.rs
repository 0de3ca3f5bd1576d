use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::validate;
use crate::error::Result;
use crate::events::{Event, EventQueue, SimContext};
use crate::metrics::Collector;
use crate::models::SimConfig;
use crate::network::Network;
use crate::request::TrafficType;
use crate::sim::SimTime;
use crate::state::{RunMetadata, SimulationResult};
use crate::traffic::TrafficNetwork;

pub struct SimulationEngine {
    config: SimConfig,
    seed: u64,
    scheduler: EventQueue,
    rng: StdRng,
    network: Network,
    legitimate: TrafficNetwork,
    botnet: TrafficNetwork,
    collector: Collector,
}

impl SimulationEngine {
    pub fn new(config: SimConfig) -> Result<Self> {
        validate(&config)?;
        let seed = config.seed.unwrap_or(0);
        let network = Network::new(config.servers.count, &config.server_profile());
        let legitimate = TrafficNetwork::new(TrafficType::Legitimate, config.legitimate.clone());
        let botnet = TrafficNetwork::new(TrafficType::Malicious, config.malicious.clone());
        let collector = Collector::new(&config);

        Ok(Self {
            config,
            seed,
            scheduler: EventQueue::new(),
            rng: StdRng::seed_from_u64(seed),
            network,
            legitimate,
            botnet,
            collector,
        })
    }

    /// Runs to the configured horizon, drains in-flight work and returns the
    /// checked result.
    pub fn run(mut self) -> Result<SimulationResult> {
        let horizon = SimTime(self.config.duration);
        info!(
            seed = self.seed,
            duration = self.config.duration,
            servers = self.config.servers.count,
            legitimate_clients = self.legitimate.clients().len(),
            malicious_clients = self.botnet.clients().len(),
            "simulation start"
        );

        self.start();
        self.run_until(horizon)?;
        self.network.drain(horizon)?;

        let metadata = RunMetadata {
            seed: self.seed,
            duration: self.config.duration,
            servers: self.config.servers.count,
            legitimate_clients: self.legitimate.clients().len(),
            malicious_clients: self.botnet.clients().len(),
            report_interval: self.config.report_interval,
        };
        let result =
            self.collector
                .finish(metadata, &self.network, &self.legitimate, &self.botnet)?;

        info!(
            generated = result.totals.generated,
            served = result.totals.served,
            dropped = result.totals.dropped(),
            "simulation finished"
        );
        Ok(result)
    }

    fn start(&mut self) {
        let mut ctx = SimContext {
            scheduler: &mut self.scheduler,
            rng: &mut self.rng,
        };
        self.legitimate.start(&mut ctx);
        self.botnet.start(&mut ctx);
        ctx.scheduler.schedule_now(Event::Sample);
    }

    fn run_until(&mut self, horizon: SimTime) -> Result<()> {
        while let Some(event) = self.scheduler.pop_until(horizon) {
            self.dispatch(event)?;
        }
        self.scheduler.advance_to(horizon);
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        let mut ctx = SimContext {
            scheduler: &mut self.scheduler,
            rng: &mut self.rng,
        };

        match event {
            Event::Server { server, event } => self.network.handle(server, event, &mut ctx),
            Event::ClientSend { traffic, client } => {
                let source = match traffic {
                    TrafficType::Legitimate => &self.legitimate,
                    TrafficType::Malicious => &self.botnet,
                };
                let request = source.emit(client, &mut ctx)?;
                self.network.process_request(request, &mut ctx)?;
                Ok(())
            }
            Event::Sample => {
                let now = ctx.scheduler.now();
                ctx.scheduler
                    .schedule_in(self.config.sample_interval, Event::Sample);
                self.collector
                    .sample(now, &self.network, &self.legitimate, &self.botnet);
                Ok(())
            }
        }
    }
}

pub fn run_simulation(config: &SimConfig) -> Result<SimulationResult> {
    SimulationEngine::new(config.clone())?.run()
}
