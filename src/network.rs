use tracing::debug;

use crate::error::{InvariantViolation, Result};
use crate::events::{ServerEvent, SimContext};
use crate::models::ServerProfile;
use crate::request::{DropReason, Request};
use crate::router::{Route, Router};
use crate::server::{Admission, Server};
use crate::sim::SimTime;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Dispatch {
    Routed { server: usize, admission: Admission },
    NoServerAvailable,
}

/// Single entry point for traffic: stamps identity, routes, and counts
/// requests that found the whole cluster offline.
pub struct Network {
    servers: Vec<Server>,
    router: Router,
    incoming_request_count: u64,
    dropped_no_server_available: u64,
}

impl Network {
    pub fn new(count: usize, profile: &ServerProfile) -> Self {
        let servers = (0..count)
            .map(|index| Server::new(index, profile.clone()))
            .collect();
        Self::with_servers(servers)
    }

    pub fn with_servers(servers: Vec<Server>) -> Self {
        Self {
            servers,
            router: Router,
            incoming_request_count: 0,
            dropped_no_server_available: 0,
        }
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn server_mut(&mut self, index: usize) -> Result<&mut Server> {
        self.servers
            .get_mut(index)
            .ok_or_else(|| InvariantViolation::UnknownServer(index).into())
    }

    pub fn incoming_request_count(&self) -> u64 {
        self.incoming_request_count
    }

    pub fn dropped_no_server_available(&self) -> u64 {
        self.dropped_no_server_available
    }

    pub fn online_servers(&self) -> usize {
        self.servers.iter().filter(|server| server.is_online()).count()
    }

    pub fn process_request(
        &mut self,
        mut request: Request,
        ctx: &mut SimContext<'_>,
    ) -> Result<Dispatch> {
        if request.is_routed() {
            return Err(InvariantViolation::AlreadyRouted {
                request_id: request.request_id(),
            }
            .into());
        }

        self.incoming_request_count += 1;
        request.set_request_id(self.incoming_request_count)?;

        match self.router.route(&self.servers) {
            Route::Selected { server, health } => {
                debug!(
                    at = %ctx.scheduler.now(),
                    request_id = self.incoming_request_count,
                    server = %self.servers[server].server_id(),
                    health,
                    "routing request"
                );
                let admission = self.servers[server].receive_request(request, ctx)?;
                Ok(Dispatch::Routed { server, admission })
            }
            Route::NoServerAvailable => {
                debug!(
                    at = %ctx.scheduler.now(),
                    request_id = self.incoming_request_count,
                    "no server available"
                );
                self.dropped_no_server_available += 1;
                request.mark_failed(DropReason::NoServerAvailable);
                Ok(Dispatch::NoServerAvailable)
            }
        }
    }

    pub fn handle(
        &mut self,
        server: usize,
        event: ServerEvent,
        ctx: &mut SimContext<'_>,
    ) -> Result<()> {
        self.server_mut(server)?.handle(event, ctx)
    }

    pub fn drain(&mut self, now: SimTime) -> Result<()> {
        for server in &mut self.servers {
            server.drain(now)?;
        }
        Ok(())
    }
}
