/// Read-only view the router needs of a server.
pub trait Routable {
    fn is_online(&self) -> bool;
    fn health(&self) -> f64;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Route {
    Selected { server: usize, health: f64 },
    NoServerAvailable,
}

/// Picks the least-loaded online server. Ties go to the first in input order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Router;

impl Router {
    pub fn route<S: Routable>(&self, servers: &[S]) -> Route {
        let mut best: Option<(usize, f64)> = None;

        for (idx, server) in servers.iter().enumerate() {
            if !server.is_online() {
                continue;
            }
            let health = server.health();
            match best {
                Some((_, min_health)) if health >= min_health => {}
                _ => best = Some((idx, health)),
            }
        }

        match best {
            Some((server, health)) => Route::Selected { server, health },
            None => Route::NoServerAvailable,
        }
    }
}
