use rand::Rng;
use serde::Serialize;
use std::mem;
use tracing::{debug, info};

use crate::error::{Error, InvariantViolation, Result};
use crate::events::{ServerEvent, SimContext};
use crate::models::{ServerProfile, UtilizationThresholds};
use crate::request::{DropReason, Request};
use crate::router::Routable;
use crate::sim::{Acquire, Delivery, EventKey, Resource, SimTime, Store};

/// Interval between backlog checks while a server waits to come back online.
pub const RECOVERY_POLL_INTERVAL: f64 = 1.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Online,
    /// Offline, waiting out `server_timeout` plus jitter.
    ShuttingDown,
    /// Offline, polling until the backlog drains below the clear threshold.
    Offline,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Admission {
    Admitted,
    Rejected(DropReason),
    /// Already admitted elsewhere; ignored without touching any counter.
    Duplicate,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ServerCounters {
    pub received: u64,
    pub processed: u64,
    pub dropped_queue_full: u64,
    pub dropped_high_load: u64,
    pub dropped_offline: u64,
    pub dropped_timeout_in_queue: u64,
    pub dropped_timeout_awaiting_worker: u64,
    pub shutdowns: u64,
}

impl ServerCounters {
    pub fn dropped(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::QueueFull => self.dropped_queue_full,
            DropReason::HighLoad => self.dropped_high_load,
            DropReason::Offline => self.dropped_offline,
            DropReason::TimeoutInQueue => self.dropped_timeout_in_queue,
            DropReason::TimeoutAwaitingWorker => self.dropped_timeout_awaiting_worker,
            DropReason::NoServerAvailable => 0,
        }
    }

    pub fn dropped_total(&self) -> u64 {
        DropReason::ALL
            .iter()
            .map(|reason| self.dropped(*reason))
            .sum()
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::QueueFull => self.dropped_queue_full += 1,
            DropReason::HighLoad => self.dropped_high_load += 1,
            DropReason::Offline => self.dropped_offline += 1,
            DropReason::TimeoutInQueue => self.dropped_timeout_in_queue += 1,
            DropReason::TimeoutAwaitingWorker => self.dropped_timeout_awaiting_worker += 1,
            DropReason::NoServerAvailable => {}
        }
    }
}

/// What one worker process is currently suspended on.
#[derive(Debug)]
enum Worker {
    /// Waiting for the queue to hand over an item.
    Idle,
    /// Holding a dequeued request, resume pending.
    Dequeued(Request),
    /// Racing for a slot. `timeout` is `None` once the slot is granted.
    AwaitingSlot {
        request: Request,
        timeout: Option<EventKey>,
    },
    Busy(Request),
}

/// A capacity-bounded processing unit: one FIFO admission queue feeding
/// `max_concurrent` worker processes that share a slot pool of the same size.
pub struct Server {
    index: usize,
    server_id: String,
    profile: ServerProfile,
    queue: Store<Request, usize>,
    slots: Resource<usize>,
    workers: Vec<Worker>,
    lifecycle: Lifecycle,
    cpu_utilization: f64,
    queue_utilization: f64,
    health: f64,
    counters: ServerCounters,
}

impl Server {
    pub fn new(index: usize, profile: ServerProfile) -> Self {
        let max_concurrent = profile.server.max_concurrent;
        let mut queue = Store::new();
        for worker in 0..max_concurrent {
            // Every worker starts suspended on the empty queue.
            let _ = queue.get(worker);
        }

        Self {
            index,
            server_id: format!("server-{}", index),
            profile,
            queue,
            slots: Resource::new(max_concurrent),
            workers: (0..max_concurrent).map(|_| Worker::Idle).collect(),
            lifecycle: Lifecycle::Online,
            cpu_utilization: 0.0,
            queue_utilization: 0.0,
            health: 0.0,
            counters: ServerCounters::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_online(&self) -> bool {
        self.lifecycle == Lifecycle::Online
    }

    pub fn health(&self) -> f64 {
        self.health
    }

    pub fn cpu_utilization(&self) -> f64 {
        self.cpu_utilization
    }

    pub fn queue_utilization(&self) -> f64 {
        self.queue_utilization
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn active_workers(&self) -> usize {
        self.slots.in_use()
    }

    pub fn counters(&self) -> &ServerCounters {
        &self.counters
    }

    pub fn processing_power(&self) -> f64 {
        self.profile.server.processing_power
    }

    /// Admission control for one incoming request.
    pub fn receive_request(
        &mut self,
        mut request: Request,
        ctx: &mut SimContext<'_>,
    ) -> Result<Admission> {
        if request.is_routed() {
            debug!(server = %self.server_id, request_id = ?request.request_id(), "ignore routed request");
            return Ok(Admission::Duplicate);
        }
        self.counters.received += 1;

        if !self.is_online() {
            return Ok(self.reject(request, DropReason::Offline, ctx.scheduler.now()));
        }

        let queue_len = self.queue.len();
        let max_queue = self.profile.server.max_queue_length;
        let admission = self.profile.admission;

        if queue_len >= max_queue {
            if ctx.rng.gen_bool(admission.shutdown_on_full_probability) {
                info!(at = %ctx.scheduler.now(), server = %self.server_id, "queue full, shutting down");
                self.begin_shutdown(ctx);
            }
            return Ok(self.reject(request, DropReason::QueueFull, ctx.scheduler.now()));
        }

        let near_full_margin = self.profile.server.near_full_margin;
        if near_full_margin > 0 && queue_len >= max_queue - near_full_margin {
            if ctx.rng.gen_bool(admission.shutdown_near_full_probability) {
                info!(at = %ctx.scheduler.now(), server = %self.server_id, "queue threshold met, preempting shutdown");
                self.begin_shutdown(ctx);
            }
            return Ok(self.reject(request, DropReason::QueueFull, ctx.scheduler.now()));
        }

        let shed_above = self.profile.thresholds.high * max_queue as f64;
        if queue_len as f64 > shed_above
            && ctx.rng.gen_bool(admission.high_utilization_rejection_rate)
        {
            return Ok(self.reject(request, DropReason::HighLoad, ctx.scheduler.now()));
        }

        let now = ctx.scheduler.now();
        request.set_arrival_time(now)?;
        request.set_seen_by(self.server_id.clone())?;
        request.mark_routed()?;

        debug!(
            at = %now,
            server = %self.server_id,
            request_id = ?request.request_id(),
            source = request.source_id(),
            queue_len = queue_len + 1,
            "request queued"
        );

        if let Delivery::Handoff { getter, item } = self.queue.put(request) {
            self.workers[getter] = Worker::Dequeued(item);
            ctx.server_event(self.index, 0.0, ServerEvent::Resume { worker: getter });
        }
        self.refresh_queue_utilization();

        Ok(Admission::Admitted)
    }

    pub fn handle(&mut self, event: ServerEvent, ctx: &mut SimContext<'_>) -> Result<()> {
        match event {
            ServerEvent::Resume { worker } => self.on_resume(worker, ctx),
            ServerEvent::SlotGranted { worker } => self.on_slot_granted(worker, ctx),
            ServerEvent::SlotTimeout { worker } => self.on_slot_timeout(worker, ctx),
            ServerEvent::ServiceComplete { worker } => self.on_service_complete(worker, ctx),
            ServerEvent::RecoveryCheck => {
                self.on_recovery_check(ctx);
                Ok(())
            }
        }
    }

    /// Service time for `request` given the current CPU utilization.
    ///
    /// Past the increased-utilization threshold the base time is stretched;
    /// past the high threshold it is stretched harder. The result is never
    /// below `load_size / processing_power`.
    pub fn calculate_processing_time(&self, request: &Request) -> f64 {
        let base = request.load_size() / self.profile.server.processing_power;
        base * degradation_factor(self.cpu_utilization, &self.profile.thresholds)
    }

    /// Starts a shutdown cycle unless one is already in flight.
    pub fn begin_shutdown(&mut self, ctx: &mut SimContext<'_>) {
        if self.lifecycle != Lifecycle::Online {
            return;
        }
        self.lifecycle = Lifecycle::ShuttingDown;
        self.counters.shutdowns += 1;

        let jitter = self.profile.server.timeout_jitter;
        let jitter = ctx.rng.gen_range(jitter.lower..=jitter.upper);
        let delay = self.profile.server.server_timeout + jitter;
        info!(at = %ctx.scheduler.now(), server = %self.server_id, delay, "server offline");
        ctx.server_event(self.index, delay, ServerEvent::RecoveryCheck);
    }

    /// End-of-run accounting: queued work times out, work holding a slot
    /// counts as served.
    pub fn drain(&mut self, now: SimTime) -> Result<()> {
        let queued: Vec<Request> = self.queue.drain().collect();
        for request in queued {
            self.drop_request(request, DropReason::TimeoutInQueue);
        }

        for worker in 0..self.workers.len() {
            match mem::replace(&mut self.workers[worker], Worker::Idle) {
                Worker::Idle => {}
                Worker::Dequeued(request) => {
                    self.drop_request(request, DropReason::TimeoutInQueue)
                }
                Worker::AwaitingSlot {
                    request,
                    timeout: Some(_),
                } => self.drop_request(request, DropReason::TimeoutAwaitingWorker),
                Worker::AwaitingSlot {
                    request,
                    timeout: None,
                }
                | Worker::Busy(request) => self.finish(request, now)?,
            }
        }
        Ok(())
    }

    fn on_resume(&mut self, worker: usize, ctx: &mut SimContext<'_>) -> Result<()> {
        let request = match self.take_worker(worker) {
            Worker::Dequeued(request) => request,
            other => return Err(self.unexpected(worker, other, "holding a dequeued request")),
        };
        self.refresh_queue_utilization();

        let now = ctx.scheduler.now();
        let arrival = request
            .arrival_time()
            .ok_or(InvariantViolation::MissingField {
                field: "arrival_time",
                request_id: request.request_id(),
            })?;
        let waited = now - arrival;
        let remaining = (self.profile.server.request_timeout - waited).max(0.0);

        if remaining <= 0.0 {
            debug!(at = %now, server = %self.server_id, request_id = ?request.request_id(), waited, "timeout in queue");
            self.drop_request(request, DropReason::TimeoutInQueue);
            self.next_item(worker, ctx);
            return Ok(());
        }

        match self.slots.request(worker) {
            Acquire::Granted => {
                self.workers[worker] = Worker::AwaitingSlot {
                    request,
                    timeout: None,
                };
                ctx.server_event(self.index, 0.0, ServerEvent::SlotGranted { worker });
            }
            Acquire::Pending => {
                let key =
                    ctx.server_event(self.index, remaining, ServerEvent::SlotTimeout { worker });
                self.workers[worker] = Worker::AwaitingSlot {
                    request,
                    timeout: Some(key),
                };
            }
        }
        Ok(())
    }

    fn on_slot_granted(&mut self, worker: usize, ctx: &mut SimContext<'_>) -> Result<()> {
        let request = match self.take_worker(worker) {
            Worker::AwaitingSlot {
                request,
                timeout: None,
            } => request,
            other => return Err(self.unexpected(worker, other, "holding a granted slot")),
        };
        self.refresh_cpu_utilization();

        let duration = self.calculate_processing_time(&request);
        debug!(
            at = %ctx.scheduler.now(),
            server = %self.server_id,
            request_id = ?request.request_id(),
            active = self.slots.in_use(),
            cpu = self.cpu_utilization,
            duration,
            "processing started"
        );
        ctx.server_event(self.index, duration, ServerEvent::ServiceComplete { worker });
        self.workers[worker] = Worker::Busy(request);
        Ok(())
    }

    fn on_slot_timeout(&mut self, worker: usize, ctx: &mut SimContext<'_>) -> Result<()> {
        let request = match self.take_worker(worker) {
            Worker::AwaitingSlot {
                request,
                timeout: Some(_),
            } => request,
            other => return Err(self.unexpected(worker, other, "waiting for a slot")),
        };
        self.slots.withdraw(&worker);
        self.refresh_cpu_utilization();

        debug!(at = %ctx.scheduler.now(), server = %self.server_id, request_id = ?request.request_id(), "timeout waiting for worker");
        self.drop_request(request, DropReason::TimeoutAwaitingWorker);
        self.next_item(worker, ctx);
        Ok(())
    }

    fn on_service_complete(&mut self, worker: usize, ctx: &mut SimContext<'_>) -> Result<()> {
        let request = match self.take_worker(worker) {
            Worker::Busy(request) => request,
            other => return Err(self.unexpected(worker, other, "busy")),
        };

        if let Some(next) = self.slots.release() {
            self.grant_waiting(next, ctx);
        }
        self.refresh_cpu_utilization();

        let now = ctx.scheduler.now();
        debug!(at = %now, server = %self.server_id, request_id = ?request.request_id(), "processing finished");
        self.finish(request, now)?;
        self.next_item(worker, ctx);
        Ok(())
    }

    fn on_recovery_check(&mut self, ctx: &mut SimContext<'_>) {
        let max_queue = self.profile.server.max_queue_length;
        let clear_below = self.profile.server.offline_clear_threshold * max_queue as f64;
        if self.queue.len() as f64 > clear_below {
            self.lifecycle = Lifecycle::Offline;
            ctx.server_event(self.index, RECOVERY_POLL_INTERVAL, ServerEvent::RecoveryCheck);
            return;
        }

        self.lifecycle = Lifecycle::Online;
        // Start from a conservative CPU figure so the router does not pile
        // onto a server that just came back.
        self.cpu_utilization = self.profile.server.recovery_cpu_utilization;
        self.queue_utilization = self.queue.len() as f64 / max_queue as f64;
        self.update_health();
        info!(
            at = %ctx.scheduler.now(),
            server = %self.server_id,
            queue_len = self.queue.len(),
            max_queue,
            "server back online"
        );
    }

    /// Passes a released slot to a worker that was waiting for it and cancels
    /// that worker's timeout.
    fn grant_waiting(&mut self, worker: usize, ctx: &mut SimContext<'_>) {
        if let Worker::AwaitingSlot { timeout, .. } = &mut self.workers[worker] {
            if let Some(key) = timeout.take() {
                ctx.scheduler.cancel(key);
            }
        }
        ctx.server_event(self.index, 0.0, ServerEvent::SlotGranted { worker });
    }

    /// Puts `worker` back to waiting on the queue.
    fn next_item(&mut self, worker: usize, ctx: &mut SimContext<'_>) {
        match self.queue.get(worker) {
            Some(request) => {
                self.workers[worker] = Worker::Dequeued(request);
                ctx.server_event(self.index, 0.0, ServerEvent::Resume { worker });
            }
            None => self.workers[worker] = Worker::Idle,
        }
    }

    fn finish(&mut self, mut request: Request, now: SimTime) -> Result<()> {
        request.set_served_time(now)?;
        request.mark_served()?;
        self.counters.processed += 1;
        Ok(())
    }

    fn reject(&mut self, request: Request, reason: DropReason, now: SimTime) -> Admission {
        debug!(
            at = %now,
            server = %self.server_id,
            request_id = ?request.request_id(),
            source = request.source_id(),
            queue_len = self.queue.len(),
            %reason,
            "request dropped"
        );
        self.drop_request(request, reason);
        Admission::Rejected(reason)
    }

    fn drop_request(&mut self, request: Request, reason: DropReason) {
        self.counters.record_drop(reason);
        request.mark_failed(reason);
    }

    fn take_worker(&mut self, worker: usize) -> Worker {
        mem::replace(&mut self.workers[worker], Worker::Idle)
    }

    fn unexpected(&mut self, worker: usize, state: Worker, expected: &'static str) -> Error {
        self.workers[worker] = state;
        InvariantViolation::WorkerState {
            server: self.server_id.clone(),
            worker,
            expected,
        }
        .into()
    }

    fn refresh_cpu_utilization(&mut self) {
        self.cpu_utilization =
            self.slots.in_use() as f64 / self.profile.server.max_concurrent as f64;
        self.update_health();
    }

    fn refresh_queue_utilization(&mut self) {
        self.queue_utilization =
            self.queue.len() as f64 / self.profile.server.max_queue_length as f64;
        self.update_health();
    }

    fn update_health(&mut self) {
        let weights = self.profile.health;
        self.health = (weights.cpu_weight * self.cpu_utilization
            + weights.queue_weight * self.queue_utilization)
            .clamp(0.0, 1.0);
    }
}

impl Routable for Server {
    fn is_online(&self) -> bool {
        Server::is_online(self)
    }

    fn health(&self) -> f64 {
        self.health
    }
}

/// Multiplier applied to the base service time at `cpu` utilization.
pub fn degradation_factor(cpu: f64, thresholds: &UtilizationThresholds) -> f64 {
    if cpu <= thresholds.increased {
        return 1.0;
    }
    let over_increased = cpu - thresholds.increased;
    if cpu < thresholds.high {
        1.0 + over_increased * 2.0
    } else {
        let over_high = cpu - thresholds.high;
        1.0 + over_increased * 3.0 + over_high * 5.0
    }
}
