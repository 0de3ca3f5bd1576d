//! Virtual clock and the suspension primitives every logical process uses.
//!
//! `Scheduler` provides `delay(d)` through [`Scheduler::schedule_in`],
//! `Store` provides FIFO `wait_for_item`, and `Resource` together with a
//! cancellable timer provides the slot/timeout race.

mod resource;
mod scheduler;
mod store;

pub use resource::{Acquire, Resource};
pub use scheduler::{EventKey, Prioritized, ScheduledEvent, Scheduler, SimTime};
pub use store::{Delivery, Store};
