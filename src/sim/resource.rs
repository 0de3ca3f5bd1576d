use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Acquire {
    Granted,
    Pending,
}

/// Bounded pool of identical units with a FIFO waiting line.
#[derive(Debug)]
pub struct Resource<G> {
    capacity: usize,
    in_use: usize,
    waiters: VecDeque<G>,
}

impl<G: PartialEq> Resource<G> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: 0,
            waiters: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    pub fn request(&mut self, who: G) -> Acquire {
        if self.in_use < self.capacity && self.waiters.is_empty() {
            self.in_use += 1;
            Acquire::Granted
        } else {
            self.waiters.push_back(who);
            Acquire::Pending
        }
    }

    /// Removes a pending request so it can no longer be granted.
    pub fn withdraw(&mut self, who: &G) -> bool {
        match self.waiters.iter().position(|waiter| waiter == who) {
            Some(idx) => {
                self.waiters.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns a unit. If someone is waiting the unit passes straight to them
    /// and their id is returned.
    pub fn release(&mut self) -> Option<G> {
        debug_assert!(self.in_use > 0, "release without a matching grant");
        match self.waiters.pop_front() {
            Some(next) => Some(next),
            None => {
                self.in_use = self.in_use.saturating_sub(1);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_up_to_capacity_then_queues() {
        let mut pool = Resource::new(2);
        assert_eq!(pool.request(0), Acquire::Granted);
        assert_eq!(pool.request(1), Acquire::Granted);
        assert_eq!(pool.request(2), Acquire::Pending);
        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.waiting(), 1);
    }

    #[test]
    fn release_hands_unit_to_oldest_waiter() {
        let mut pool = Resource::new(1);
        assert_eq!(pool.request(0), Acquire::Granted);
        assert_eq!(pool.request(1), Acquire::Pending);
        assert_eq!(pool.request(2), Acquire::Pending);

        assert_eq!(pool.release(), Some(1));
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.release(), Some(2));
        assert_eq!(pool.release(), None);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn withdrawn_waiter_is_never_granted() {
        let mut pool = Resource::new(1);
        assert_eq!(pool.request(0), Acquire::Granted);
        assert_eq!(pool.request(1), Acquire::Pending);

        assert!(pool.withdraw(&1));
        assert!(!pool.withdraw(&1));
        assert_eq!(pool.release(), None);
        assert_eq!(pool.in_use(), 0);
    }
}
