use std::collections::VecDeque;

/// Result of putting an item into a [`Store`].
#[derive(Debug, PartialEq)]
pub enum Delivery<T, G> {
    /// No getter was waiting; the item is now at the tail of the queue.
    Queued,
    /// The oldest waiting getter takes the item directly.
    Handoff { getter: G, item: T },
}

/// Unbounded FIFO queue with FIFO waiting getters.
#[derive(Debug)]
pub struct Store<T, G> {
    items: VecDeque<T>,
    getters: VecDeque<G>,
}

impl<T, G> Default for Store<T, G> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            getters: VecDeque::new(),
        }
    }
}

impl<T, G> Store<T, G> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn waiting_getters(&self) -> usize {
        self.getters.len()
    }

    pub fn put(&mut self, item: T) -> Delivery<T, G> {
        match self.getters.pop_front() {
            Some(getter) => Delivery::Handoff { getter, item },
            None => {
                self.items.push_back(item);
                Delivery::Queued
            }
        }
    }

    /// Removes the head item, or registers `getter` to receive the next put.
    pub fn get(&mut self, getter: G) -> Option<T> {
        match self.items.pop_front() {
            Some(item) => Some(item),
            None => {
                self.getters.push_back(getter);
                None
            }
        }
    }

    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_come_out_in_arrival_order() {
        let mut store: Store<u32, usize> = Store::new();
        assert_eq!(store.put(1), Delivery::Queued);
        assert_eq!(store.put(2), Delivery::Queued);

        assert_eq!(store.get(0), Some(1));
        assert_eq!(store.get(0), Some(2));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn waiting_getters_are_served_oldest_first() {
        let mut store: Store<&str, usize> = Store::new();
        assert_eq!(store.get(4), None);
        assert_eq!(store.get(9), None);
        assert_eq!(store.waiting_getters(), 2);

        assert_eq!(
            store.put("a"),
            Delivery::Handoff {
                getter: 4,
                item: "a"
            }
        );
        assert_eq!(
            store.put("b"),
            Delivery::Handoff {
                getter: 9,
                item: "b"
            }
        );
        assert!(store.is_empty());
        assert_eq!(store.put("c"), Delivery::Queued);
        assert_eq!(store.len(), 1);
    }
}
