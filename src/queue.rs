//! Fixed-capacity hand-off queue between two adjacent stages.
//!
//! Each queue has exactly one producer and one consumer. The producer blocks
//! while the ring is full and the consumer blocks while it is empty. Two flags
//! end the conversation:
//!
//! - [`BoundedQueue::finish`]: the producer will push nothing more. Once the
//!   ring drains, [`BoundedQueue::pop`] returns `None` instead of blocking.
//! - [`BoundedQueue::abandon`]: the consumer stopped. Queued items are dropped
//!   and every push, including one already blocked, hands its item back.

use parking_lot::{Condvar, Mutex};

/// A bounded single-producer/single-consumer FIFO.
pub struct BoundedQueue<T> {
    name: &'static str,
    state: Mutex<RingState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

struct RingState<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
    high_water: usize,
    total_pushed: u64,
    finished: bool,
    abandoned: bool,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        Self {
            name,
            state: Mutex::new(RingState {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
                count: 0,
                high_water: 0,
                total_pushed: 0,
                finished: false,
                abandoned: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest count ever observed.
    pub fn high_water(&self) -> usize {
        self.state.lock().high_water
    }

    /// Total items accepted over the queue's life.
    pub fn total_pushed(&self) -> u64 {
        self.state.lock().total_pushed
    }

    /// Append `item`, blocking while the ring is full.
    ///
    /// # Errors
    ///
    /// Returns the item if the consumer has abandoned the queue.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        while state.count == state.slots.len() && !state.abandoned {
            self.not_full.wait(&mut state);
        }
        if state.abandoned {
            return Err(item);
        }
        debug_assert!(!state.finished, "push after finish on {}", self.name);

        let tail = state.tail;
        state.slots[tail] = Some(item);
        state.tail = (tail + 1) % state.slots.len();
        state.count += 1;
        state.total_pushed += 1;
        state.high_water = state.high_water.max(state.count);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the oldest item, blocking while the ring is empty.
    ///
    /// Returns `None` once the producer has finished (or the consumer side
    /// abandoned the queue) and nothing is left to take.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.count > 0 {
                let head = state.head;
                let item = state.slots[head].take();
                state.head = (head + 1) % state.slots.len();
                state.count -= 1;
                drop(state);

                self.not_full.notify_one();
                return item;
            }
            if state.finished || state.abandoned {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Producer side: nothing more will be pushed.
    pub fn finish(&self) {
        self.state.lock().finished = true;
        self.not_empty.notify_all();
    }

    /// Consumer side: stop accepting items and drop what is queued.
    pub fn abandon(&self) {
        let mut state = self.state.lock();
        state.abandoned = true;
        state.slots.iter_mut().for_each(|slot| *slot = None);
        state.count = 0;
        state.head = state.tail;
        drop(state);

        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    pub fn is_abandoned(&self) -> bool {
        self.state.lock().abandoned
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("capacity", &state.slots.len())
            .field("count", &state.count)
            .field("finished", &state.finished)
            .field("abandoned", &state.abandoned)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new("q", 4);
        for i in 0..4 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 4);
        for i in 0..4 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wraparound() {
        let queue = BoundedQueue::new("q", 3);
        for round in 0..10 {
            queue.push(round * 2).unwrap();
            queue.push(round * 2 + 1).unwrap();
            assert_eq!(queue.pop(), Some(round * 2));
            assert_eq!(queue.pop(), Some(round * 2 + 1));
        }
        assert_eq!(queue.high_water(), 2);
        assert_eq!(queue.total_pushed(), 20);
    }

    #[test]
    fn test_pop_after_finish_drains_then_ends() {
        let queue = BoundedQueue::new("q", 2);
        queue.push("a").unwrap();
        queue.finish();
        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_finish_wakes_blocked_consumer() {
        let queue: BoundedQueue<u32> = BoundedQueue::new("q", 1);
        thread::scope(|s| {
            let consumer = s.spawn(|| queue.pop());
            thread::sleep(Duration::from_millis(20));
            queue.finish();
            assert_eq!(consumer.join().unwrap(), None);
        });
    }

    #[test]
    fn test_push_blocks_until_slot_frees() {
        let queue = BoundedQueue::new("q", 1);
        queue.push(1).unwrap();
        thread::scope(|s| {
            let producer = s.spawn(|| queue.push(2));
            thread::sleep(Duration::from_millis(20));
            assert_eq!(queue.len(), 1);
            assert_eq!(queue.pop(), Some(1));
            producer.join().unwrap().unwrap();
        });
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.high_water(), 1);
    }

    #[test]
    fn test_abandon_releases_blocked_producer() {
        let queue = BoundedQueue::new("q", 1);
        queue.push(1).unwrap();
        thread::scope(|s| {
            let producer = s.spawn(|| queue.push(2));
            thread::sleep(Duration::from_millis(20));
            queue.abandon();
            assert_eq!(producer.join().unwrap(), Err(2));
        });
        assert!(queue.is_abandoned());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.push(3), Err(3));
    }

    #[test]
    fn test_count_never_exceeds_capacity_under_contention() {
        let queue = BoundedQueue::new("q", 3);
        let received = thread::scope(|s| {
            s.spawn(|| {
                for i in 0..2_000u32 {
                    queue.push(i).unwrap();
                }
                queue.finish();
            });
            let consumer = s.spawn(|| {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop() {
                    assert!(queue.len() <= 3);
                    seen.push(item);
                }
                seen
            });
            consumer.join().unwrap()
        });
        assert_eq!(received, (0..2_000).collect::<Vec<_>>());
        assert!(queue.high_water() <= 3);
    }

    #[test]
    #[should_panic(expected = "queue capacity must be at least 1")]
    fn test_zero_capacity_panics() {
        let _queue: BoundedQueue<u8> = BoundedQueue::new("q", 0);
    }
}
