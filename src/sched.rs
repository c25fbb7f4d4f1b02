//! Background load scheduler: a FIFO queue drained by a bounded worker pool.
//!
//! The scheduler itself never touches the network. `pump` pops indices and
//! hands them to a dispatch callback; the viewer's callback performs the
//! Idle→Loading transition and sends the request to the fetch workers. The
//! dispatched counter caps how many requests are outstanding at once, so the
//! pool never exceeds its concurrency limit no matter how long the queue is.
//!
//! `pump` is idempotent and re-entrant: calling it with no free slot or an
//! empty queue does nothing, and each drained result calls `on_complete`
//! followed by `pump` again — the pool sustains itself until the queue is
//! empty.

use std::collections::VecDeque;

use log::trace;

pub struct LoadScheduler {
    queue: VecDeque<usize>,
    dispatched: usize,
    limit: usize,
}

impl LoadScheduler {
    pub fn new(limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            dispatched: 0,
            limit: limit.max(1),
        }
    }

    /// Append a background request. Duplicates already in the queue are
    /// dropped; callers additionally check the frame is Idle before calling.
    pub fn enqueue(&mut self, index: usize) -> bool {
        if self.queue.contains(&index) {
            return false;
        }
        self.queue.push_back(index);
        true
    }

    /// Push an eager request to the front of the queue, ahead of any
    /// background backlog. A queued background copy of the same index is
    /// promoted rather than duplicated. Eagerness affects scheduling only.
    pub fn enqueue_front(&mut self, index: usize) {
        if let Some(pos) = self.queue.iter().position(|&i| i == index) {
            self.queue.remove(pos);
        }
        self.queue.push_front(index);
    }

    /// Drain the queue into `dispatch` while a worker slot is free.
    ///
    /// `dispatch` returns whether a load actually started; indices that were
    /// already loading or loaded by the time they reach the front are skipped
    /// without consuming a slot.
    pub fn pump(&mut self, mut dispatch: impl FnMut(usize) -> bool) {
        while self.dispatched < self.limit {
            let Some(index) = self.queue.pop_front() else {
                break;
            };
            if dispatch(index) {
                self.dispatched += 1;
                trace!(
                    "sched: dispatched frame {index} ({}/{} slots, {} queued)",
                    self.dispatched,
                    self.limit,
                    self.queue.len()
                );
            }
        }
    }

    /// A dispatched load finished (success or failure); free its slot.
    pub fn on_complete(&mut self) {
        self.dispatched = self.dispatched.saturating_sub(1);
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_respects_concurrency_limit() {
        let mut sched = LoadScheduler::new(3);
        for i in 0..10 {
            sched.enqueue(i);
        }
        let mut started = Vec::new();
        sched.pump(|i| {
            started.push(i);
            true
        });
        // 10 idle indices, limit 3: exactly 3 in flight.
        assert_eq!(started, vec![0, 1, 2]);
        assert_eq!(sched.dispatched(), 3);
        assert_eq!(sched.queued(), 7);
    }

    #[test]
    fn completions_sustain_the_pool_until_drained() {
        let mut sched = LoadScheduler::new(3);
        for i in 0..10 {
            sched.enqueue(i);
        }
        let mut started = 0;
        sched.pump(|_| {
            started += 1;
            true
        });
        while sched.dispatched() > 0 {
            sched.on_complete();
            sched.pump(|_| {
                started += 1;
                true
            });
            assert!(sched.dispatched() <= 3, "ceiling holds while draining");
        }
        assert_eq!(started, 10);
        assert_eq!(sched.queued(), 0);
    }

    #[test]
    fn fifo_order_is_insertion_order() {
        let mut sched = LoadScheduler::new(2);
        sched.enqueue(4);
        sched.enqueue(7);
        sched.enqueue(1);
        let mut order = Vec::new();
        sched.pump(|i| {
            order.push(i);
            true
        });
        sched.on_complete();
        sched.pump(|i| {
            order.push(i);
            true
        });
        assert_eq!(order, vec![4, 7, 1]);
    }

    #[test]
    fn enqueue_drops_duplicates() {
        let mut sched = LoadScheduler::new(1);
        assert!(sched.enqueue(5));
        assert!(!sched.enqueue(5));
        assert_eq!(sched.queued(), 1);
    }

    #[test]
    fn eager_requests_jump_the_backlog() {
        let mut sched = LoadScheduler::new(1);
        sched.enqueue(1);
        sched.enqueue(2);
        sched.enqueue_front(9);
        let mut first = None;
        sched.pump(|i| {
            first = Some(i);
            true
        });
        assert_eq!(first, Some(9));
    }

    #[test]
    fn eager_promotes_queued_background_copy() {
        let mut sched = LoadScheduler::new(3);
        sched.enqueue(1);
        sched.enqueue(2);
        sched.enqueue_front(2);
        let mut order = Vec::new();
        sched.pump(|i| {
            order.push(i);
            true
        });
        assert_eq!(order, vec![2, 1], "no duplicate dispatch of 2");
    }

    #[test]
    fn skipped_dispatch_frees_no_slot() {
        let mut sched = LoadScheduler::new(2);
        for i in 0..4 {
            sched.enqueue(i);
        }
        // Pretend 0 and 1 are already loaded: dispatch declines them and the
        // pump moves on to 2 and 3 within the same call.
        let mut started = Vec::new();
        sched.pump(|i| {
            if i < 2 {
                false
            } else {
                started.push(i);
                true
            }
        });
        assert_eq!(started, vec![2, 3]);
        assert_eq!(sched.dispatched(), 2);
    }

    #[test]
    fn pump_with_empty_queue_is_a_noop() {
        let mut sched = LoadScheduler::new(3);
        sched.pump(|_| panic!("nothing to dispatch"));
        assert_eq!(sched.dispatched(), 0);
    }
}
