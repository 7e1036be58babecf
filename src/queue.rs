use crate::record::TraceRecord;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// FIFO buffer between producer threads and the single writer thread.
///
/// Producers only ever append; the writer only ever drains, one record at a
/// time. The shutdown flag lives under the same lock as the buffer so the
/// writer's wait predicate ("record available or shutdown requested") cannot
/// miss a wakeup.
pub(crate) struct EventQueue {
    state: Mutex<Inner>,
    work_available: Condvar,
}

struct Inner {
    records: VecDeque<TraceRecord>,
    shutdown: bool,
    shutdown_start_micros: i64,
}

impl EventQueue {
    pub fn new() -> EventQueue {
        EventQueue {
            state: Mutex::new(Inner {
                records: VecDeque::new(),
                shutdown: false,
                shutdown_start_micros: 0,
            }),
            work_available: Condvar::new(),
        }
    }

    /// Appends one record to the tail. Never blocks the caller beyond the
    /// lock's hold time.
    pub fn push(&self, record: TraceRecord) {
        self.state.lock().records.push_back(record);
        self.work_available.notify_one();
    }

    /// Removes and returns the head record, blocking while the queue is empty
    /// and no shutdown has been requested. Returns `None` only once shutdown
    /// has been requested *and* every pending record has been handed out.
    pub fn recv(&self) -> Option<TraceRecord> {
        let mut state = self.state.lock();
        loop {
            if let Some(record) = state.records.pop_front() {
                return Some(record);
            }
            if state.shutdown {
                return None;
            }
            self.work_available.wait(&mut state);
        }
    }

    /// Flags shutdown and wakes the writer. `at_micros` marks the instant the
    /// session began tearing down; the writer stamps it onto the synthetic
    /// closing record.
    pub fn request_shutdown(&self, at_micros: i64) {
        let mut state = self.state.lock();
        state.shutdown = true;
        state.shutdown_start_micros = at_micros;
        if !state.records.is_empty() {
            log::debug!(
                "shutdown requested with {} trace records still queued",
                state.records.len()
            );
        }
        drop(state);
        self.work_available.notify_one();
    }

    pub fn shutdown_start_micros(&self) -> i64 {
        self.state.lock().shutdown_start_micros
    }

    /// Clears the shutdown flag so the queue can serve another session.
    /// Only valid while no writer thread is attached.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if !state.records.is_empty() {
            log::warn!(
                "dropping {} stale records left over from a previous session",
                state.records.len()
            );
            state.records.clear();
        }
        state.shutdown = false;
        state.shutdown_start_micros = 0;
    }

    /// Drops any records still queued and returns how many there were.
    pub fn discard_pending(&self) -> usize {
        let mut state = self.state.lock();
        let pending = state.records.len();
        state.records.clear();
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::EventQueue;
    use crate::record::TraceRecord;
    use std::sync::Arc;
    use std::thread;

    fn record(name: &str) -> TraceRecord {
        TraceRecord::new(name, 0, 1, 0)
    }

    #[test]
    fn records_come_out_in_push_order() {
        let queue = EventQueue::new();
        queue.push(record("a"));
        queue.push(record("b"));
        queue.push(record("c"));

        assert_eq!(queue.recv().unwrap().name, "a");
        assert_eq!(queue.recv().unwrap().name, "b");
        assert_eq!(queue.recv().unwrap().name, "c");
    }

    #[test]
    fn pending_records_drain_before_shutdown_is_observed() {
        let queue = EventQueue::new();
        queue.push(record("a"));
        queue.push(record("b"));
        queue.request_shutdown(7);

        assert_eq!(queue.recv().unwrap().name, "a");
        assert_eq!(queue.recv().unwrap().name, "b");
        assert!(queue.recv().is_none());
        assert_eq!(queue.shutdown_start_micros(), 7);
    }

    #[test]
    fn blocked_receiver_sees_every_record_pushed_before_shutdown() {
        let queue = Arc::new(EventQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut received = 0;
                while queue.recv().is_some() {
                    received += 1;
                }
                received
            })
        };

        for i in 0..100 {
            queue.push(record(&format!("r{}", i)));
        }
        queue.request_shutdown(0);

        assert_eq!(consumer.join().unwrap(), 100);
    }

    #[test]
    fn reset_clears_shutdown_for_the_next_session() {
        let queue = EventQueue::new();
        queue.request_shutdown(42);
        assert!(queue.recv().is_none());

        queue.reset();
        assert_eq!(queue.shutdown_start_micros(), 0);
        queue.push(record("next"));
        assert_eq!(queue.recv().unwrap().name, "next");
    }
}
