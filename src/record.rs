use std::sync::atomic::{AtomicU64, Ordering};

/// One completed timed interval, ready to be queued for serialization.
///
/// Timestamps are microseconds since the process-wide trace epoch (see
/// [`now_micros`](crate::now_micros)). `end_micros >= start_micros` is
/// expected but not enforced; both values are caller-provided.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TraceRecord {
    pub name: String,
    pub start_micros: i64,
    pub end_micros: i64,
    pub producer_id: u64,
}

impl TraceRecord {
    #[inline]
    pub fn new(
        name: impl Into<String>,
        start_micros: i64,
        end_micros: i64,
        producer_id: u64,
    ) -> TraceRecord {
        TraceRecord {
            name: name.into(),
            start_micros,
            end_micros,
            producer_id,
        }
    }
}

static NEXT_PRODUCER_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    // Allocated on first use and stable for the thread's lifetime.
    static PRODUCER_ID: u64 = NEXT_PRODUCER_ID.fetch_add(1, Ordering::Relaxed);
}

/// Numeric identifier of the calling thread, stable for the thread's
/// lifetime. It becomes the `tid` display field of the trace format and
/// carries no meaning beyond grouping records by producer.
pub fn current_producer_id() -> u64 {
    PRODUCER_ID.with(|id| *id)
}

#[cfg(test)]
mod tests {
    use super::current_producer_id;
    use std::thread;

    #[test]
    fn producer_ids_are_stable_per_thread_and_distinct_across_threads() {
        let here = current_producer_id();
        assert_eq!(here, current_producer_id());

        let other = thread::spawn(current_producer_id).join().unwrap();
        assert_ne!(here, other);
    }
}
