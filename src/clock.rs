use std::sync::OnceLock;
use std::time::Instant;

fn trace_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Microseconds elapsed since the process-wide trace epoch.
///
/// The epoch is anchored the first time any timestamp is taken, so absolute
/// values are arbitrary; only differences between them are meaningful. Trace
/// viewers treat the `ts` field as authoritative and do not care where zero
/// lies.
pub fn now_micros() -> i64 {
    trace_epoch().elapsed().as_micros() as i64
}

#[cfg(test)]
mod tests {
    use super::now_micros;

    #[test]
    fn timestamps_never_go_backwards() {
        let a = now_micros();
        let b = now_micros();
        assert!(b >= a);
    }
}
