use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// roomcast epoch: 2025-01-01T00:00:00Z
const EPOCH: u64 = 1_735_689_600_000;
const SEQUENCE_BITS: u64 = 12;

/// Last issued id. Packing timestamp and sequence into one word lets a single
/// compare-exchange keep ids unique across threads.
static LAST_ID: AtomicU64 = AtomicU64::new(0);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(EPOCH)
        .saturating_sub(EPOCH)
}

/// Next time-ordered id. Strictly increasing within the process; if the clock
/// steps backwards ids keep counting from the last one issued.
pub fn next_id() -> u64 {
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = (now_ms() << SEQUENCE_BITS).max(last + 1);
        match LAST_ID.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

pub fn generate() -> String {
    next_id().to_string()
}

/// Unix milliseconds encoded in an id.
pub fn timestamp_of(id: &str) -> Option<u64> {
    let num: u64 = id.parse().ok()?;
    Some((num >> SEQUENCE_BITS) + EPOCH)
}
