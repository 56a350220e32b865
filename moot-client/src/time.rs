use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock unix milliseconds, the timestamp unit used by every mailbox
/// document.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
