//! Fixed-width time windows used as the idempotency unit for alert events.

/// Window width in milliseconds (5 minutes).
pub const BUCKET_WIDTH_MS: i64 = 300_000;

/// Window id containing `timestamp_ms`.
pub fn bucket(timestamp_ms: i64) -> i64 {
    timestamp_ms.div_euclid(BUCKET_WIDTH_MS)
}

/// First millisecond of window `b`.
pub fn bucket_start(b: i64) -> i64 {
    b * BUCKET_WIDTH_MS
}

/// Last millisecond of window `b`.
pub fn bucket_end(b: i64) -> i64 {
    (b + 1) * BUCKET_WIDTH_MS - 1
}
