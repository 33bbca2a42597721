//! Wall-clock timestamps used to stamp LWW log entries. Kept separate from
//! [`crate::platform::Platform`], whose `now()` is for registry/file
//! metadata where tests substitute a fake clock; log entry timestamps are
//! an ordering tie-breaker, not caller-visible state, so the real clock is
//! used unconditionally.

pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
