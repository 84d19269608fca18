//! Wall-clock access, isolated so it can be overridden by `RunOpts::now`.

pub(crate) fn wall_clock_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
