//! Remaining-time estimation from elapsed time and percent complete

use super::registry::JobSnapshot;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Estimate minutes until completion
///
/// Assumes a constant rate: the total duration is extrapolated from the time
/// it took to reach `percent`. Returns 0 when no progress has been made yet.
pub fn estimate_remaining_minutes(started_at_ms: i64, percent: u8, now_ms: i64) -> u32 {
    if percent == 0 {
        return 0;
    }

    let elapsed_minutes = (now_ms - started_at_ms).max(0) as f64 / MILLIS_PER_MINUTE;
    let estimated_total = elapsed_minutes / f64::from(percent) * 100.0;
    (estimated_total - elapsed_minutes).round().max(0.0) as u32
}

impl JobSnapshot {
    /// ETA for this job as of `now_ms`
    pub fn eta_minutes(&self, now_ms: i64) -> u32 {
        estimate_remaining_minutes(self.started_at.timestamp_millis(), self.percent, now_ms)
    }
}
