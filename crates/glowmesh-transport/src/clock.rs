//! Mesh clock - microsecond counter shared across nodes
//!
//! Anchored to wall-clock time so that nodes on a time-synchronized LAN
//! read roughly the same value, and advanced by the monotonic clock
//! between anchors. When the wall clock is stepped the clock re-anchors
//! and reports the offset.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use glowmesh_core::MeshTime;
use tracing::debug;

/// Default drift tolerated before re-anchoring
pub const DEFAULT_ADJUST_TOLERANCE: Duration = Duration::from_millis(2);

#[derive(Clone, Debug)]
pub struct MeshClock {
    anchor_wall_us: u64,
    anchor: Instant,
    tolerance: Duration,
}

impl MeshClock {
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_ADJUST_TOLERANCE)
    }

    pub fn with_tolerance(tolerance: Duration) -> Self {
        MeshClock {
            anchor_wall_us: wall_micros(),
            anchor: Instant::now(),
            tolerance,
        }
    }

    fn monotonic_micros(&self) -> u64 {
        self.anchor_wall_us
            .wrapping_add(self.anchor.elapsed().as_micros() as u64)
    }

    /// Current mesh time (truncated to 32 bits, wraps)
    pub fn now(&self) -> MeshTime {
        MeshTime::from_micros(self.monotonic_micros() as u32)
    }

    /// Compare against the wall clock. Re-anchors and returns the offset
    /// when they disagree by more than the tolerance.
    pub fn check_adjust(&mut self) -> Option<i32> {
        let wall = wall_micros();
        let offset = wall as i64 - self.monotonic_micros() as i64;
        if offset.unsigned_abs() <= self.tolerance.as_micros() as u64 {
            return None;
        }

        self.anchor_wall_us = wall;
        self.anchor = Instant::now();
        let offset = offset.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        debug!(offset, "mesh clock re-anchored");
        Some(offset)
    }
}

impl Default for MeshClock {
    fn default() -> Self {
        Self::new()
    }
}

fn wall_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let clock = MeshClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now();
        assert!(b.age_since(a).as_micros() >= 2_000);
        assert!(!b.age_since(a).is_inverted());
    }

    #[test]
    fn test_stepped_anchor_reports_offset() {
        let mut clock = MeshClock::with_tolerance(Duration::from_millis(1));
        // Pretend the wall clock was one second behind when anchored
        clock.anchor_wall_us -= 1_000_000;
        let offset = clock.check_adjust().unwrap();
        assert!((999_000..=1_001_000).contains(&offset));
        assert_eq!(clock.check_adjust(), None);
    }
}
