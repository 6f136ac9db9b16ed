//! Build-time protocol constants and the configuration bundle built from them

use std::time::Duration;

use crate::{MeshError, MeshResult};

/// Phase advances by one unit per tick
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Forced re-election period, independent of membership notifications
pub const ELECTION_INTERVAL: Duration = Duration::from_secs(10);

/// Controller's display-mode broadcast period
pub const MODE_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// Beacons older than this are treated as noise
pub const MAX_MESSAGE_AGE_US: u32 = 250_000;

/// Lower dead-band guard on the distance to the local wrap point
pub const DEAD_BAND_LOW: u8 = 12;

/// Upper dead-band guard on the distance to the local wrap point
pub const DEAD_BAND_HIGH: u8 = 243;

/// Consecutive clock inversions tolerated before signalling a fault
pub const CLOCK_INVERSION_THRESHOLD: u32 = 3;

/// Link faults tolerated before the transport is reinitialized
pub const LINK_FAULT_THRESHOLD: u32 = 5;

/// How a follower's phase is corrected when a beacon is accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CorrectionPolicy {
    /// Estimate how far the controller has advanced since sending
    #[default]
    Proportional,
    /// Snap straight to zero
    HardReset,
}

/// What happens to the clock-inversion counter once it crosses the threshold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InversionPolicy {
    /// Signal once, keep counting until a non-negative age is seen
    #[default]
    Latch,
    /// Signal and zero the counter
    ResetOnSignal,
}

/// Synchronization configuration.
///
/// Fixed at node construction; the defaults are the build-time constants.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub tick_interval: Duration,
    pub election_interval: Duration,
    pub mode_broadcast_interval: Duration,
    /// Staleness bound on beacons (microseconds)
    pub max_message_age_us: u32,
    /// Dead-band guards (exclusive)
    pub dead_band: (u8, u8),
    pub clock_inversion_threshold: u32,
    pub link_fault_threshold: u32,
    pub correction: CorrectionPolicy,
    pub inversion: InversionPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            tick_interval: TICK_INTERVAL,
            election_interval: ELECTION_INTERVAL,
            mode_broadcast_interval: MODE_BROADCAST_INTERVAL,
            max_message_age_us: MAX_MESSAGE_AGE_US,
            dead_band: (DEAD_BAND_LOW, DEAD_BAND_HIGH),
            clock_inversion_threshold: CLOCK_INVERSION_THRESHOLD,
            link_fault_threshold: LINK_FAULT_THRESHOLD,
            correction: CorrectionPolicy::default(),
            inversion: InversionPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Check the bundle is internally consistent
    pub fn validate(&self) -> MeshResult<()> {
        if self.tick_interval.is_zero() {
            return Err(MeshError::InvalidConfig("tick interval must be non-zero".into()));
        }
        if self.election_interval.is_zero() || self.mode_broadcast_interval.is_zero() {
            return Err(MeshError::InvalidConfig(
                "election and mode broadcast intervals must be non-zero".into(),
            ));
        }
        let (low, high) = self.dead_band;
        if low >= high {
            return Err(MeshError::InvalidConfig(format!(
                "dead-band guards out of order: {} >= {}",
                low, high
            )));
        }
        if self.max_message_age_us >= i32::MAX as u32 {
            return Err(MeshError::InvalidConfig(
                "max message age must fit the signed half of the mesh clock".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_message_age_us, 250_000);
        assert_eq!(config.dead_band, (12, 243));
        assert_eq!(config.correction, CorrectionPolicy::Proportional);
        assert_eq!(config.inversion, InversionPolicy::Latch);
    }

    #[test]
    fn test_inverted_dead_band_rejected() {
        let config = SyncConfig {
            dead_band: (200, 20),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MeshError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_tick_rejected() {
        let config = SyncConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
