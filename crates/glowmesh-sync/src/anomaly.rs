//! Anomaly tracking for faults the discard-and-continue paths cannot heal
//!
//! Three sources are watched:
//! - Orphan entries in membership snapshots (counted, never fatal)
//! - Clock inversions on accepted-sender beacons (soft signal, logged)
//! - Link faults: transport reports Down while traffic still flows
//!   (hard action: transport reinitialization)

use glowmesh_core::{InversionPolicy, LinkStatus, SyncConfig};
use tracing::{debug, warn};

use crate::MembershipView;

/// Fault counters owned by the node state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnomalyCounters {
    /// Consecutive beacons whose stamp was ahead of the local clock
    pub clock_inversion_count: u32,
    /// Link faults since the last transport reset
    pub link_fault_count: u32,
    /// Orphan membership entries seen, cumulative
    pub orphan_entries: u64,
    /// Clock-inversion threshold crossings, cumulative
    pub clock_fault_signals: u64,
    /// Transport reinitializations requested, cumulative
    pub transport_resets: u64,
    /// Clock adjustments reported by the transport, cumulative
    pub clock_adjustments: u64,
    pub last_clock_offset: Option<i32>,
}

/// One link-layer observation, taken once per election cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkSample {
    pub status: LinkStatus,
    /// Whether any message arrived since the previous sample
    pub traffic_seen: bool,
}

impl LinkSample {
    /// Down while still exchanging traffic
    pub fn is_fault(&self) -> bool {
        self.status.is_down() && self.traffic_seen
    }
}

/// Outcome of a link sample
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkVerdict {
    Healthy,
    Fault { count: u32 },
    /// Threshold exceeded; the transport must be torn down and rebuilt
    ResetTransport,
}

/// Threshold policy over the anomaly counters
#[derive(Clone, Debug)]
pub struct AnomalyMonitor {
    inversion_threshold: u32,
    link_fault_threshold: u32,
    inversion_policy: InversionPolicy,
}

impl AnomalyMonitor {
    pub fn new(config: &SyncConfig) -> Self {
        AnomalyMonitor {
            inversion_threshold: config.clock_inversion_threshold,
            link_fault_threshold: config.link_fault_threshold,
            inversion_policy: config.inversion,
        }
    }

    pub fn record_orphans(&self, counters: &mut AnomalyCounters, membership: &MembershipView) {
        let orphans = membership.orphans();
        if orphans > 0 {
            counters.orphan_entries += orphans as u64;
            debug!(orphans, total = counters.orphan_entries, "orphan membership entries filtered");
        }
    }

    /// Count a clock inversion. Returns true when this one crosses the threshold.
    pub fn record_inversion(&self, counters: &mut AnomalyCounters) -> bool {
        counters.clock_inversion_count = counters.clock_inversion_count.saturating_add(1);
        let count = counters.clock_inversion_count;

        let signal = match self.inversion_policy {
            InversionPolicy::Latch => count == self.inversion_threshold.saturating_add(1),
            InversionPolicy::ResetOnSignal => count > self.inversion_threshold,
        };

        if signal {
            counters.clock_fault_signals += 1;
            warn!(
                consecutive = count,
                threshold = self.inversion_threshold,
                "mesh clock inversion threshold exceeded"
            );
            if self.inversion_policy == InversionPolicy::ResetOnSignal {
                counters.clock_inversion_count = 0;
            }
        }

        signal
    }

    /// A non-negative beacon age breaks the inversion streak
    pub fn clear_inversions(&self, counters: &mut AnomalyCounters) {
        counters.clock_inversion_count = 0;
    }

    pub fn sample_link(&self, counters: &mut AnomalyCounters, sample: LinkSample) -> LinkVerdict {
        if !sample.is_fault() {
            return LinkVerdict::Healthy;
        }

        counters.link_fault_count = counters.link_fault_count.saturating_add(1);
        if counters.link_fault_count > self.link_fault_threshold {
            warn!(
                faults = counters.link_fault_count,
                threshold = self.link_fault_threshold,
                "link reports down while traffic flows, reinitializing transport"
            );
            counters.link_fault_count = 0;
            counters.transport_resets += 1;
            LinkVerdict::ResetTransport
        } else {
            debug!(faults = counters.link_fault_count, "link fault sampled");
            LinkVerdict::Fault {
                count: counters.link_fault_count,
            }
        }
    }

    pub fn record_clock_adjusted(&self, counters: &mut AnomalyCounters, offset: i32) {
        counters.clock_adjustments += 1;
        counters.last_clock_offset = Some(offset);
        debug!(offset, "mesh clock adjusted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glowmesh_core::NodeId;

    fn monitor(policy: InversionPolicy) -> AnomalyMonitor {
        AnomalyMonitor::new(&SyncConfig {
            inversion: policy,
            ..Default::default()
        })
    }

    #[test]
    fn test_latch_signals_once_past_threshold() {
        let monitor = monitor(InversionPolicy::Latch);
        let mut c = AnomalyCounters::default();

        let signals: Vec<bool> = (0..6).map(|_| monitor.record_inversion(&mut c)).collect();
        assert_eq!(signals, vec![false, false, false, true, false, false]);
        assert_eq!(c.clock_inversion_count, 6);
        assert_eq!(c.clock_fault_signals, 1);

        monitor.clear_inversions(&mut c);
        assert_eq!(c.clock_inversion_count, 0);
    }

    #[test]
    fn test_reset_on_signal_policy() {
        let monitor = monitor(InversionPolicy::ResetOnSignal);
        let mut c = AnomalyCounters::default();

        let signals: Vec<bool> = (0..8).map(|_| monitor.record_inversion(&mut c)).collect();
        assert_eq!(signals, vec![false, false, false, true, false, false, false, true]);
        assert_eq!(c.clock_inversion_count, 0);
        assert_eq!(c.clock_fault_signals, 2);
    }

    #[test]
    fn test_sporadic_inversions_do_not_accumulate() {
        let monitor = monitor(InversionPolicy::Latch);
        let mut c = AnomalyCounters::default();
        for _ in 0..10 {
            assert!(!monitor.record_inversion(&mut c));
            assert!(!monitor.record_inversion(&mut c));
            monitor.clear_inversions(&mut c);
        }
        assert_eq!(c.clock_fault_signals, 0);
    }

    #[test]
    fn test_link_reset_after_threshold() {
        let monitor = monitor(InversionPolicy::Latch);
        let mut c = AnomalyCounters::default();
        let fault = LinkSample {
            status: LinkStatus::Down,
            traffic_seen: true,
        };

        for i in 1..=5 {
            assert_eq!(monitor.sample_link(&mut c, fault), LinkVerdict::Fault { count: i });
        }
        assert_eq!(monitor.sample_link(&mut c, fault), LinkVerdict::ResetTransport);
        assert_eq!(c.link_fault_count, 0);
        assert_eq!(c.transport_resets, 1);
    }

    #[test]
    fn test_down_without_traffic_is_not_a_fault() {
        let monitor = monitor(InversionPolicy::Latch);
        let mut c = AnomalyCounters::default();
        let quiet = LinkSample {
            status: LinkStatus::Down,
            traffic_seen: false,
        };
        let healthy = LinkSample {
            status: LinkStatus::Up,
            traffic_seen: true,
        };
        assert_eq!(monitor.sample_link(&mut c, quiet), LinkVerdict::Healthy);
        assert_eq!(monitor.sample_link(&mut c, healthy), LinkVerdict::Healthy);
        assert_eq!(c.link_fault_count, 0);
    }

    #[test]
    fn test_orphans_and_clock_adjust_recorded() {
        let monitor = monitor(InversionPolicy::Latch);
        let mut c = AnomalyCounters::default();
        let view = MembershipView::from_snapshot(vec![NodeId::ORPHAN, NodeId::new(3), NodeId::ORPHAN]);
        monitor.record_orphans(&mut c, &view);
        assert_eq!(c.orphan_entries, 2);

        monitor.record_clock_adjusted(&mut c, -420);
        assert_eq!(c.clock_adjustments, 1);
        assert_eq!(c.last_clock_offset, Some(-420));
    }
}
