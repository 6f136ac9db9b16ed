//! End-to-end scenarios over the mesh simulator
//!
//! Each scenario boots real nodes, runs them in virtual time and hands
//! back either a summary or the simulator itself for closer inspection:
//! - Election and display-mode replication across a mesh
//! - Phase convergence of late joiners, including across clock rollover
//! - Stale and clock-inverted beacons
//! - Controller dropout and rejoin
//! - Link faults escalating to a transport reset

use std::time::Duration;

use glowmesh_core::{DisplayMode, LinkStatus, MeshResult, NodeId};

use crate::chaos::{ChaosConfig, ChaosStats};
use crate::simulator::{MeshSimulator, ScenarioBuilder};

// ============================================================================
// SCENARIO REPORT
// ============================================================================

/// Snapshot of a mesh at the end of a scenario
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    /// Online nodes that believe they are controller
    pub controllers: Vec<NodeId>,
    /// Largest circular phase distance between online nodes
    pub phase_spread: u8,
    /// Every online node shows the Connected pattern
    pub all_connected: bool,
    pub links: ChaosStats,
}

impl ScenarioReport {
    pub fn capture(sim: &MeshSimulator) -> Self {
        let all_connected = sim
            .online_ids()
            .into_iter()
            .all(|id| sim.display_mode(id.0) == Some(DisplayMode::Connected));

        ScenarioReport {
            controllers: sim.controllers(),
            phase_spread: sim.phase_spread(),
            all_connected,
            links: sim.link_totals(),
        }
    }

    /// Exactly one controller and phases within `tolerance` of each other
    pub fn converged(&self, tolerance: u8) -> bool {
        self.controllers.len() == 1 && self.phase_spread <= tolerance
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// Boot `ids` together, connect them all and run for `duration`
pub fn run_mesh(ids: &[u32], chaos: ChaosConfig, seed: u64, duration: Duration) -> MeshResult<ScenarioReport> {
    let mut sim = ScenarioBuilder::new()
        .with_nodes(ids)
        .with_chaos(chaos)
        .with_seed(seed)
        .build()?;
    sim.run_for(duration);
    Ok(ScenarioReport::capture(&sim))
}

/// A node that boots after the founders and has to be pulled into phase
#[derive(Clone, Debug)]
pub struct LateJoin {
    pub founders: Vec<u32>,
    pub joiner: u32,
    pub join_at: Duration,
    /// Skew of the joiner's mesh clock
    pub joiner_offset_us: i64,
    pub mesh_epoch: u32,
    pub chaos: ChaosConfig,
    pub seed: u64,
    /// How long to run after the join
    pub run_for: Duration,
}

impl Default for LateJoin {
    fn default() -> Self {
        LateJoin {
            founders: vec![2, 5],
            joiner: 9,
            // Lands the joiner about half a cycle away from the founders
            join_at: Duration::from_millis(1_230),
            joiner_offset_us: 0,
            mesh_epoch: 0,
            chaos: ChaosConfig::perfect(),
            seed: 0,
            run_for: Duration::from_secs(6),
        }
    }
}

pub fn run_late_join(scenario: &LateJoin) -> MeshResult<MeshSimulator> {
    let mut sim = ScenarioBuilder::new()
        .with_nodes(&scenario.founders)
        .with_chaos(scenario.chaos.clone())
        .with_seed(scenario.seed)
        .with_mesh_epoch(scenario.mesh_epoch)
        .build()?;
    sim.run_for(scenario.join_at);

    sim.add_node(scenario.joiner)?;
    sim.set_clock_offset(scenario.joiner, scenario.joiner_offset_us);
    sim.connect_all();
    sim.run_for(scenario.run_for);
    Ok(sim)
}

/// Controller 2 with follower 5, whose mesh clock runs `offset_us` off
pub fn run_skewed_follower(offset_us: i64, duration: Duration) -> MeshResult<MeshSimulator> {
    let mut sim = ScenarioBuilder::new().with_nodes(&[2, 5]).build()?;
    sim.set_clock_offset(5, offset_us);
    sim.run_for(duration);
    Ok(sim)
}

/// Nodes 2, 5 and 9 settle, then the controller goes off the air
pub fn run_controller_dropout() -> MeshResult<MeshSimulator> {
    let mut sim = ScenarioBuilder::new().with_nodes(&[2, 5, 9]).build()?;
    sim.run_for(Duration::from_secs(3));
    sim.set_online(2, false);
    sim.run_for(Duration::from_secs(3));
    Ok(sim)
}

/// Follower 5 reports its link down while the controller keeps talking
pub fn run_link_fault(duration: Duration) -> MeshResult<MeshSimulator> {
    let mut sim = ScenarioBuilder::new().with_nodes(&[2, 5]).build()?;
    sim.set_link_status(5, LinkStatus::Down);
    sim.set_link_status(2, LinkStatus::Down);
    sim.run_for(duration);
    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::phase_distance;
    use proptest::prelude::*;

    fn secs(v: u64) -> Duration {
        Duration::from_secs(v)
    }

    #[test]
    fn test_lowest_id_controls_and_mode_replicates() {
        let report = run_mesh(&[5, 2, 9], ChaosConfig::perfect(), 0, secs(2)).unwrap();
        assert_eq!(report.controllers, vec![NodeId::new(2)]);
        assert!(report.all_connected);
        assert!(report.converged(0));
    }

    #[test]
    fn test_lonely_node_stays_quiet() {
        let report = run_mesh(&[4], ChaosConfig::perfect(), 0, secs(5)).unwrap();
        assert_eq!(report.controllers, vec![NodeId::new(4)]);
        assert!(!report.all_connected);
        assert_eq!(report.links.sent, 0);
    }

    #[test]
    fn test_followers_wait_for_mode_update() {
        let mut sim = ScenarioBuilder::new().with_nodes(&[2, 5]).build().unwrap();
        sim.run_for(Duration::from_millis(500));
        // Controller goes Connected on election, the follower only on replication
        assert_eq!(sim.display_mode(2), Some(DisplayMode::Connected));
        assert_eq!(sim.display_mode(5), Some(DisplayMode::Alone));

        sim.run_for(secs(1));
        assert_eq!(sim.display_mode(5), Some(DisplayMode::Connected));
    }

    #[test]
    fn test_late_joiner_is_pulled_into_phase() {
        let sim = run_late_join(&LateJoin::default()).unwrap();
        let joiner = sim.node(9).unwrap();
        assert!(joiner.coordinator().stats().beacons_applied >= 1);
        assert_eq!(joiner.current_display_mode(), DisplayMode::Connected);

        let report = ScenarioReport::capture(&sim);
        assert_eq!(report.controllers, vec![NodeId::new(2)]);
        assert!(report.converged(2), "spread {}", report.phase_spread);
    }

    #[test]
    fn test_convergence_across_clock_rollover() {
        // The shared clock wraps between the first beacon's stamp and its arrival
        let scenario = LateJoin {
            mesh_epoch: u32::MAX - 2_569_999,
            ..Default::default()
        };
        let sim = run_late_join(&scenario).unwrap();
        let joiner = sim.node(9).unwrap();
        assert!(joiner.coordinator().stats().beacons_applied >= 1);
        assert_eq!(joiner.coordinator().state().anomalies().clock_inversion_count, 0);
        assert!(sim.phase_spread() <= 2);
    }

    #[test]
    fn test_stale_beacons_leave_joiner_alone() {
        let scenario = LateJoin {
            joiner_offset_us: 300_000,
            ..Default::default()
        };
        let sim = run_late_join(&scenario).unwrap();
        let joiner = sim.node(9).unwrap();
        let stats = joiner.coordinator().stats();
        assert_eq!(stats.beacons_applied, 0);
        assert_eq!(stats.beacons_discarded, 2);

        let apart = phase_distance(sim.phase(2).unwrap(), sim.phase(9).unwrap());
        assert!(apart > 100, "phases {} apart", apart);
    }

    #[test]
    fn test_clock_inversion_signals_once() {
        let sim = run_skewed_follower(-100_000, secs(12)).unwrap();
        let follower = sim.node(5).unwrap();
        let anomalies = follower.coordinator().state().anomalies();
        assert_eq!(anomalies.clock_inversion_count, 4);
        assert_eq!(anomalies.clock_fault_signals, 1);

        let stats = follower.coordinator().stats();
        assert_eq!(stats.beacons_applied, 0);
        assert_eq!(stats.beacons_discarded, 4);
    }

    #[test]
    fn test_clock_ahead_makes_beacons_stale() {
        let sim = run_skewed_follower(300_000, secs(6)).unwrap();
        let follower = sim.node(5).unwrap();
        assert_eq!(follower.coordinator().stats().beacons_discarded, 2);
        assert_eq!(follower.coordinator().state().anomalies().clock_inversion_count, 0);
    }

    #[test]
    fn test_controller_dropout_and_rejoin() {
        let mut sim = run_controller_dropout().unwrap();
        assert_eq!(sim.controllers(), vec![NodeId::new(5)]);
        assert_eq!(
            sim.node(9).unwrap().coordinator().state().known_controller(),
            NodeId::new(5)
        );
        assert_eq!(sim.display_mode(5), Some(DisplayMode::Connected));

        let dropped = sim.node(2).unwrap();
        assert!(dropped.is_controller());
        assert_eq!(dropped.current_display_mode(), DisplayMode::Alone);

        sim.set_online(2, true);
        sim.step();
        assert_eq!(sim.controllers(), vec![NodeId::new(2)]);
        assert_eq!(sim.display_mode(9), Some(DisplayMode::Connected));
    }

    #[test]
    fn test_orphan_only_view_elects_self() {
        let mut sim = ScenarioBuilder::new().with_nodes(&[2, 5]).build().unwrap();
        sim.step();
        assert!(!sim.node(5).unwrap().is_controller());

        sim.set_membership(5, vec![NodeId::ORPHAN, NodeId::ORPHAN]);
        sim.step();

        let node = sim.node(5).unwrap();
        assert!(node.is_controller());
        assert_eq!(node.current_display_mode(), DisplayMode::Alone);
        assert_eq!(node.coordinator().state().anomalies().orphan_entries, 2);
    }

    #[test]
    fn test_link_fault_resets_transport_once() {
        let sim = run_link_fault(secs(61)).unwrap();

        let follower = sim.node(5).unwrap();
        assert_eq!(follower.transport().resets(), 1);
        assert_eq!(follower.stats().transport_resets, 1);
        assert_eq!(follower.coordinator().state().anomalies().link_fault_count, 0);

        // Followers never talk, so the controller's down link carries no traffic
        assert_eq!(sim.node(2).unwrap().transport().resets(), 0);
    }

    #[test]
    fn test_lossy_mesh_holds_together() {
        let report = run_mesh(&[11, 3, 20, 8], ChaosConfig::lossy(), 7, secs(60)).unwrap();
        assert_eq!(report.controllers, vec![NodeId::new(3)]);
        assert!(report.links.lost > 0);
        assert!(report.all_connected);
        assert!(report.converged(3), "spread {}", report.phase_spread);
    }

    #[test]
    fn test_hostile_mesh_keeps_one_controller() {
        let report = run_mesh(&[40, 12, 33], ChaosConfig::hostile(), 99, secs(30)).unwrap();
        assert_eq!(report.controllers, vec![NodeId::new(12)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_lowest_id_is_sole_controller(ids in proptest::collection::hash_set(1u32..100_000, 1..8)) {
            let ids: Vec<u32> = ids.into_iter().collect();
            let mut sim = ScenarioBuilder::new().with_nodes(&ids).build().unwrap();
            sim.step();

            let lowest = NodeId::new(*ids.iter().min().unwrap());
            prop_assert_eq!(sim.controllers(), vec![lowest]);
            for id in &ids {
                let node = sim.node(*id).unwrap();
                prop_assert_eq!(node.coordinator().state().known_controller(), lowest);
            }
        }
    }
}
