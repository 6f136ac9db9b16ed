//! Chaos links for the mesh simulator
//!
//! Each directed link between two nodes degrades broadcast delivery:
//! - Latency with jitter
//! - Random and burst loss
//! - Reordering (a held-back datagram lands after later ones)
//! - Duplication

use std::time::Duration;

use bytes::Bytes;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Jitter distribution type
#[derive(Clone, Debug)]
pub enum JitterDistribution {
    None,
    Uniform { min_ms: u32, max_ms: u32 },
    /// Heavy tail, capped at `cap_ms`
    Pareto { scale_ms: f64, shape: f64, cap_ms: f64 },
}

impl JitterDistribution {
    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        match *self {
            JitterDistribution::None => Duration::ZERO,
            JitterDistribution::Uniform { min_ms, max_ms } => {
                let dist = Uniform::new_inclusive(min_ms, max_ms.max(min_ms));
                Duration::from_millis(dist.sample(rng) as u64)
            }
            JitterDistribution::Pareto {
                scale_ms,
                shape,
                cap_ms,
            } => {
                let u: f64 = rng.gen_range(f64::EPSILON..1.0);
                let value = scale_ms / u.powf(1.0 / shape) - scale_ms;
                Duration::from_micros((value.min(cap_ms) * 1_000.0) as u64)
            }
        }
    }
}

/// Link degradation parameters
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    pub base_latency: Duration,
    pub jitter: JitterDistribution,
    /// Independent loss probability
    pub loss_rate: f64,
    /// Probability that a send starts a loss burst
    pub burst_loss_prob: f64,
    /// Burst length range, in datagrams
    pub burst_length: (u32, u32),
    /// Probability a datagram is held back
    pub reorder_prob: f64,
    /// Extra delay for held-back datagrams
    pub reorder_delay: Duration,
    pub duplicate_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self::good()
    }
}

impl ChaosConfig {
    /// Fixed small latency, nothing lost
    pub fn perfect() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(2),
            jitter: JitterDistribution::None,
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            reorder_prob: 0.0,
            reorder_delay: Duration::ZERO,
            duplicate_prob: 0.0,
        }
    }

    /// Quiet radio environment
    pub fn good() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(5),
            jitter: JitterDistribution::Uniform { min_ms: 0, max_ms: 5 },
            loss_rate: 0.01,
            burst_loss_prob: 0.005,
            burst_length: (1, 3),
            reorder_prob: 0.01,
            reorder_delay: Duration::from_millis(15),
            duplicate_prob: 0.005,
        }
    }

    /// Crowded radio environment
    pub fn lossy() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(20),
            jitter: JitterDistribution::Pareto {
                scale_ms: 10.0,
                shape: 1.5,
                cap_ms: 500.0,
            },
            loss_rate: 0.1,
            burst_loss_prob: 0.05,
            burst_length: (2, 6),
            reorder_prob: 0.1,
            reorder_delay: Duration::from_millis(40),
            duplicate_prob: 0.05,
        }
    }

    /// Barely working mesh; many beacons arrive stale
    pub fn hostile() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(80),
            jitter: JitterDistribution::Pareto {
                scale_ms: 40.0,
                shape: 1.2,
                cap_ms: 1_000.0,
            },
            loss_rate: 0.25,
            burst_loss_prob: 0.1,
            burst_length: (3, 10),
            reorder_prob: 0.2,
            reorder_delay: Duration::from_millis(100),
            duplicate_prob: 0.1,
        }
    }
}

#[derive(Clone, Debug)]
struct InFlight {
    payload: Bytes,
    deliver_at: Duration,
    sent_at: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct ChaosStats {
    pub sent: u64,
    pub delivered: u64,
    pub lost: u64,
    pub reordered: u64,
    pub duplicated: u64,
    pub total_latency_us: u64,
    pub max_latency: Duration,
}

impl ChaosStats {
    pub fn loss_rate(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.lost as f64 / self.sent as f64
        }
    }

    pub fn avg_latency(&self) -> Duration {
        if self.delivered == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.total_latency_us / self.delivered)
        }
    }
}

/// One directed, seeded, degraded link
pub struct ChaosNetwork {
    config: ChaosConfig,
    rng: StdRng,
    /// Sorted by delivery time; equal times keep send order
    in_flight: Vec<InFlight>,
    now: Duration,
    burst_remaining: u32,
    stats: ChaosStats,
}

impl ChaosNetwork {
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        ChaosNetwork {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: Vec::new(),
            now: Duration::ZERO,
            burst_remaining: 0,
            stats: ChaosStats::default(),
        }
    }

    pub fn send(&mut self, payload: Bytes) {
        self.stats.sent += 1;
        if self.should_drop() {
            self.stats.lost += 1;
            return;
        }

        let mut delay = self.config.base_latency + self.config.jitter.sample(&mut self.rng);
        if self.rng.gen_bool(self.config.reorder_prob) {
            delay += self.config.reorder_delay;
            self.stats.reordered += 1;
        }
        self.schedule(payload.clone(), delay);

        if self.rng.gen_bool(self.config.duplicate_prob) {
            let extra = self.config.jitter.sample(&mut self.rng);
            self.schedule(payload, delay + extra);
            self.stats.duplicated += 1;
        }
    }

    fn schedule(&mut self, payload: Bytes, delay: Duration) {
        let deliver_at = self.now + delay;
        let pos = self.in_flight.partition_point(|p| p.deliver_at <= deliver_at);
        self.in_flight.insert(
            pos,
            InFlight {
                payload,
                deliver_at,
                sent_at: self.now,
            },
        );
    }

    fn should_drop(&mut self) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }
        if self.rng.gen_bool(self.config.burst_loss_prob) {
            let (min, max) = self.config.burst_length;
            self.burst_remaining = self.rng.gen_range(min..=max.max(min));
            return true;
        }
        self.rng.gen_bool(self.config.loss_rate)
    }

    /// Advance to `now` and return everything due, in delivery order
    pub fn advance_to(&mut self, now: Duration) -> Vec<Bytes> {
        self.now = self.now.max(now);
        let due = self.in_flight.partition_point(|p| p.deliver_at <= self.now);

        self.in_flight
            .drain(..due)
            .map(|packet| {
                let latency = packet.deliver_at - packet.sent_at;
                self.stats.delivered += 1;
                self.stats.total_latency_us += latency.as_micros() as u64;
                self.stats.max_latency = self.stats.max_latency.max(latency);
                packet.payload
            })
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    pub fn now(&self) -> Duration {
        self.now
    }
}
