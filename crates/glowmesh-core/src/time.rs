//! Time primitives for glowmesh
//!
//! Two notions of time exist on a node:
//! - Mesh time: the transport's shared microsecond counter, 32-bit, wrapping
//! - Phase: the 8-bit animation counter advanced once per local tick

use std::ops::{Add, Sub};
use std::time::Duration;

/// Mesh time - shared monotonic microsecond count, wraps at 2^32
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeshTime(pub u32);

impl MeshTime {
    pub const ZERO: MeshTime = MeshTime(0);

    #[inline]
    pub fn from_micros(micros: u32) -> Self {
        MeshTime(micros)
    }

    #[inline]
    pub fn as_micros(self) -> u32 {
        self.0
    }

    /// Age of a message stamped `sent`, observed at `self`.
    ///
    /// Uses wrapping subtraction so a stamp taken just before the 2^32
    /// rollover still yields a small age afterwards.
    #[inline]
    pub fn age_since(self, sent: MeshTime) -> MessageAge {
        MessageAge(self.0.wrapping_sub(sent.0))
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        MeshTime(u32::from_le_bytes(bytes))
    }
}

impl Add<Duration> for MeshTime {
    type Output = MeshTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        MeshTime(self.0.wrapping_add(rhs.as_micros() as u32))
    }
}

impl Sub<Duration> for MeshTime {
    type Output = MeshTime;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        MeshTime(self.0.wrapping_sub(rhs.as_micros() as u32))
    }
}

impl std::fmt::Debug for MeshTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mesh({}us)", self.0)
    }
}

/// Elapsed mesh time between a send stamp and a local observation
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct MessageAge(pub u32);

impl MessageAge {
    /// Unsigned age in microseconds
    #[inline]
    pub fn as_micros(self) -> u32 {
        self.0
    }

    /// Signed reading of the same difference. Negative means the
    /// sender's stamp is ahead of the local clock.
    #[inline]
    pub fn signed_micros(self) -> i32 {
        self.0 as i32
    }

    /// True when the sender's clock appears to run ahead of ours
    #[inline]
    pub fn is_inverted(self) -> bool {
        self.signed_micros() < 0
    }

    /// Whole ticks of `tick_interval` covered by this age
    #[inline]
    pub fn as_ticks(self, tick_interval: Duration) -> u64 {
        let tick_us = tick_interval.as_micros().max(1) as u64;
        self.0 as u64 / tick_us
    }
}

/// Animation phase - 8-bit counter, wraps from 255 to 0
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Phase(pub u8);

impl Phase {
    pub const ZERO: Phase = Phase(0);
    pub const MAX: Phase = Phase(u8::MAX);

    #[inline]
    pub fn new(value: u8) -> Self {
        Phase(value)
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Distance remaining until this phase reaches its wrap point
    #[inline]
    pub fn distance_to_wrap(self) -> u8 {
        u8::MAX - self.0
    }

    /// Phase reached after `ticks` steps from zero
    #[inline]
    pub fn from_ticks(ticks: u64) -> Self {
        Phase((ticks % 256) as u8)
    }
}
