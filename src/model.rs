use serde::{Deserialize, Serialize};

use crate::limits::DEFAULT_SLOTS_PER_THREAD;

/// One bit per inter-station segment. Bit `k` is travel from station `k+1` to `k+2`.
pub type Mask = u32;

/// Ticket identifier. Opaque key into the ticket directory.
pub type TicketId = u64;

/// A sold ticket. Stations, coach and seat are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub tid: TicketId,
    pub passenger: String,
    pub route: u32,
    pub coach: u32,
    pub seat: u32,
    pub departure: u32,
    pub arrival: u32,
}

/// Fixed shape of the system. Immutable once the engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub route_count: u32,
    pub coach_count: u32,
    /// Seats per coach.
    pub seat_count: u32,
    pub station_count: u32,
    pub thread_count: u32,
    /// Directory slots per thread; total directory capacity is `thread_count * slots_per_thread`.
    pub slots_per_thread: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            route_count: 5,
            coach_count: 8,
            seat_count: 100,
            station_count: 10,
            thread_count: 16,
            slots_per_thread: DEFAULT_SLOTS_PER_THREAD,
        }
    }
}

impl EngineConfig {
    pub fn new(
        route_count: u32,
        coach_count: u32,
        seat_count: u32,
        station_count: u32,
        thread_count: u32,
    ) -> Self {
        Self {
            route_count,
            coach_count,
            seat_count,
            station_count,
            thread_count,
            ..Self::default()
        }
    }

    pub fn with_slots_per_thread(mut self, slots: usize) -> Self {
        self.slots_per_thread = slots;
        self
    }

    /// Physical seats on one route.
    pub fn seats_per_route(&self) -> u64 {
        u64::from(self.coach_count) * u64::from(self.seat_count)
    }

    pub fn directory_capacity(&self) -> usize {
        (self.thread_count as usize).saturating_mul(self.slots_per_thread)
    }

    /// Flatten a 1-based `(coach, seat)` pair. `None` if either is out of range.
    pub fn seat_index(&self, coach: u32, seat: u32) -> Option<usize> {
        if coach == 0 || coach > self.coach_count || seat == 0 || seat > self.seat_count {
            return None;
        }
        Some((coach - 1) as usize * self.seat_count as usize + (seat - 1) as usize)
    }

    /// Inverse of [`seat_index`](Self::seat_index): 1-based `(coach, seat)`.
    pub fn coach_and_seat(&self, index: usize) -> (u32, u32) {
        let per_coach = self.seat_count as usize;
        ((index / per_coach) as u32 + 1, (index % per_coach) as u32 + 1)
    }

    pub fn valid_route(&self, route: u32) -> bool {
        route >= 1 && route <= self.route_count
    }

    pub fn valid_interval(&self, departure: u32, arrival: u32) -> bool {
        departure >= 1 && departure < arrival && arrival <= self.station_count
    }
}
