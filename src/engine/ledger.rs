use std::sync::atomic::{AtomicU32, Ordering};

use crate::model::Mask;

use super::interval::overlaps;

/// One seat's occupancy word on its own cache line, so CAS traffic on
/// neighbouring seats does not bounce the same line between cores.
#[repr(C, align(64))]
#[derive(Debug, Default)]
struct SeatWord(AtomicU32);

/// Per-seat occupancy bitmaps for every route, stored flat:
/// route `r` (zero-based) owns `words[r * seats .. (r + 1) * seats]`.
///
/// Words only grow by OR on a claim and only shrink by AND-NOT on release.
#[derive(Debug)]
pub struct SeatLedger {
    words: Box<[SeatWord]>,
    seats: usize,
}

impl SeatLedger {
    pub fn new(routes: usize, seats: usize) -> Self {
        let words = (0..routes * seats).map(|_| SeatWord::default()).collect();
        Self { words, seats }
    }

    pub fn seats_per_route(&self) -> usize {
        self.seats
    }

    fn row(&self, route: usize) -> &[SeatWord] {
        &self.words[route * self.seats..(route + 1) * self.seats]
    }

    /// Linear-probe from `start`, wrapping once, and CAS `mask` into the first
    /// seat that has none of its bits. Returns the claimed seat index.
    ///
    /// A failed CAS means the seat changed under us; it is re-read and retried
    /// until it either accepts the claim or becomes unusable.
    pub fn claim(&self, route: usize, start: usize, mask: Mask) -> Option<usize> {
        let row = self.row(route);
        let mut index = start;
        loop {
            let word = &row[index].0;
            let mut current = word.load(Ordering::Acquire);
            while !overlaps(current, mask) {
                match word.compare_exchange_weak(
                    current,
                    current | mask,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Some(index),
                    Err(actual) => {
                        metrics::counter!(crate::observability::CAS_RETRIES_TOTAL).increment(1);
                        current = actual;
                    }
                }
            }
            index += 1;
            if index == row.len() {
                index = 0;
            }
            if index == start {
                return None;
            }
        }
    }

    /// Seats whose occupancy does not intersect `mask`. One load per seat and no
    /// cross-seat atomicity, so the count may already be stale when returned.
    pub fn available(&self, route: usize, mask: Mask) -> usize {
        self.row(route)
            .iter()
            .filter(|w| !overlaps(w.0.load(Ordering::Acquire), mask))
            .count()
    }

    /// Clear `mask` from a seat. Retries until the CAS lands.
    pub fn release(&self, route: usize, seat: usize, mask: Mask) {
        let word = &self.row(route)[seat].0;
        let mut current = word.load(Ordering::Acquire);
        loop {
            match word.compare_exchange_weak(
                current,
                current & !mask,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    metrics::counter!(crate::observability::CAS_RETRIES_TOTAL).increment(1);
                    current = actual;
                }
            }
        }
    }

    pub fn occupancy(&self, route: usize, seat: usize) -> Mask {
        self.row(route)[seat].0.load(Ordering::Acquire)
    }
}
