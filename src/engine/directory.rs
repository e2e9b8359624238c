use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::TicketId;

/// Descriptor value of a slot that is unsold or already refunded.
/// Never a real descriptor: a real arrival station is at most 32.
pub const SENTINEL: u64 = u64::MAX;

/// Pack what was sold into one word: `arrival | departure << 8 | route << 16 | seat_index << 32`.
#[inline]
pub fn pack(route: u32, seat_index: u32, departure: u32, arrival: u32) -> u64 {
    u64::from(arrival & 0xff)
        | u64::from(departure & 0xff) << 8
        | u64::from(route & 0xffff) << 16
        | u64::from(seat_index) << 32
}

/// Why [`TicketDirectory::record`] refused an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// The id is past the end of the table.
    OutOfRange,
    /// The id was issued before, so the slot belongs to another ticket.
    Occupied,
}

/// Fixed-capacity table of sold tickets, indexed directly by ticket id.
///
/// Each slot holds the owner name, written once at issue, and a packed
/// descriptor. The descriptor is the only thing refunds contend on: swapping it
/// to [`SENTINEL`] is what makes a refund happen at most once.
#[derive(Debug)]
pub struct TicketDirectory {
    names: Box<[OnceLock<Box<str>>]>,
    descriptors: Box<[AtomicU64]>,
}

impl TicketDirectory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: (0..capacity).map(|_| OnceLock::new()).collect(),
            descriptors: (0..capacity).map(|_| AtomicU64::new(SENTINEL)).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.descriptors.len()
    }

    /// Record a sale under a fresh id.
    ///
    /// The name is published before the descriptor, so a refund that races this
    /// write still sees the sentinel and fails. A slot that already has an owner
    /// is never overwritten.
    pub fn record(
        &self,
        tid: TicketId,
        passenger: &str,
        descriptor: u64,
    ) -> Result<(), RecordError> {
        let slot = self.slot(tid).ok_or(RecordError::OutOfRange)?;
        self.names[slot].set(passenger.into()).map_err(|_| RecordError::Occupied)?;
        self.descriptors[slot]
            .compare_exchange(SENTINEL, descriptor, Ordering::Release, Ordering::Relaxed)
            .map(drop)
            .map_err(|_| RecordError::Occupied)
    }

    /// Validate a claim and retire the slot in one CAS. Fails on unknown id,
    /// owner mismatch, descriptor mismatch, or a slot that was already retired.
    pub fn invalidate(&self, tid: TicketId, passenger: &str, claimed: u64) -> bool {
        let Some(slot) = self.slot(tid) else {
            return false;
        };
        match self.names[slot].get() {
            Some(owner) if owner.as_ref() == passenger => {}
            _ => return false,
        }
        if claimed == SENTINEL {
            return false;
        }
        self.descriptors[slot]
            .compare_exchange(claimed, SENTINEL, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_sold(&self, tid: TicketId) -> bool {
        self.slot(tid)
            .is_some_and(|slot| self.descriptors[slot].load(Ordering::Acquire) != SENTINEL)
    }

    fn slot(&self, tid: TicketId) -> Option<usize> {
        usize::try_from(tid).ok().filter(|&slot| slot < self.descriptors.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_fields_do_not_collide() {
        let a = pack(1, 0, 1, 5);
        assert_ne!(a, pack(2, 0, 1, 5));
        assert_ne!(a, pack(1, 1, 1, 5));
        assert_ne!(a, pack(1, 0, 2, 5));
        assert_ne!(a, pack(1, 0, 1, 6));
        assert_ne!(pack(u16::MAX as u32, u32::MAX, 31, 32), SENTINEL);
    }

    #[test]
    fn unsold_slot_rejects_refund() {
        let dir = TicketDirectory::with_capacity(4);
        assert!(!dir.is_sold(0));
        assert!(!dir.invalidate(0, "alice", pack(1, 0, 1, 2)));
    }

    #[test]
    fn refund_requires_owner_and_descriptor() {
        let dir = TicketDirectory::with_capacity(4);
        let d = pack(1, 3, 2, 6);
        assert_eq!(dir.record(1, "alice", d), Ok(()));
        assert!(!dir.invalidate(1, "bob", d));
        assert!(!dir.invalidate(1, "alice", pack(1, 3, 2, 7)));
        assert!(dir.is_sold(1));
        assert!(dir.invalidate(1, "alice", d));
        assert!(!dir.is_sold(1));
        // second attempt finds the sentinel
        assert!(!dir.invalidate(1, "alice", d));
    }

    #[test]
    fn live_slot_is_never_overwritten() {
        let dir = TicketDirectory::with_capacity(4);
        let first = pack(1, 0, 1, 3);
        let second = pack(1, 2, 4, 6);
        dir.record(1, "a", first).unwrap();
        assert_eq!(dir.record(1, "b", second), Err(RecordError::Occupied));
        assert_eq!(dir.record(1, "a", second), Err(RecordError::Occupied));
        assert!(!dir.invalidate(1, "b", second));
        assert!(dir.invalidate(1, "a", first));
        // a retired slot stays retired
        assert_eq!(dir.record(1, "a", first), Err(RecordError::Occupied));
        assert!(!dir.is_sold(1));
    }

    #[test]
    fn out_of_range_ids() {
        let dir = TicketDirectory::with_capacity(2);
        assert_eq!(dir.record(2, "alice", pack(1, 0, 1, 2)), Err(RecordError::OutOfRange));
        assert!(!dir.invalidate(u64::MAX, "alice", pack(1, 0, 1, 2)));
        assert!(!dir.is_sold(2));
    }

    #[test]
    fn concurrent_refunds_succeed_once() {
        let dir = TicketDirectory::with_capacity(1);
        let d = pack(1, 0, 1, 9);
        dir.record(0, "alice", d).unwrap();
        let wins = std::thread::scope(|s| {
            let handles: Vec<_> =
                (0..8).map(|_| s.spawn(|| dir.invalidate(0, "alice", d))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).filter(|&ok| ok).count()
        });
        assert_eq!(wins, 1);
    }
}
