use std::sync::atomic::{AtomicU64, Ordering};

use crate::limits::ID_BATCH;
use crate::model::TicketId;

/// Shared ticket-id counter. Workers draw ids through their own [`IdCursor`],
/// touching the shared counter once per [`ID_BATCH`] tickets.
#[derive(Debug, Default)]
pub struct TicketIdAllocator {
    global: AtomicU64,
}

/// A worker's position inside its current id batch.
///
/// Owned by exactly one worker, so advancing it needs no synchronization.
/// Batches are aligned to `ID_BATCH`, which lets the cursor detect exhaustion
/// from its low-order bits alone.
#[derive(Debug, Default)]
pub(crate) struct IdCursor {
    next: TicketId,
}

impl TicketIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next(&self, cursor: &mut IdCursor) -> TicketId {
        if cursor.next & (ID_BATCH - 1) == 0 {
            cursor.next = self.global.fetch_add(ID_BATCH, Ordering::Relaxed);
            metrics::counter!(crate::observability::ID_BATCHES_TOTAL).increment(1);
        }
        let id = cursor.next;
        cursor.next += 1;
        id
    }

    /// Ids handed out to batches so far, including unused batch tails.
    pub fn reserved(&self) -> u64 {
        self.global.load(Ordering::Relaxed)
    }
}
