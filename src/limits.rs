/// Width of a segment mask. One bit per segment, so this bounds the station count.
pub const MAX_STATIONS: u32 = u32::BITS;

/// Route numbers must fit the 16-bit route field of a packed descriptor.
pub const MAX_ROUTES: u32 = u16::MAX as u32;

/// Flattened seat indices must fit the 32-bit seat field of a packed descriptor.
pub const MAX_SEATS_PER_ROUTE: u64 = u32::MAX as u64;

/// Occupancy words across all routes. Each takes a 64-byte cache line, so this is 1 GiB.
pub const MAX_LEDGER_SEATS: u64 = 1 << 24;

/// Directory slots across all threads, about 32 bytes each.
pub const MAX_DIRECTORY_SLOTS: usize = 1 << 25;

/// Ticket ids drawn from the global counter per refill. Must be a power of two.
pub const ID_BATCH: u64 = 128;

/// Directory slots reserved per configured thread.
pub const DEFAULT_SLOTS_PER_THREAD: usize = 120_000;

/// Upper bound on driver threads accepted from the environment.
pub const MAX_DRIVER_THREADS: usize = 1024;

const _: () = assert!(ID_BATCH.is_power_of_two());
