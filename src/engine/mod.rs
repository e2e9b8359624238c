mod allocator;
mod directory;
mod error;
pub mod interval;
mod ledger;

pub use error::EngineError;

use allocator::{IdCursor, TicketIdAllocator};
use directory::{pack, RecordError, TicketDirectory};
use ledger::SeatLedger;

use tracing::{debug, info, warn};

use crate::limits::*;
use crate::model::*;
use crate::observability::{RESERVATIONS_TOTAL, REFUNDS_TOTAL, QUERIES_TOTAL};

use interval::interval;

/// The whole reservation state for one process: seat ledger, ticket directory
/// and id counter. Shared by reference between worker threads; every mutation
/// inside is a CAS or fetch-add.
#[derive(Debug)]
pub struct TicketingEngine {
    config: EngineConfig,
    ledger: SeatLedger,
    directory: TicketDirectory,
    ids: TicketIdAllocator,
}

/// A worker's handle on the engine. Owns the worker's id cursor, so it must
/// not be shared between threads; create one per worker with [`TicketingEngine::worker`].
#[derive(Debug)]
pub struct Worker<'a> {
    engine: &'a TicketingEngine,
    cursor: IdCursor,
}

impl TicketingEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        validate_config(&config)?;
        let seats = config.seats_per_route() as usize;
        let engine = Self {
            config,
            ledger: SeatLedger::new(config.route_count as usize, seats),
            directory: TicketDirectory::with_capacity(config.directory_capacity()),
            ids: TicketIdAllocator::new(),
        };
        info!(
            routes = config.route_count,
            coaches = config.coach_count,
            seats = config.seat_count,
            stations = config.station_count,
            directory_capacity = engine.directory.capacity(),
            "ticketing engine ready"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn seats_per_route(&self) -> usize {
        self.ledger.seats_per_route()
    }

    pub fn directory_capacity(&self) -> usize {
        self.directory.capacity()
    }

    /// A fresh handle with an empty id cursor. Its first reservation draws a
    /// whole batch of ids, so keep one handle per thread for the thread's
    /// lifetime rather than one per call.
    pub fn worker(&self) -> Worker<'_> {
        Worker {
            engine: self,
            cursor: IdCursor::default(),
        }
    }

    /// Reserve any seat on `route` free for `[departure, arrival)`.
    ///
    /// `Ok(None)` means every seat was probed and none was free: sold out, not an error.
    pub(crate) fn reserve_with(
        &self,
        cursor: &mut IdCursor,
        passenger: &str,
        route: u32,
        departure: u32,
        arrival: u32,
    ) -> Result<Option<Ticket>, EngineError> {
        let (row, mask) = self.locate(route, departure, arrival)?;
        // scatter passengers over the row so they don't all fight over seat 0
        let start = crc32fast::hash(passenger.as_bytes()) as usize % self.ledger.seats_per_route();

        let Some(index) = self.ledger.claim(row, start, mask) else {
            metrics::counter!(RESERVATIONS_TOTAL, "status" => "sold_out").increment(1);
            debug!(route, departure, arrival, "sold out");
            return Ok(None);
        };

        let tid = match self.issue(cursor, passenger, route, index, departure, arrival) {
            Ok(tid) => tid,
            Err(e) => {
                self.ledger.release(row, index, mask);
                return Err(e);
            }
        };

        metrics::counter!(RESERVATIONS_TOTAL, "status" => "sold").increment(1);
        let (coach, seat) = self.config.coach_and_seat(index);
        Ok(Some(Ticket {
            tid,
            passenger: passenger.to_owned(),
            route,
            coach,
            seat,
            departure,
            arrival,
        }))
    }

    /// Draw an id and record the sale under it.
    fn issue(
        &self,
        cursor: &mut IdCursor,
        passenger: &str,
        route: u32,
        index: usize,
        departure: u32,
        arrival: u32,
    ) -> Result<TicketId, EngineError> {
        let tid = self.ids.next(cursor);
        let descriptor = pack(route, index as u32, departure, arrival);
        match self.directory.record(tid, passenger, descriptor) {
            Ok(()) => Ok(tid),
            Err(RecordError::OutOfRange) => {
                let capacity = self.directory.capacity();
                warn!(tid, capacity, "ticket directory exhausted");
                metrics::counter!(RESERVATIONS_TOTAL, "status" => "directory_full").increment(1);
                Err(EngineError::DirectoryFull { capacity })
            }
            Err(RecordError::Occupied) => {
                warn!(tid, "ticket id issued twice");
                metrics::counter!(RESERVATIONS_TOTAL, "status" => "id_in_use").increment(1);
                Err(EngineError::TicketIdInUse { tid })
            }
        }
    }

    /// Seats on `route` currently free for `[departure, arrival)`. A snapshot.
    pub fn query(&self, route: u32, departure: u32, arrival: u32) -> Result<usize, EngineError> {
        let (row, mask) = self.locate(route, departure, arrival)?;
        metrics::counter!(QUERIES_TOTAL).increment(1);
        Ok(self.ledger.available(row, mask))
    }

    /// Refund a ticket previously returned by a reservation. False if the
    /// ticket is unknown, already refunded, or any field differs from what was sold.
    pub fn refund(&self, ticket: &Ticket) -> bool {
        let Some((row, index, mask)) = self.locate_ticket(ticket) else {
            return self.reject_refund(ticket, "fields out of range");
        };
        let claimed = pack(ticket.route, index as u32, ticket.departure, ticket.arrival);
        if !self.directory.invalidate(ticket.tid, &ticket.passenger, claimed) {
            return self.reject_refund(ticket, "does not match a sold ticket");
        }
        self.ledger.release(row, index, mask);
        metrics::counter!(REFUNDS_TOTAL, "status" => "ok").increment(1);
        true
    }

    fn reject_refund(&self, ticket: &Ticket, reason: &'static str) -> bool {
        debug!(tid = ticket.tid, reason, "refund rejected");
        metrics::counter!(REFUNDS_TOTAL, "status" => "rejected").increment(1);
        false
    }

    /// Kept for harness compatibility. Does nothing.
    pub fn buy_ticket_replay(&self, _ticket: &Ticket) -> bool {
        true
    }

    /// Kept for harness compatibility. Does nothing.
    pub fn refund_ticket_replay(&self, _ticket: &Ticket) -> bool {
        true
    }

    /// Occupancy word of one seat, or `None` if the coordinates are out of range.
    pub fn occupancy(&self, route: u32, coach: u32, seat: u32) -> Option<Mask> {
        if !self.config.valid_route(route) {
            return None;
        }
        let index = self.config.seat_index(coach, seat)?;
        Some(self.ledger.occupancy(route as usize - 1, index))
    }

    pub fn is_sold(&self, tid: TicketId) -> bool {
        self.directory.is_sold(tid)
    }

    /// Ids drawn from the shared counter so far, unused batch tails included.
    pub fn ids_reserved(&self) -> u64 {
        self.ids.reserved()
    }

    fn locate(
        &self,
        route: u32,
        departure: u32,
        arrival: u32,
    ) -> Result<(usize, Mask), EngineError> {
        if !self.config.valid_route(route) {
            return Err(EngineError::UnknownRoute(route));
        }
        if !self.config.valid_interval(departure, arrival) {
            return Err(EngineError::InvalidInterval { departure, arrival });
        }
        Ok((route as usize - 1, interval(departure, arrival)))
    }

    fn locate_ticket(&self, ticket: &Ticket) -> Option<(usize, usize, Mask)> {
        let (row, mask) = self.locate(ticket.route, ticket.departure, ticket.arrival).ok()?;
        let index = self.config.seat_index(ticket.coach, ticket.seat)?;
        Some((row, index, mask))
    }
}

impl<'a> Worker<'a> {
    pub fn engine(&self) -> &'a TicketingEngine {
        self.engine
    }

    pub fn reserve(
        &mut self,
        passenger: &str,
        route: u32,
        departure: u32,
        arrival: u32,
    ) -> Result<Option<Ticket>, EngineError> {
        self.engine.reserve_with(&mut self.cursor, passenger, route, departure, arrival)
    }

    pub fn query(&self, route: u32, departure: u32, arrival: u32) -> Result<usize, EngineError> {
        self.engine.query(route, departure, arrival)
    }

    pub fn refund(&self, ticket: &Ticket) -> bool {
        self.engine.refund(ticket)
    }
}

fn validate_config(config: &EngineConfig) -> Result<(), EngineError> {
    if config.station_count > MAX_STATIONS {
        return Err(EngineError::TooManyStations {
            stations: config.station_count,
            max: MAX_STATIONS,
        });
    }
    if config.station_count < 2 {
        return Err(EngineError::InvalidConfig("need at least two stations"));
    }
    if config.route_count == 0 || config.coach_count == 0 || config.seat_count == 0 {
        return Err(EngineError::InvalidConfig("routes, coaches and seats must be non-zero"));
    }
    if config.route_count > MAX_ROUTES {
        return Err(EngineError::InvalidConfig("too many routes"));
    }
    if config.seats_per_route() > MAX_SEATS_PER_ROUTE {
        return Err(EngineError::InvalidConfig("too many seats per route"));
    }
    if u64::from(config.route_count) * config.seats_per_route() > MAX_LEDGER_SEATS {
        return Err(EngineError::InvalidConfig("seat ledger too large"));
    }
    if config.directory_capacity() == 0 {
        return Err(EngineError::InvalidConfig("ticket directory has no slots"));
    }
    if config.directory_capacity() > MAX_DIRECTORY_SLOTS {
        return Err(EngineError::InvalidConfig("ticket directory too large"));
    }
    Ok(())
}
