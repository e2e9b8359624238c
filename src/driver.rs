use std::collections::{HashMap, HashSet};
use std::time::Instant;

use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::interval::interval;
use crate::engine::{EngineError, TicketingEngine, Worker};
use crate::model::*;
use crate::observability::{OP_DURATION_SECONDS, OUTSTANDING_TICKETS};

/// Distinct passenger names the driver books under.
const PASSENGERS: u32 = 10_000;

/// Refund victims are drawn from this many entries at the front of the shared map.
const REFUND_WINDOW: usize = 256;

/// Operation mix for [`run`]. Whatever is left after refunds and queries is reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub threads: usize,
    pub ops_per_thread: usize,
    pub query_pct: u32,
    pub refund_pct: u32,
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threads: 16,
            ops_per_thread: 10_000,
            query_pct: 60,
            refund_pct: 10,
            seed: 0x5ea7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub reserved: u64,
    pub sold_out: u64,
    pub queries: u64,
    pub refunds: u64,
    /// Successful refunds of a ticket another worker sold.
    pub cross_worker_refunds: u64,
    /// Refunds that lost the race for a ticket to another worker.
    pub refunds_rejected: u64,
    pub double_refunds_rejected: u64,
}

impl Tally {
    fn merge(&mut self, other: &Tally) {
        self.reserved += other.reserved;
        self.sold_out += other.sold_out;
        self.queries += other.queries;
        self.refunds += other.refunds;
        self.cross_worker_refunds += other.cross_worker_refunds;
        self.refunds_rejected += other.refunds_rejected;
        self.double_refunds_rejected += other.double_refunds_rejected;
    }

    pub fn ops(&self) -> u64 {
        self.reserved + self.sold_out + self.queries + self.refunds + self.refunds_rejected
    }
}

/// A seat whose occupancy disagrees with the tickets still held against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub route: u32,
    pub coach: u32,
    pub seat: u32,
    pub expected: Mask,
    pub actual: Mask,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    pub threads: usize,
    #[serde(flatten)]
    pub tally: Tally,
    pub outstanding: usize,
    pub ids_reserved: u64,
    pub elapsed_ms: f64,
    pub ops_per_sec: f64,
    pub mismatches: Vec<Mismatch>,
}

/// Run the workload on scoped threads, then check the ledger against the
/// tickets still outstanding.
pub fn run(engine: &TicketingEngine, cfg: &WorkloadConfig) -> Result<WorkloadReport, EngineError> {
    let outstanding: DashMap<TicketId, Ticket> = DashMap::new();
    info!(threads = cfg.threads, ops_per_thread = cfg.ops_per_thread, "workload starting");

    let start = Instant::now();
    let results: Vec<Result<Tally, EngineError>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..cfg.threads)
            .map(|w| {
                let outstanding = &outstanding;
                s.spawn(move || run_worker(engine, cfg, w, outstanding))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });
    let elapsed = start.elapsed();

    let mut tally = Tally::default();
    for result in results {
        tally.merge(&result?);
    }

    let mismatches = verify(engine, &outstanding);
    if !mismatches.is_empty() {
        warn!(count = mismatches.len(), "occupancy does not match outstanding tickets");
    }

    let ops_per_sec = tally.ops() as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        ops = tally.ops(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        ops_per_sec,
        "workload complete"
    );

    Ok(WorkloadReport {
        threads: cfg.threads,
        tally,
        outstanding: outstanding.len(),
        ids_reserved: engine.ids_reserved(),
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        ops_per_sec,
        mismatches,
    })
}

fn run_worker(
    engine: &TicketingEngine,
    cfg: &WorkloadConfig,
    index: usize,
    outstanding: &DashMap<TicketId, Ticket>,
) -> Result<Tally, EngineError> {
    let config = *engine.config();
    let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(index as u64));
    let mut worker = engine.worker();
    let mut sold_here: HashSet<TicketId> = HashSet::new();
    let mut tally = Tally::default();

    for _ in 0..cfg.ops_per_thread {
        let roll = rng.gen_range(0..100);
        let route = rng.gen_range(1..=config.route_count);
        let departure = rng.gen_range(1..config.station_count);
        let arrival = rng.gen_range(departure + 1..=config.station_count);
        let t = Instant::now();

        if roll < cfg.refund_pct && !outstanding.is_empty() {
            refund_any(&worker, outstanding, &mut rng, &mut sold_here, &mut tally);
            metrics::histogram!(OP_DURATION_SECONDS, "op" => "refund")
                .record(t.elapsed().as_secs_f64());
        } else if roll < cfg.refund_pct + cfg.query_pct {
            worker.query(route, departure, arrival)?;
            tally.queries += 1;
            metrics::histogram!(OP_DURATION_SECONDS, "op" => "query")
                .record(t.elapsed().as_secs_f64());
        } else {
            let passenger = format!("passenger-{}", rng.gen_range(0..PASSENGERS));
            match worker.reserve(&passenger, route, departure, arrival)? {
                Some(ticket) => {
                    tally.reserved += 1;
                    sold_here.insert(ticket.tid);
                    outstanding.insert(ticket.tid, ticket);
                }
                None => tally.sold_out += 1,
            }
            metrics::histogram!(OP_DURATION_SECONDS, "op" => "reserve")
                .record(t.elapsed().as_secs_f64());
        }
    }

    metrics::gauge!(OUTSTANDING_TICKETS).set(outstanding.len() as f64);
    Ok(tally)
}

/// Refund some outstanding ticket, whichever worker sold it. Taking it out of
/// the map is the claim: a worker that finds it already gone lost the race.
fn refund_any(
    worker: &Worker<'_>,
    outstanding: &DashMap<TicketId, Ticket>,
    rng: &mut StdRng,
    sold_here: &mut HashSet<TicketId>,
    tally: &mut Tally,
) {
    let window = outstanding.len().min(REFUND_WINDOW);
    let pick = rng.gen_range(0..window.max(1));
    // the shard guard must be gone before `remove` takes the write lock
    let victim = outstanding.iter().nth(pick).map(|entry| *entry.key());
    let Some((tid, ticket)) = victim.and_then(|tid| outstanding.remove(&tid)) else {
        tally.refunds_rejected += 1;
        return;
    };

    if worker.refund(&ticket) {
        tally.refunds += 1;
        if !sold_here.remove(&tid) {
            tally.cross_worker_refunds += 1;
        }
        // a replayed refund must bounce off the retired slot
        if !worker.refund(&ticket) {
            tally.double_refunds_rejected += 1;
        }
    } else {
        warn!(tid, "outstanding ticket refused a refund");
        tally.refunds_rejected += 1;
        outstanding.insert(tid, ticket);
    }
}

/// Compare every seat's occupancy with the union of outstanding ticket masks.
/// Must run while no worker is mutating the engine.
pub fn verify(engine: &TicketingEngine, outstanding: &DashMap<TicketId, Ticket>) -> Vec<Mismatch> {
    let config = *engine.config();
    let mut expected: HashMap<(u32, u32, u32), Mask> = HashMap::new();
    for entry in outstanding.iter() {
        let t = entry.value();
        let mask = interval(t.departure, t.arrival);
        *expected.entry((t.route, t.coach, t.seat)).or_default() |= mask;
    }

    let mut mismatches = Vec::new();
    for route in 1..=config.route_count {
        for coach in 1..=config.coach_count {
            for seat in 1..=config.seat_count {
                let want = expected.get(&(route, coach, seat)).copied().unwrap_or(0);
                let actual = engine.occupancy(route, coach, seat).unwrap_or(0);
                if want != actual {
                    mismatches.push(Mismatch {
                        route,
                        coach,
                        seat,
                        expected: want,
                        actual,
                    });
                }
            }
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_engine() -> TicketingEngine {
        let config = EngineConfig::new(2, 2, 5, 8, 4).with_slots_per_thread(10_000);
        TicketingEngine::new(config).unwrap()
    }

    #[test]
    fn mixed_workload_leaves_consistent_ledger() {
        let engine = small_engine();
        let cfg = WorkloadConfig {
            threads: 4,
            ops_per_thread: 2_000,
            query_pct: 40,
            refund_pct: 20,
            seed: 7,
        };
        let report = run(&engine, &cfg).unwrap();
        assert!(report.mismatches.is_empty(), "{:?}", report.mismatches);
        assert_eq!(report.tally.ops(), 4 * 2_000);
        assert_eq!(report.tally.double_refunds_rejected, report.tally.refunds);
        assert_eq!(report.outstanding as u64, report.tally.reserved - report.tally.refunds);
    }

    #[test]
    fn workers_refund_each_others_tickets() {
        let engine = small_engine();
        let cfg = WorkloadConfig {
            threads: 4,
            ops_per_thread: 2_000,
            query_pct: 0,
            refund_pct: 40,
            seed: 11,
        };
        let report = run(&engine, &cfg).unwrap();
        assert!(report.mismatches.is_empty(), "{:?}", report.mismatches);
        assert!(report.tally.cross_worker_refunds > 0, "{:?}", report.tally);
        assert!(report.tally.cross_worker_refunds <= report.tally.refunds);
        assert_eq!(report.outstanding as u64, report.tally.reserved - report.tally.refunds);
    }

    #[test]
    fn verify_flags_orphaned_occupancy() {
        let engine = small_engine();
        let mut w = engine.worker();
        let ticket = w.reserve("alice", 1, 1, 4).unwrap().unwrap();
        let outstanding = DashMap::new();
        let mismatches = verify(&engine, &outstanding);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].actual, interval(1, 4));
        assert_eq!((mismatches[0].coach, mismatches[0].seat), (ticket.coach, ticket.seat));

        outstanding.insert(ticket.tid, ticket);
        assert!(verify(&engine, &outstanding).is_empty());
    }

    #[test]
    fn report_serializes_flat() {
        let engine = small_engine();
        let cfg = WorkloadConfig {
            threads: 1,
            ops_per_thread: 10,
            ..WorkloadConfig::default()
        };
        let report = run(&engine, &cfg).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("reserved").is_some());
        assert!(json.get("tally").is_none());
    }
}
