use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use seatline::engine::interval::interval;
use seatline::{EngineConfig, Ticket, TicketingEngine};

// ── Test infrastructure ──────────────────────────────────────

fn start_engine(
    routes: u32,
    coaches: u32,
    seats: u32,
    stations: u32,
    threads: u32,
) -> Arc<TicketingEngine> {
    let config =
        EngineConfig::new(routes, coaches, seats, stations, threads).with_slots_per_thread(8_192);
    Arc::new(TicketingEngine::new(config).unwrap())
}

// ── Properties on one seat ───────────────────────────────────

proptest! {
    #[test]
    fn one_seat_accepts_two_intervals_iff_disjoint(
        a in 1u32..10,
        la in 1u32..6,
        b in 1u32..10,
        lb in 1u32..6,
    ) {
        let (a_end, b_end) = ((a + la).min(12), (b + lb).min(12));
        let engine = start_engine(1, 1, 1, 12, 1);
        let mut w = engine.worker();

        let first = w.reserve("first", 1, a, a_end).unwrap();
        prop_assert!(first.is_some());
        let second = w.reserve("second", 1, b, b_end).unwrap();
        let disjoint = a_end <= b || b_end <= a;
        prop_assert_eq!(second.is_some(), disjoint);

        // occupancy is exactly the union of what was sold
        let mut want = interval(a, a_end);
        if let Some(t) = &second {
            want |= interval(t.departure, t.arrival);
        }
        prop_assert_eq!(engine.occupancy(1, 1, 1), Some(want));
    }
}

// ── Cross-thread behaviour ───────────────────────────────────

#[test]
fn threads_on_disjoint_seats_get_distinct_ids() {
    let n = 16u32;
    // one seat per thread; each thread books full-length on its own route
    let engine = start_engine(n, 1, 1, 10, n);
    let handles: Vec<_> = (1..=n)
        .map(|route| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                let mut w = engine.worker();
                let mut ids = Vec::new();
                for i in 0..200 {
                    let t = w.reserve(&format!("r{route}"), route, 1, 10).unwrap().unwrap();
                    ids.push(t.tid);
                    assert!(w.refund(&t), "refund {i} on route {route}");
                }
                ids
            })
        })
        .collect();

    let ids: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(ids.len(), 16 * 200);
}

#[test]
fn cross_thread_refund_releases_seat() {
    let engine = start_engine(1, 1, 1, 10, 2);
    let mut w = engine.worker();
    let ticket = w.reserve("alice", 1, 1, 10).unwrap().unwrap();

    let other = engine.clone();
    let refunded = std::thread::spawn(move || other.refund(&ticket)).join().unwrap();
    assert!(refunded);
    assert!(w.reserve("bob", 1, 1, 10).unwrap().is_some());
}

#[test]
fn contended_route_never_oversells() {
    let engine = start_engine(1, 2, 10, 6, 8);
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                let mut w = engine.worker();
                let mut held: Vec<Ticket> = Vec::new();
                for i in 0..500 {
                    let dep = (i % 5) + 1;
                    if let Some(ticket) = w.reserve(&format!("t{t}"), 1, dep, dep + 1).unwrap() {
                        held.push(ticket);
                    }
                    if i % 3 == 0
                        && let Some(ticket) = held.pop()
                    {
                        assert!(w.refund(&ticket));
                    }
                }
                held
            })
        })
        .collect();

    let held: Vec<Ticket> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();

    // every still-held ticket owns its segment exclusively
    let mut claimed = HashSet::new();
    for t in &held {
        assert!(claimed.insert((t.coach, t.seat, t.departure)), "segment sold twice: {t:?}");
    }
    for dep in 1..=5 {
        let sold = held.iter().filter(|t| t.departure == dep).count();
        assert_eq!(engine.query(1, dep, dep + 1).unwrap(), 20 - sold);
    }
}
