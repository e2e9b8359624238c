use tracing::info;

use seatline::driver::{self, WorkloadConfig};
use seatline::limits::MAX_DRIVER_THREADS;
use seatline::{EngineConfig, TicketingEngine};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("SEATLINE_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    seatline::observability::init(metrics_port)?;

    let defaults = EngineConfig::default();
    let threads: u32 = env_or("SEATLINE_THREADS", defaults.thread_count);
    let config = EngineConfig {
        route_count: env_or("SEATLINE_ROUTES", defaults.route_count),
        coach_count: env_or("SEATLINE_COACHES", defaults.coach_count),
        seat_count: env_or("SEATLINE_SEATS", defaults.seat_count),
        station_count: env_or("SEATLINE_STATIONS", defaults.station_count),
        thread_count: threads,
        slots_per_thread: env_or("SEATLINE_SLOTS_PER_THREAD", defaults.slots_per_thread),
    };

    let workload_defaults = WorkloadConfig::default();
    let workload = WorkloadConfig {
        threads: (threads as usize).clamp(1, MAX_DRIVER_THREADS),
        ops_per_thread: env_or("SEATLINE_OPS_PER_THREAD", workload_defaults.ops_per_thread),
        query_pct: env_or("SEATLINE_QUERY_PCT", workload_defaults.query_pct),
        refund_pct: env_or("SEATLINE_REFUND_PCT", workload_defaults.refund_pct),
        seed: env_or("SEATLINE_SEED", workload_defaults.seed),
    };
    if workload.query_pct + workload.refund_pct > 100 {
        return Err("SEATLINE_QUERY_PCT + SEATLINE_REFUND_PCT must not exceed 100".into());
    }

    info!("seatline workload driver");
    info!(
        "  routes: {}, coaches: {}, seats/coach: {}, stations: {}",
        config.route_count, config.coach_count, config.seat_count, config.station_count
    );
    info!("  threads: {}, ops/thread: {}", workload.threads, workload.ops_per_thread);
    info!("  mix: {}% query, {}% refund", workload.query_pct, workload.refund_pct);
    let metrics_url = metrics_port
        .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"));
    info!("  metrics: {metrics_url}");

    let engine = TicketingEngine::new(config)?;
    let report = driver::run(&engine, &workload)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.mismatches.is_empty() {
        let count = report.mismatches.len();
        return Err(format!("{count} seats disagree with outstanding tickets").into());
    }
    Ok(())
}
