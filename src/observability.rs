use std::net::SocketAddr;

// ── Engine metrics ──────────────────────────────────────────────

/// Counter: reservation attempts. Labels: status (sold, sold_out, directory_full).
pub const RESERVATIONS_TOTAL: &str = "seatline_reservations_total";

/// Counter: refund attempts. Labels: status (ok, rejected).
pub const REFUNDS_TOTAL: &str = "seatline_refunds_total";

/// Counter: availability queries served.
pub const QUERIES_TOTAL: &str = "seatline_queries_total";

/// Counter: CAS attempts on an occupancy word that lost to a concurrent writer.
pub const CAS_RETRIES_TOTAL: &str = "seatline_cas_retries_total";

/// Counter: id batches drawn from the shared ticket-id counter.
pub const ID_BATCHES_TOTAL: &str = "seatline_id_batches_total";

// ── Driver metrics ──────────────────────────────────────────────

/// Histogram: per-operation latency in seconds. Labels: op.
pub const OP_DURATION_SECONDS: &str = "seatline_op_duration_seconds";

/// Gauge: tickets currently held by driver workers.
pub const OUTSTANDING_TICKETS: &str = "seatline_outstanding_tickets";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
