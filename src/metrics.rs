use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};

lazy_static! {
    pub static ref RESERVATIONS_TOTAL: Counter = register_counter!(
        "quota_gate_reservations_total",
        "Total reservation requests received"
    )
    .unwrap();
    pub static ref RESERVATIONS_DENIED: Counter = register_counter!(
        "quota_gate_reservations_denied_total",
        "Reservations denied by the admission check"
    )
    .unwrap();
    pub static ref RESERVE_LATENCY: Histogram = register_histogram!(
        "quota_gate_reserve_latency_seconds",
        "Reservation decision latency in seconds"
    )
    .unwrap();
    pub static ref DISPATCH_QUEUE_DEPTH: Gauge = register_gauge!(
        "quota_gate_dispatch_queue_depth",
        "Jobs currently waiting in the dispatch queue"
    )
    .unwrap();
}
