use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of inbound requests").unwrap();
    pub static ref REJECTIONS: CounterVec = register_counter_vec!(
        "gateway_rejections_total",
        "Requests rejected by admission control",
        &["reason"]
    )
    .unwrap();
    pub static ref TRACKED_KEYS: Gauge =
        register_gauge!("gateway_tracked_keys", "Clients currently tracked by the limiter").unwrap();
    pub static ref EVICTED_KEYS: Counter =
        register_counter!("gateway_evicted_keys_total", "Idle clients evicted by sweeps").unwrap();
    pub static ref ADMISSION_LATENCY: Histogram = register_histogram!(
        "gateway_admission_seconds",
        "Time spent deciding admission in seconds"
    )
    .unwrap();
}
