mod health;
mod metrics;
mod proxy;
mod status;
mod demo;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use proxy::proxy_handler;
pub use status::security_status_handler;
pub use demo::{ddos_simulation_handler, suspicious_agent_handler};
