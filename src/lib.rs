//! TCP load balancer library.

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod telemetry;

pub use config::schema::BalancerConfig;
pub use lifecycle::{Balancer, Shutdown};
pub use proxy::ProxyServer;
