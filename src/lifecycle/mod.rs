//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Pool + telemetry → Bind listeners → Supervised tasks → Accept
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain sessions → Stop tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Supervisor (supervisor.rs):
//!     Background task ends or panics → Log → Restart with backoff
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: the drain gives up after a deadline

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use startup::{run, Balancer, StartupError};
pub use supervisor::{supervise, RestartPolicy, SupervisorExit};
