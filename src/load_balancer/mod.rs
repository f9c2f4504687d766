//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Session needs a backend (excluding the ones it already tried)
//!     → pool.rs (ordered backends + health view)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through backends)
//!         - least_conn.rs (pick backend with fewest connections)
//!     → backend.rs (guard counts the session until dropped)
//!     → Return backend index or "no backend available"
//! ```
//!
//! # Design Decisions
//! - Policies are stateless except for the round-robin cursor
//! - Unhealthy backends excluded from selection
//! - Connection counts and health flags are per-backend atomics; no cross-backend locking

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendConnectionGuard};
pub use pool::{BackendPool, BackendStatus};

/// A backend selection policy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Index of the next backend to use, skipping unhealthy and `excluded`
    /// entries, or `None` if nothing is eligible.
    fn next_server(&self, backends: &[Arc<Backend>], excluded: &HashSet<usize>) -> Option<usize>;
}
