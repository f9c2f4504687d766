//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (session ID, drain tracking)
//!     → Hand off to the proxy session
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each session tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionTracker, SessionId};
pub use listener::{ConnectionPermit, Listener, ListenerError};
