//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Background task crashes or exits early:
//!     → lifecycle::supervisor observes it
//!     → backoff.rs computes the restart delay
//! ```

pub mod backoff;

pub use backoff::Backoff;
