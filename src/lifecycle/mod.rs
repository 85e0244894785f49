//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → HTTP server stops accepting and drains
//!                     → eviction sweep leaves its loop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every background task owns a receiver
//! - Background tasks are stopped explicitly, never abandoned

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
