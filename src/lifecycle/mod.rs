//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     root token cancelled → server stops accepting
//!                          → every session token (child) cancelled
//!                          → sessions close their websockets
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
