//! In-process plumbing shared by sessions.
//!
//! # Data Flow
//! ```text
//! Upgrade accepted
//!     → connection.rs (session id, state, active-session tracking)
//!     → conduit.rs (two bounded byte pipes per session)
//! ```
//!
//! # Design Decisions
//! - Conduits are bounded so the faster side waits for the slower one
//! - Each session is tracked by a guard released on drop

pub mod conduit;
pub mod connection;
