//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyConfig value (library users)
//!     → validation.rs (semantic checks)
//!     → WsProxy::new (immutable, shared via Arc with every session)
//!
//! config file (TOML, demo binary only)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs
//!     → ServerConfig
//! ```
//!
//! # Design Decisions
//! - Config is immutable once handed to the proxy
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use schema::ServerConfig;
