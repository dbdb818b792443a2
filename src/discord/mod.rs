//! # Discord Adapters
//!
//! Serenity-backed implementations of the session and registry service, plus
//! the gateway event handler feeding the engine.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial serenity 0.11 adapters

pub mod convert;
pub mod gateway;
pub mod registry;
pub mod session;

pub use gateway::Gateway;
pub use registry::SerenityRegistry;
pub use session::SerenitySession;
