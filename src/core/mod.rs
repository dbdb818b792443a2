//! # Core Module
//!
//! Platform model, error kinds, configuration and the session collaborator.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Platform model and session trait, replacing message chunking helpers
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod error;
pub mod model;
pub mod session;

// Re-export commonly used items
pub use config::Config;
pub use error::{DispatchError, ParsingError, PlatformError, PlatformOperation, SchemaError};
pub use model::{
    Channel, ChannelKind, Choice, ChoiceValue, Interaction, InteractionKind, InteractionOption,
    Mentionable, OptionKind, RemoteCommand, Response, Role, Scope, User, WireCommand, WireOption,
};
pub use session::Session;
