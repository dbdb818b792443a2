// Core layer - platform model, errors, configuration
pub mod core;

// Payload schemas and request reconstruction
pub mod schema;

// Command tree, middleware and dispatch
pub mod commands;

// Serenity adapters
pub mod discord;

#[cfg(test)]
mod testing;

pub use crate::core::Config;
pub use commands::{Chain, Command, Data, Engine, Executor, Node, SubcommandGroup};
pub use schema::{Fields, Payload};
