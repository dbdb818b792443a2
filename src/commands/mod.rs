//! # Command System
//!
//! Declarative slash command tree, interceptor chains, registration against
//! the remote registry and interaction dispatch.
//!
//! - **Version**: 3.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 3.0.0: Executors, subcommand groups and the dispatch engine replace hand-written handlers
//! - 2.1.0: Add modular handler infrastructure (handler trait, context, registry)
//! - 2.0.0: Remove bang commands, slash-only command system
//! - 1.0.0: Initial reorganization with modular command structure

pub mod command;
pub mod context;
pub mod engine;
pub mod executor;
pub mod group;
pub mod handler;
pub mod middleware;
pub mod node;
pub mod registry;
pub mod sync;

pub use command::Command;
pub use context::{Meta, Request};
pub use engine::{Engine, ErrorHandler, RawHandler};
pub use executor::Executor;
pub use group::SubcommandGroup;
pub use handler::{AutocompleteHandler, BoxFuture, Data, Extract, Handler, Shared, Unmarshal, Unmarshaled};
pub use middleware::{from_fn, Chain, Interceptor, Next};
pub use node::{Node, Resolved};
pub use registry::{CommandRegistry, Registration};
pub use sync::{RegistryService, SyncError, SyncReport};
