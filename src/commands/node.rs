//! Top-level command tree nodes and shared lock helpers
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::command::Command;
use super::executor::Executor;
use super::middleware::Chain;
use crate::core::error::ParsingError;
use crate::core::model::{InteractionOption, WireCommand};

// A panicking handler never runs under these locks, so a poisoned lock
// still guards consistent state.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Render a resolution path for error messages
pub(crate) fn display_path(path: &[String]) -> String {
    format!("/{}", path.join(" "))
}

/// Outcome of path resolution
#[derive(Clone)]
pub struct Resolved {
    pub executor: Executor,
    /// Options addressed to the executor itself
    pub options: Vec<InteractionOption>,
    /// Command name, optional group name, subcommand name
    pub path: Vec<String>,
    /// Command and group interceptors, outermost first, followed by the executor's own
    pub chain: Chain,
}

/// Something registered as a top-level command
#[derive(Clone)]
pub enum Node {
    /// A bare executor registered as a command without subcommands
    Executor(Executor),
    /// A command with subcommands and subcommand groups
    Command(Command),
}

impl Node {
    pub fn name(&self) -> String {
        match self {
            Node::Executor(executor) => executor.name(),
            Node::Command(command) => command.name(),
        }
    }

    pub fn wire_command(&self) -> WireCommand {
        match self {
            Node::Executor(executor) => executor.wire_command(),
            Node::Command(command) => command.wire_command(),
        }
    }

    pub fn resolve(&self, options: &[InteractionOption]) -> Result<Resolved, ParsingError> {
        match self {
            Node::Executor(executor) => Ok(Resolved {
                executor: executor.clone(),
                options: options.to_vec(),
                path: vec![executor.name()],
                chain: executor.middleware(),
            }),
            Node::Command(command) => command.resolve(options),
        }
    }

    pub fn lock(&self) {
        match self {
            Node::Executor(executor) => executor.lock(),
            Node::Command(command) => command.lock(),
        }
    }

    /// Whether both refer to the same underlying node
    pub fn same(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Executor(a), Node::Executor(b)) => a.same(b),
            (Node::Command(a), Node::Command(b)) => a.same(b),
            _ => false,
        }
    }
}

impl From<Executor> for Node {
    fn from(executor: Executor) -> Self {
        Node::Executor(executor)
    }
}

impl From<Command> for Node {
    fn from(command: Command) -> Self {
        Node::Command(command)
    }
}
