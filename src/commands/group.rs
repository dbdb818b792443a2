//! Subcommand groups
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use indexmap::IndexMap;
use std::sync::{Arc, RwLock};

use super::executor::Executor;
use super::middleware::Chain;
use super::node::{read, write};
use crate::core::error::SchemaError;
use crate::core::model::{OptionKind, WireOption};
use crate::schema::payload::{validate_description, validate_name};

struct GroupState {
    name: String,
    description: String,
    subcommands: IndexMap<String, Executor>,
    middleware: Chain,
    locked: bool,
}

/// Named set of executors under one command
#[derive(Clone)]
pub struct SubcommandGroup {
    inner: Arc<RwLock<GroupState>>,
}

impl SubcommandGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self, SchemaError> {
        let name = name.into();
        let description = description.into();
        validate_name(&name)?;
        validate_description(&name, &description)?;
        Ok(Self::unnamed_with(name, description))
    }

    /// The implicit group holding a command's direct subcommands
    pub(crate) fn unnamed() -> Self {
        Self::unnamed_with(String::new(), String::new())
    }

    fn unnamed_with(name: String, description: String) -> Self {
        Self {
            inner: Arc::new(RwLock::new(GroupState {
                name,
                description,
                subcommands: IndexMap::new(),
                middleware: Chain::new(),
                locked: false,
            })),
        }
    }

    pub fn name(&self) -> String {
        read(&self.inner).name.clone()
    }

    pub fn description(&self) -> String {
        read(&self.inner).description.clone()
    }

    /// Insert or replace the subcommand with the executor's name
    ///
    /// Replacing keeps the original position.
    pub fn add_subcommand(&self, executor: Executor) {
        let mut state = write(&self.inner);
        if state.locked {
            executor.lock();
        }
        state.subcommands.insert(executor.name(), executor);
    }

    pub fn remove_subcommand(&self, name: &str) -> Option<Executor> {
        write(&self.inner).subcommands.shift_remove(name)
    }

    pub fn find_subcommand(&self, name: &str) -> Option<Executor> {
        read(&self.inner).subcommands.get(name).cloned()
    }

    pub fn subcommands(&self) -> Vec<Executor> {
        read(&self.inner).subcommands.values().cloned().collect()
    }

    pub fn set_middleware(&self, chain: Chain) {
        write(&self.inner).middleware = chain;
    }

    pub fn middleware(&self) -> Chain {
        read(&self.inner).middleware.clone()
    }

    /// Lock every current and future subcommand
    pub fn lock(&self) {
        let mut state = write(&self.inner);
        state.locked = true;
        for executor in state.subcommands.values() {
            executor.lock();
        }
    }

    pub fn is_locked(&self) -> bool {
        read(&self.inner).locked
    }

    pub(crate) fn wire_subcommands(&self) -> Vec<WireOption> {
        read(&self.inner)
            .subcommands
            .values()
            .map(|executor| {
                WireOption::node(
                    OptionKind::SubCommand,
                    &executor.name(),
                    &executor.description(),
                    executor.wire_options(),
                )
            })
            .collect()
    }

    pub fn wire_option(&self) -> WireOption {
        WireOption::node(
            OptionKind::SubCommandGroup,
            &self.name(),
            &self.description(),
            self.wire_subcommands(),
        )
    }

    pub fn same(&self, other: &SubcommandGroup) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ping_executor, shutdown_executor};

    #[test]
    fn test_upsert_keeps_position() {
        let group = SubcommandGroup::new("admin", "Admin tools").unwrap();
        group.add_subcommand(ping_executor());
        group.add_subcommand(shutdown_executor());

        let replacement = Executor::new("ping", "Ping again", || async { anyhow::Ok(()) }).unwrap();
        group.add_subcommand(replacement.clone());

        let names: Vec<String> = group.subcommands().iter().map(Executor::name).collect();
        assert_eq!(names, vec!["ping", "shutdown"]);
        assert!(group.find_subcommand("ping").unwrap().same(&replacement));
    }

    #[test]
    fn test_remove_subcommand() {
        let group = SubcommandGroup::new("admin", "Admin tools").unwrap();
        group.add_subcommand(ping_executor());

        assert!(group.remove_subcommand("ping").is_some());
        assert!(group.remove_subcommand("ping").is_none());
        assert!(group.subcommands().is_empty());
    }

    #[test]
    fn test_lock_cascades_to_new_subcommands() {
        let group = SubcommandGroup::new("admin", "Admin tools").unwrap();
        let before = ping_executor();
        group.add_subcommand(before.clone());
        group.lock();

        let after = shutdown_executor();
        group.add_subcommand(after.clone());

        assert!(before.is_locked());
        assert!(after.is_locked());
    }

    #[test]
    fn test_wire_option() {
        let group = SubcommandGroup::new("admin", "Admin tools").unwrap();
        group.add_subcommand(shutdown_executor());

        let option = group.wire_option();
        assert_eq!(option.kind, OptionKind::SubCommandGroup);
        assert_eq!(option.options.len(), 1);
        assert_eq!(option.options[0].kind, OptionKind::SubCommand);
        assert_eq!(option.options[0].options.len(), 2);
    }
}
