//! Commands with subcommands and subcommand groups
//!
//! A command owns an unnamed default group for its direct subcommands and a
//! set of named groups. Direct subcommand names and group names share one
//! namespace.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Reject subcommand and group name collisions
//! - 1.0.0: Initial command tree

use indexmap::IndexMap;
use std::sync::{Arc, RwLock};

use super::executor::Executor;
use super::group::SubcommandGroup;
use super::middleware::Chain;
use super::node::{display_path, read, write, Resolved};
use crate::core::error::{ParsingError, SchemaError};
use crate::core::model::{InteractionOption, OptionKind, WireCommand};
use crate::schema::payload::{validate_description, validate_name};

struct CommandState {
    name: String,
    description: String,
    default_group: SubcommandGroup,
    groups: IndexMap<String, SubcommandGroup>,
    middleware: Chain,
    locked: bool,
}

#[derive(Clone)]
pub struct Command {
    inner: Arc<RwLock<CommandState>>,
}

impl Command {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self, SchemaError> {
        let name = name.into();
        let description = description.into();
        validate_name(&name)?;
        validate_description(&name, &description)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(CommandState {
                name,
                description,
                default_group: SubcommandGroup::unnamed(),
                groups: IndexMap::new(),
                middleware: Chain::new(),
                locked: false,
            })),
        })
    }

    pub fn name(&self) -> String {
        read(&self.inner).name.clone()
    }

    pub fn description(&self) -> String {
        read(&self.inner).description.clone()
    }

    /// Insert or replace a direct subcommand
    pub fn add_subcommand(&self, executor: Executor) -> Result<(), SchemaError> {
        let state = write(&self.inner);
        let name = executor.name();
        if state.groups.contains_key(&name) {
            return Err(SchemaError::NameCollision {
                parent: state.name.clone(),
                name,
                existing: "subcommand group",
            });
        }
        state.default_group.add_subcommand(executor);
        Ok(())
    }

    pub fn remove_subcommand(&self, name: &str) -> Option<Executor> {
        write(&self.inner).default_group.remove_subcommand(name)
    }

    pub fn find_subcommand(&self, name: &str) -> Option<Executor> {
        read(&self.inner).default_group.find_subcommand(name)
    }

    pub fn subcommands(&self) -> Vec<Executor> {
        read(&self.inner).default_group.subcommands()
    }

    /// Insert or replace a named group
    pub fn add_group(&self, group: SubcommandGroup) -> Result<(), SchemaError> {
        let mut state = write(&self.inner);
        let name = group.name();
        if state.default_group.find_subcommand(&name).is_some() {
            return Err(SchemaError::NameCollision {
                parent: state.name.clone(),
                name,
                existing: "subcommand",
            });
        }
        if state.locked {
            group.lock();
        }
        state.groups.insert(name, group);
        Ok(())
    }

    pub fn remove_group(&self, name: &str) -> Option<SubcommandGroup> {
        write(&self.inner).groups.shift_remove(name)
    }

    pub fn find_group(&self, name: &str) -> Option<SubcommandGroup> {
        read(&self.inner).groups.get(name).cloned()
    }

    pub fn groups(&self) -> Vec<SubcommandGroup> {
        read(&self.inner).groups.values().cloned().collect()
    }

    pub fn set_middleware(&self, chain: Chain) {
        write(&self.inner).middleware = chain;
    }

    pub fn middleware(&self) -> Chain {
        read(&self.inner).middleware.clone()
    }

    pub fn lock(&self) {
        let mut state = write(&self.inner);
        state.locked = true;
        state.default_group.lock();
        for group in state.groups.values() {
            group.lock();
        }
    }

    pub fn is_locked(&self) -> bool {
        read(&self.inner).locked
    }

    /// Walk the options down to the targeted executor
    pub fn resolve(&self, options: &[InteractionOption]) -> Result<Resolved, ParsingError> {
        let state = read(&self.inner);
        let mut path = vec![state.name.clone()];
        let mut chain = state.middleware.clone();

        let first = options.first().ok_or_else(|| ParsingError::MissingOptions {
            path: display_path(&path),
        })?;

        let (group, target) = match first.kind {
            OptionKind::SubCommand => (state.default_group.clone(), first),
            OptionKind::SubCommandGroup => {
                path.push(first.name.clone());
                let group = state.groups.get(&first.name).ok_or_else(|| ParsingError::MissingGroup {
                    name: first.name.clone(),
                    path: display_path(&path),
                })?;
                chain = chain.extend(&group.middleware());

                let target = first.options.first().ok_or_else(|| ParsingError::MissingOptions {
                    path: display_path(&path),
                })?;
                if target.kind != OptionKind::SubCommand {
                    return Err(ParsingError::NonCommandOption {
                        kind: target.kind,
                        path: display_path(&path),
                    });
                }
                (group.clone(), target)
            }
            kind => {
                return Err(ParsingError::NonCommandOption {
                    kind,
                    path: display_path(&path),
                })
            }
        };

        let executor = group
            .find_subcommand(&target.name)
            .ok_or_else(|| ParsingError::MissingSubcommand {
                name: target.name.clone(),
                path: display_path(&path),
            })?;
        path.push(target.name.clone());

        Ok(Resolved {
            chain: chain.extend(&executor.middleware()),
            executor,
            options: target.options.clone(),
            path,
        })
    }

    pub fn wire_command(&self) -> WireCommand {
        let state = read(&self.inner);
        let mut options = state.default_group.wire_subcommands();
        options.extend(state.groups.values().map(SubcommandGroup::wire_option));
        WireCommand {
            name: state.name.clone(),
            description: state.description.clone(),
            options,
        }
    }

    pub fn same(&self, other: &Command) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ping_executor, shutdown_executor};

    fn admin_command() -> Command {
        let command = Command::new("cmdname", "Tools").unwrap();
        command.add_subcommand(ping_executor()).unwrap();

        let admin = SubcommandGroup::new("admin", "Admin tools").unwrap();
        admin.add_subcommand(shutdown_executor());
        command.add_group(admin).unwrap();
        command
    }

    #[test]
    fn test_resolve_direct_subcommand() {
        let command = admin_command();
        let resolved = command.resolve(&[InteractionOption::subcommand("ping", vec![])]).unwrap();

        assert_eq!(resolved.executor.name(), "ping");
        assert_eq!(resolved.path, vec!["cmdname", "ping"]);
    }

    #[test]
    fn test_resolve_grouped_subcommand() {
        let command = admin_command();
        let options = vec![InteractionOption::group(
            "admin",
            vec![InteractionOption::subcommand(
                "shutdown",
                vec![InteractionOption::new("confirm", OptionKind::Boolean, true)],
            )],
        )];
        let resolved = command.resolve(&options).unwrap();

        assert_eq!(resolved.executor.name(), "shutdown");
        assert_eq!(resolved.path, vec!["cmdname", "admin", "shutdown"]);
        assert_eq!(resolved.options.len(), 1);
    }

    #[test]
    fn test_resolve_errors() {
        let command = admin_command();

        let err = command.resolve(&[]).err().unwrap();
        assert!(matches!(err, ParsingError::MissingOptions { .. }));

        let err = command
            .resolve(&[InteractionOption::new("confirm", OptionKind::Boolean, true)])
            .err()
            .unwrap();
        assert!(matches!(err, ParsingError::NonCommandOption { kind: OptionKind::Boolean, .. }));

        let err = command
            .resolve(&[InteractionOption::group("owner", vec![])])
            .err()
            .unwrap();
        assert!(matches!(err, ParsingError::MissingGroup { ref name, .. } if name == "owner"));

        let err = command
            .resolve(&[InteractionOption::subcommand("pong", vec![])])
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("missing subcommand"));
    }

    #[test]
    fn test_name_collisions() {
        let command = admin_command();

        let clash = Executor::new("admin", "Clashes with a group", || async { anyhow::Ok(()) }).unwrap();
        assert!(matches!(
            command.add_subcommand(clash),
            Err(SchemaError::NameCollision { existing: "subcommand group", .. })
        ));

        let clash = SubcommandGroup::new("ping", "Clashes with a subcommand").unwrap();
        assert!(matches!(
            command.add_group(clash),
            Err(SchemaError::NameCollision { existing: "subcommand", .. })
        ));
    }

    #[test]
    fn test_lock_cascades() {
        let command = admin_command();
        command.lock();

        assert!(command.find_subcommand("ping").unwrap().is_locked());
        assert!(command.find_group("admin").unwrap().find_subcommand("shutdown").unwrap().is_locked());

        let late = SubcommandGroup::new("owner", "Owner tools").unwrap();
        command.add_group(late.clone()).unwrap();
        assert!(late.is_locked());
    }

    #[test]
    fn test_wire_command_layout() {
        let wire = admin_command().wire_command();
        assert_eq!(wire.name, "cmdname");
        assert_eq!(wire.options[0].kind, OptionKind::SubCommand);
        assert_eq!(wire.options[1].kind, OptionKind::SubCommandGroup);
        assert_eq!(wire.options[1].options[0].name, "shutdown");
    }
}
