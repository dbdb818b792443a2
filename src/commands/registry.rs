//! Registered command mapping
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Key by remote command id and scope instead of command name
//! - 1.0.0: Initial implementation for handler dispatch

use dashmap::DashMap;
use std::sync::Arc;

use super::node::Node;
use crate::core::model::Scope;

/// A node registered remotely under one id
#[derive(Clone)]
pub struct Registration {
    pub node: Node,
    pub scope: Scope,
    pub name: String,
}

/// Mapping of remote command ids to the nodes they dispatch to
///
/// Written during registration and synchronization, read on every inbound
/// interaction.
///
/// # Example
///
/// ```ignore
/// let registry = CommandRegistry::new();
/// registry.register(1001, Scope::Global, Node::from(ping));
///
/// if let Some(registration) = registry.get(1001) {
///     let resolved = registration.node.resolve(&interaction.options)?;
/// }
/// ```
#[derive(Clone, Default)]
pub struct CommandRegistry {
    entries: Arc<DashMap<u64, Registration>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `id` to `node`, replacing any previous mapping for that id
    pub fn register(&self, id: u64, scope: Scope, node: Node) {
        let name = node.name();
        self.entries.insert(id, Registration { node, scope, name });
    }

    pub fn get(&self, id: u64) -> Option<Registration> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: u64) -> Option<Registration> {
        self.entries.remove(&id).map(|(_, registration)| registration)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ids under which `node` is registered
    pub fn ids_of(&self, node: &Node) -> Vec<(u64, Scope)> {
        let mut ids: Vec<(u64, Scope)> = self
            .entries
            .iter()
            .filter(|entry| entry.node.same(node))
            .map(|entry| (*entry.key(), entry.scope))
            .collect();
        ids.sort();
        ids
    }

    /// Id of the command called `name` in `scope`
    pub fn id_by_name(&self, scope: Scope, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.scope == scope && entry.name == name)
            .map(|entry| *entry.key())
    }

    /// Drop every mapping in `scope`
    pub fn clear_scope(&self, scope: Scope) {
        self.entries.retain(|_, registration| registration.scope != scope);
    }

    /// All mappings, ordered by id
    pub fn entries(&self) -> Vec<(u64, Registration)> {
        let mut entries: Vec<(u64, Registration)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
