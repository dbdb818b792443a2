//! Registry synchronization
//!
//! Reconciles locally declared commands with what the platform has
//! registered, one scope at a time. Not transactional: a failing call stops
//! the rest of that scope and the next run repairs it.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0

use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::core::error::PlatformError;
use crate::core::model::{RemoteCommand, Scope, WireCommand};

/// Remote command registry collaborator
///
/// `create` also serves as update: creating a command whose name already
/// exists in the scope overwrites it.
#[async_trait]
pub trait RegistryService: Send + Sync {
    async fn create(&self, scope: Scope, command: &WireCommand) -> Result<u64, PlatformError>;

    async fn delete(&self, scope: Scope, id: u64) -> Result<(), PlatformError>;

    async fn list(&self, scope: Scope) -> Result<Vec<RemoteCommand>, PlatformError>;
}

/// What a sync run did, by command name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
}

impl SyncReport {
    /// Whether the run issued no create or delete call
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }

    pub(crate) fn merge(&mut self, other: SyncReport) {
        self.created.extend(other.created);
        self.deleted.extend(other.deleted);
        self.unchanged.extend(other.unchanged);
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} deleted, {} unchanged",
            self.created.len(),
            self.deleted.len(),
            self.unchanged.len()
        )
    }
}

/// One or more scopes failed to synchronize
///
/// `report` still lists everything that did go through.
#[derive(Debug, Error)]
#[error("sync failed in {} scope(s), first: {}", .failures.len(), first_failure(.failures))]
pub struct SyncError {
    pub report: SyncReport,
    pub failures: Vec<PlatformError>,
}

fn first_failure(failures: &[PlatformError]) -> String {
    failures.first().map(ToString::to_string).unwrap_or_default()
}

/// Progress of one scope, kept even when the scope fails halfway
#[derive(Debug, Default)]
pub(crate) struct ScopeSync {
    /// Remote id of every local command known to be registered, by name
    pub bound: Vec<(String, u64)>,
    pub report: SyncReport,
}

/// Bring `scope` in line with `local`
pub(crate) async fn sync_scope(
    service: &dyn RegistryService,
    scope: Scope,
    local: &[WireCommand],
    progress: &mut ScopeSync,
) -> Result<(), PlatformError> {
    let remote = service.list(scope).await?;
    let remote_by_name: HashMap<&str, &RemoteCommand> = remote
        .iter()
        .map(|command| (command.command.name.as_str(), command))
        .collect();

    for command in local {
        match remote_by_name.get(command.name.as_str()) {
            Some(existing) if !command.differs_from(&existing.command) => {
                debug!("{} command \"{}\" is up to date", scope, command.name);
                progress.bound.push((command.name.clone(), existing.id));
                progress.report.unchanged.push(command.name.clone());
            }
            _ => {
                let id = service.create(scope, command).await?;
                info!("Registered {} command \"{}\" ({})", scope, command.name, id);
                progress.bound.push((command.name.clone(), id));
                progress.report.created.push(command.name.clone());
            }
        }
    }

    for stale in remote
        .iter()
        .filter(|listed| !local.iter().any(|command| command.name == listed.command.name))
    {
        service.delete(scope, stale.id).await?;
        info!("Deleted stale {} command \"{}\" ({})", scope, stale.command.name, stale.id);
        progress.report.deleted.push(stale.command.name.clone());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{OptionKind, WireOption};
    use crate::testing::MemoryRegistry;

    fn wire(name: &str, description: &str) -> WireCommand {
        WireCommand {
            name: name.to_string(),
            description: description.to_string(),
            options: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_sync_creates_and_deletes() {
        let registry = MemoryRegistry::default();
        registry.seed(Scope::Global, wire("legacy", "Old command"));

        let mut progress = ScopeSync::default();
        sync_scope(&registry, Scope::Global, &[wire("ping", "Pong")], &mut progress)
            .await
            .unwrap();

        assert_eq!(progress.report.created, vec!["ping"]);
        assert_eq!(progress.report.deleted, vec!["legacy"]);
        assert_eq!(progress.bound.len(), 1);
        assert_eq!(registry.names(Scope::Global), vec!["ping"]);
    }

    #[tokio::test]
    async fn test_second_sync_is_noop() {
        let registry = MemoryRegistry::default();
        let local = vec![wire("ping", "Pong"), wire("shutdown", "Stop")];

        let mut first = ScopeSync::default();
        sync_scope(&registry, Scope::Guild(5), &local, &mut first).await.unwrap();
        let calls = registry.calls();

        let mut second = ScopeSync::default();
        sync_scope(&registry, Scope::Guild(5), &local, &mut second).await.unwrap();

        assert!(second.report.is_noop());
        assert_eq!(second.report.unchanged.len(), 2);
        assert_eq!(registry.calls(), calls);
        assert_eq!(second.bound, first.bound);
    }

    #[tokio::test]
    async fn test_changed_options_are_recreated() {
        let registry = MemoryRegistry::default();
        registry.seed(Scope::Global, wire("ping", "Pong"));

        let mut changed = wire("ping", "Pong");
        changed.options.push(WireOption::node(OptionKind::String, "target", "Who", Vec::new()));

        let mut progress = ScopeSync::default();
        sync_scope(&registry, Scope::Global, &[changed], &mut progress).await.unwrap();
        assert_eq!(progress.report.created, vec!["ping"]);
        assert!(progress.report.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_partial_progress() {
        let registry = MemoryRegistry::default();
        registry.fail_on_create("shutdown");

        let local = vec![wire("ping", "Pong"), wire("shutdown", "Stop")];
        let mut progress = ScopeSync::default();
        let err = sync_scope(&registry, Scope::Global, &local, &mut progress)
            .await
            .unwrap_err();

        assert_eq!(err.scope, Scope::Global);
        assert_eq!(progress.report.created, vec!["ping"]);
        assert_eq!(registry.names(Scope::Global), vec!["ping"]);
    }
}
