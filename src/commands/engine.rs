//! Command engine
//!
//! Owns the command tree per scope, the mapping from remote command ids to
//! tree nodes, the root interceptor chain and the operator callbacks. One
//! engine serves one application.
//!
//! Dispatch resolves the target under the tree's read locks, copies out what
//! it needs and releases every lock before the chain runs, so handlers may
//! add or remove commands themselves.
//!
//! - **Version**: 1.4.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.4.0: Caller-supplied cancellation, empty autocomplete answer on failure
//! - 1.3.0: Diff-based `sync_commands`
//! - 1.2.0: Autocomplete dispatch
//! - 1.1.0: Raw handler for interactions on unknown commands
//! - 1.0.0: Initial registration and dispatch

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::context::{Meta, Request};
use super::handler::BoxFuture;
use super::middleware::{Chain, Next};
use super::node::{read, write, Node};
use super::registry::{CommandRegistry, Registration};
use super::sync::{sync_scope, RegistryService, ScopeSync, SyncError, SyncReport};
use crate::core::error::{DispatchError, ParsingError, PlatformError, PlatformOperation};
use crate::core::model::{Choice, Interaction, InteractionKind, Response, Scope};
use crate::core::session::Session;
use crate::schema::reconstruct::find_field;

/// Receives every dispatch failure
pub type ErrorHandler =
    Arc<dyn Fn(Arc<dyn Session>, Arc<Interaction>, DispatchError) -> BoxFuture<'static, ()> + Send + Sync>;

/// Receives interactions addressed to command ids the engine does not know
pub type RawHandler = Arc<dyn Fn(Arc<dyn Session>, Arc<Interaction>) -> BoxFuture<'static, ()> + Send + Sync>;

fn default_error_handler() -> ErrorHandler {
    Arc::new(
        |_session: Arc<dyn Session>, interaction: Arc<Interaction>, err: DispatchError| -> BoxFuture<'static, ()> {
            Box::pin(async move {
                error!(
                    "❌ Command \"{}\" ({}) failed: {}",
                    interaction.command_name, interaction.command_id, err
                );
            })
        },
    )
}

fn default_raw_handler() -> RawHandler {
    Arc::new(
        |_session: Arc<dyn Session>, interaction: Arc<Interaction>| -> BoxFuture<'static, ()> {
            Box::pin(async move {
                warn!(
                    "⚠️ Interaction for unknown command \"{}\" ({})",
                    interaction.command_name, interaction.command_id
                );
            })
        },
    )
}

pub struct Engine {
    service: Arc<dyn RegistryService>,
    commands: RwLock<IndexMap<Scope, IndexMap<String, Node>>>,
    registry: CommandRegistry,
    middleware: RwLock<Chain>,
    error_handler: RwLock<ErrorHandler>,
    raw_handler: RwLock<RawHandler>,
    // Serializes register/sync/unregister runs
    sync_lock: Mutex<()>,
}

impl Engine {
    pub fn new(service: Arc<dyn RegistryService>) -> Self {
        Self {
            service,
            commands: RwLock::new(IndexMap::new()),
            registry: CommandRegistry::new(),
            middleware: RwLock::new(Chain::new()),
            error_handler: RwLock::new(default_error_handler()),
            raw_handler: RwLock::new(default_raw_handler()),
            sync_lock: Mutex::new(()),
        }
    }

    /// Add a global command, replacing one with the same name
    pub fn add_command(&self, node: impl Into<Node>) {
        self.add_scoped(Scope::Global, node.into());
    }

    /// Add a command to one guild, replacing one with the same name
    pub fn add_guild_command(&self, guild_id: u64, node: impl Into<Node>) {
        self.add_scoped(Scope::Guild(guild_id), node.into());
    }

    fn add_scoped(&self, scope: Scope, node: Node) {
        node.lock();
        let name = node.name();

        // A replaced command keeps its remote id until the next sync
        if let Some(id) = self.registry.id_by_name(scope, &name) {
            self.registry.register(id, scope, node.clone());
        }

        debug!("➕ Added {} command \"{}\"", scope, name);
        write(&self.commands).entry(scope).or_default().insert(name, node);
    }

    /// Remove a global command and delete its remote registrations
    pub async fn remove_command(&self, node: impl Into<Node>) -> Result<(), PlatformError> {
        self.remove_scoped(Scope::Global, node.into()).await
    }

    /// Remove a guild command and delete its remote registrations
    pub async fn remove_guild_command(&self, guild_id: u64, node: impl Into<Node>) -> Result<(), PlatformError> {
        self.remove_scoped(Scope::Guild(guild_id), node.into()).await
    }

    async fn remove_scoped(&self, scope: Scope, node: Node) -> Result<(), PlatformError> {
        {
            let mut commands = write(&self.commands);
            if let Some(nodes) = commands.get_mut(&scope) {
                nodes.retain(|_, existing| !existing.same(&node));
            }
        }

        // The node is gone locally, so its ids stop dispatching whatever the platform says
        let ids: Vec<u64> = self
            .registry
            .ids_of(&node)
            .into_iter()
            .filter(|(_, registered_scope)| *registered_scope == scope)
            .map(|(id, _)| id)
            .collect();
        for id in &ids {
            self.registry.remove(*id);
        }

        let _guard = self.sync_lock.lock().await;
        let mut first_failure = None;
        for id in ids {
            match self.service.delete(scope, id).await {
                Ok(()) => info!("🗑️ Deleted {} command \"{}\" ({})", scope, node.name(), id),
                Err(e) => {
                    warn!("⚠️ Could not delete {} command \"{}\" ({}): {}", scope, node.name(), id, e);
                    first_failure.get_or_insert(e);
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Root interceptors, run before every command's own
    pub fn set_middleware(&self, chain: Chain) {
        *write(&self.middleware) = chain;
    }

    pub fn middleware(&self) -> Chain {
        read(&self.middleware).clone()
    }

    pub fn set_error_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<dyn Session>, Arc<Interaction>, DispatchError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *write(&self.error_handler) = Arc::new(
            move |session: Arc<dyn Session>, interaction: Arc<Interaction>, err: DispatchError| -> BoxFuture<'static, ()> {
                Box::pin(handler(session, interaction, err))
            },
        );
    }

    pub fn set_raw_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<dyn Session>, Arc<Interaction>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *write(&self.raw_handler) = Arc::new(
            move |session: Arc<dyn Session>, interaction: Arc<Interaction>| -> BoxFuture<'static, ()> {
                Box::pin(handler(session, interaction))
            },
        );
    }

    /// Local commands by scope, in insertion order
    fn snapshot(&self) -> Vec<(Scope, Vec<Node>)> {
        read(&self.commands)
            .iter()
            .map(|(scope, nodes)| (*scope, nodes.values().cloned().collect()))
            .collect()
    }

    /// Create every local command remotely, without comparing
    ///
    /// Stops at the first failure; commands created before it stay mapped.
    pub async fn register_commands(&self) -> Result<SyncReport, PlatformError> {
        let _guard = self.sync_lock.lock().await;
        let mut report = SyncReport::default();

        for (scope, nodes) in self.snapshot() {
            for node in nodes {
                let id = self.service.create(scope, &node.wire_command()).await?;
                info!("✅ Registered {} command \"{}\" ({})", scope, node.name(), id);
                report.created.push(node.name());
                self.registry.register(id, scope, node);
            }
        }
        Ok(report)
    }

    /// Reconcile every scope with the platform
    ///
    /// Scopes fail independently. On return the id mapping reflects what is
    /// known to be registered, including partial progress of failed scopes.
    pub async fn sync_commands(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.sync_lock.lock().await;
        let mut report = SyncReport::default();
        let mut failures = Vec::new();

        for (scope, nodes) in self.snapshot() {
            let local: Vec<_> = nodes.iter().map(Node::wire_command).collect();
            let mut progress = ScopeSync::default();
            let outcome = sync_scope(self.service.as_ref(), scope, &local, &mut progress).await;

            // Bind against the tree as it is now; it may have changed while the platform calls ran
            let current = read(&self.commands).get(&scope).cloned().unwrap_or_default();
            self.registry.clear_scope(scope);
            for (name, id) in &progress.bound {
                if let Some(node) = current.get(name) {
                    self.registry.register(*id, scope, node.clone());
                }
            }

            match outcome {
                Ok(()) => info!("🔄 Synced {} commands: {}", scope, progress.report),
                Err(e) => {
                    error!("❌ Sync of {} commands aborted: {}", scope, e);
                    failures.push(e);
                }
            }
            report.merge(progress.report);
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(SyncError { report, failures })
        }
    }

    /// Delete every registered command remotely
    pub async fn unregister_commands(&self) -> Result<(), PlatformError> {
        let _guard = self.sync_lock.lock().await;
        for (id, registration) in self.registry.entries() {
            self.service.delete(registration.scope, id).await?;
            self.registry.remove(id);
            info!("🗑️ Unregistered {} command \"{}\" ({})", registration.scope, registration.name, id);
        }
        Ok(())
    }

    /// Every remote id the engine dispatches, ordered by id
    pub fn registered(&self) -> Vec<(u64, Registration)> {
        self.registry.entries()
    }

    pub fn is_registered(&self, id: u64) -> bool {
        self.registry.contains(id)
    }

    /// Drop all commands, mappings and callbacks
    pub fn close(&self) {
        write(&self.commands).clear();
        self.registry.clear();
        *write(&self.middleware) = Chain::new();
        *write(&self.error_handler) = default_error_handler();
        *write(&self.raw_handler) = default_raw_handler();
    }

    /// Dispatch one inbound interaction
    ///
    /// Never fails: errors go to the error handler, interactions for unknown
    /// command ids to the raw handler.
    pub async fn handle(&self, session: Arc<dyn Session>, interaction: Interaction) {
        self.handle_with_context(session, interaction, CancellationToken::new()).await
    }

    /// Same as `handle`, with a cancellation token every handler can extract
    pub async fn handle_with_context(
        &self,
        session: Arc<dyn Session>,
        interaction: Interaction,
        token: CancellationToken,
    ) {
        let request_id = Uuid::new_v4();
        let interaction = Arc::new(interaction);
        info!(
            "[{}] 📥 {:?} for \"{}\" | User: {} | Guild: {:?}",
            request_id, interaction.kind, interaction.command_name, interaction.user.id, interaction.guild_id
        );

        if !self.registry.contains(interaction.command_id) {
            warn!("[{request_id}] ⚠️ Unknown command id {}", interaction.command_id);
            let raw = read(&self.raw_handler).clone();
            raw(session, interaction).await;
            return;
        }

        let result = match interaction.kind {
            InteractionKind::Command => {
                self.execute_with_context(Arc::clone(&session), Arc::clone(&interaction), token)
                    .await
            }
            InteractionKind::Autocomplete => {
                let choices = match self
                    .autocomplete_with_context(Arc::clone(&session), Arc::clone(&interaction), token)
                    .await
                {
                    Ok(choices) => choices,
                    Err(err) => {
                        // The client keeps waiting for an answer, so it still gets an empty list
                        self.report(request_id, Arc::clone(&session), Arc::clone(&interaction), err)
                            .await;
                        Vec::new()
                    }
                };
                session
                    .respond(&interaction, &Response::Autocomplete(choices))
                    .await
                    .map_err(|e| {
                        DispatchError::from(PlatformError::new(PlatformOperation::Respond, interaction.scope(), e))
                    })
            }
        };

        match result {
            Ok(()) => debug!("[{request_id}] ✅ Dispatch completed"),
            Err(err) => self.report(request_id, session, interaction, err).await,
        }
    }

    async fn report(
        &self,
        request_id: Uuid,
        session: Arc<dyn Session>,
        interaction: Arc<Interaction>,
        err: DispatchError,
    ) {
        if err.is_desync() {
            warn!("[{request_id}] ⚠️ Local schema and registered command disagree: {err}");
        }
        let handler = read(&self.error_handler).clone();
        handler(session, interaction, err).await;
    }

    fn lookup(&self, interaction: &Interaction) -> Result<Registration, DispatchError> {
        self.registry
            .get(interaction.command_id)
            .ok_or(DispatchError::UnknownCommand(interaction.command_id))
    }

    /// Run the command an interaction addresses through its full interceptor chain
    pub async fn execute(&self, session: Arc<dyn Session>, interaction: Arc<Interaction>) -> Result<(), DispatchError> {
        self.execute_with_context(session, interaction, CancellationToken::new())
            .await
    }

    pub async fn execute_with_context(
        &self,
        session: Arc<dyn Session>,
        interaction: Arc<Interaction>,
        token: CancellationToken,
    ) -> Result<(), DispatchError> {
        let registration = self.lookup(&interaction)?;
        let resolved = registration.node.resolve(&interaction.options)?;
        debug!("🧭 Resolved {:?} to \"{}\"", resolved.path, resolved.executor.name());

        let handler = resolved.executor.handler();
        let target = resolved.executor.target();
        let chain = self.middleware().extend(&resolved.chain);

        let request = Request::new(
            session,
            interaction,
            resolved.options,
            Meta { path: resolved.path },
            target,
            false,
            token,
        );
        let terminal: Next =
            Arc::new(move |request: Request| -> BoxFuture<'static, Result<(), DispatchError>> { handler.call(request) });
        chain.then(terminal)(request).await
    }

    /// Produce the choices for the focused option of an autocomplete interaction
    ///
    /// Interceptors do not run for autocomplete requests.
    pub async fn autocomplete(
        &self,
        session: Arc<dyn Session>,
        interaction: Arc<Interaction>,
    ) -> Result<Vec<Choice>, DispatchError> {
        self.autocomplete_with_context(session, interaction, CancellationToken::new())
            .await
    }

    pub async fn autocomplete_with_context(
        &self,
        session: Arc<dyn Session>,
        interaction: Arc<Interaction>,
        token: CancellationToken,
    ) -> Result<Vec<Choice>, DispatchError> {
        let registration = self.lookup(&interaction)?;
        let resolved = registration.node.resolve(&interaction.options)?;
        let target = resolved.executor.target();

        let focused = resolved
            .options
            .iter()
            .find(|option| option.focused)
            .ok_or(ParsingError::NoFocus)?;
        let (_, field) = find_field(&target.fields, focused)?;
        let handler = field
            .autocomplete
            .clone()
            .ok_or_else(|| ParsingError::NoAutocomplete(field.field_name().to_string()))?;
        debug!("💡 Autocomplete for \"{}\" on {:?}", field.name, resolved.path);

        let request = Request::new(
            session,
            interaction,
            resolved.options,
            Meta { path: resolved.path },
            target,
            true,
            token,
        );
        handler.call(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::command::Command;
    use crate::commands::group::SubcommandGroup;
    use crate::commands::handler::Data;
    use crate::commands::middleware::from_fn;
    use crate::commands::executor::Executor;
    use crate::core::model::{InteractionOption, OptionKind, RemoteCommand, WireCommand};
    use crate::testing::{interaction, ping_executor, shutdown_executor, MemoryRegistry, MemorySession, ShutdownArgs};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn engine() -> (Engine, Arc<MemoryRegistry>) {
        let registry = Arc::new(MemoryRegistry::default());
        (Engine::new(registry.clone()), registry)
    }

    fn id_of(engine: &Engine, name: &str) -> u64 {
        engine
            .registered()
            .into_iter()
            .find(|(_, registration)| registration.name == name)
            .map(|(id, _)| id)
            .unwrap()
    }

    fn capture_errors(engine: &Engine) -> Arc<StdMutex<Vec<String>>> {
        let errors = Arc::new(StdMutex::new(Vec::new()));
        let sink = errors.clone();
        engine.set_error_handler(move |_session, _interaction, err| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(err.to_string());
            }
        });
        errors
    }

    /// `/cmd`, records `tag` each time it runs
    fn recording(tag: &'static str, log: Arc<StdMutex<Vec<&'static str>>>) -> Executor {
        Executor::new("cmd", "Records which version ran", move || {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(tag);
                anyhow::Ok(())
            }
        })
        .unwrap()
    }

    /// Holds every `list` call until released
    #[derive(Default)]
    struct GatedRegistry {
        inner: MemoryRegistry,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RegistryService for GatedRegistry {
        async fn create(&self, scope: Scope, command: &WireCommand) -> Result<u64, PlatformError> {
            self.inner.create(scope, command).await
        }

        async fn delete(&self, scope: Scope, id: u64) -> Result<(), PlatformError> {
            self.inner.delete(scope, id).await
        }

        async fn list(&self, scope: Scope) -> Result<Vec<RemoteCommand>, PlatformError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.list(scope).await
        }
    }

    fn admin_command() -> Command {
        let command = Command::new("bot", "Bot tools").unwrap();
        command.add_subcommand(ping_executor()).unwrap();
        let admin = SubcommandGroup::new("admin", "Admin tools").unwrap();
        admin.add_subcommand(shutdown_executor());
        command.add_group(admin).unwrap();
        command
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let (engine, _) = engine();
        let ping = ping_executor();
        engine.add_command(ping.clone());
        assert!(ping.is_locked());

        let report = engine.register_commands().await.unwrap();
        assert_eq!(report.created, vec!["ping"]);

        let id = id_of(&engine, "ping");
        assert!(engine.is_registered(id));

        let session = Arc::new(MemorySession::default());
        engine
            .handle(session.clone(), interaction(InteractionKind::Command, id, "ping", Vec::new()))
            .await;
        assert_eq!(session.responses(), vec![Response::message("pong")]);
    }

    #[tokio::test]
    async fn test_grouped_payload_receives_path() {
        let (engine, _) = engine();
        engine.add_guild_command(1, admin_command());
        engine.register_commands().await.unwrap();
        let id = id_of(&engine, "bot");

        let options = vec![InteractionOption::group(
            "admin",
            vec![InteractionOption::subcommand(
                "shutdown",
                vec![
                    InteractionOption::new("confirm", OptionKind::Boolean, true),
                    InteractionOption::new("message", OptionKind::String, "bye"),
                ],
            )],
        )];
        let session = Arc::new(MemorySession::default());
        engine
            .execute(
                session.clone(),
                Arc::new(interaction(InteractionKind::Command, id, "bot", options)),
            )
            .await
            .unwrap();

        assert_eq!(session.responses(), vec![Response::ephemeral("bye (bot/admin/shutdown)")]);
    }

    #[tokio::test]
    async fn test_root_short_circuit_skips_handler() {
        let (engine, _) = engine();
        let errors = capture_errors(&engine);
        engine.set_middleware(Chain::new().append(from_fn(|_request: Request, _next: Next| async {
            Err(DispatchError::middleware(anyhow::anyhow!("members only")))
        })));
        engine.add_command(ping_executor());
        engine.register_commands().await.unwrap();

        let session = Arc::new(MemorySession::default());
        let id = id_of(&engine, "ping");
        engine
            .handle(session.clone(), interaction(InteractionKind::Command, id, "ping", Vec::new()))
            .await;

        assert!(session.responses().is_empty());
        assert_eq!(*errors.lock().unwrap(), vec!["middleware declined: members only"]);
    }

    #[tokio::test]
    async fn test_desync_reaches_error_handler() {
        let (engine, _) = engine();
        let errors = capture_errors(&engine);
        engine.add_command(admin_command());
        engine.register_commands().await.unwrap();
        let id = id_of(&engine, "bot");

        let options = vec![InteractionOption::group("missing", Vec::new())];
        let session = Arc::new(MemorySession::default());
        engine
            .handle(session.clone(), interaction(InteractionKind::Command, id, "bot", options))
            .await;

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("missing subcommand group"));
    }

    #[tokio::test]
    async fn test_unknown_command_goes_to_raw_handler() {
        let (engine, _) = engine();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        engine.set_raw_handler(move |_session, interaction| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(interaction.command_id);
            }
        });

        let session = Arc::new(MemorySession::default());
        engine
            .handle(session, interaction(InteractionKind::Command, 404, "gone", Vec::new()))
            .await;
        assert_eq!(*seen.lock().unwrap(), vec![404]);
    }

    #[tokio::test]
    async fn test_autocomplete_responds_with_choices() {
        let (engine, _) = engine();
        let shutdown = shutdown_executor();
        shutdown
            .set_autocomplete("message", |meta: Meta, Data(args): Data<ShutdownArgs>| async move {
                let typed = args.message.unwrap_or_default();
                vec![Choice::string(format!("{typed} from /{}", meta.path.join(" ")), typed)]
            })
            .unwrap();
        engine.add_command(shutdown);
        engine.register_commands().await.unwrap();
        let id = id_of(&engine, "shutdown");

        let options = vec![
            InteractionOption::new("confirm", OptionKind::Boolean, true),
            InteractionOption::new("message", OptionKind::String, "see").focused(),
        ];
        let session = Arc::new(MemorySession::default());
        engine
            .handle(session.clone(), interaction(InteractionKind::Autocomplete, id, "shutdown", options))
            .await;

        assert_eq!(
            session.responses(),
            vec![Response::Autocomplete(vec![Choice::string("see from /shutdown", "see")])]
        );
    }

    #[tokio::test]
    async fn test_autocomplete_without_handler() {
        let (engine, _) = engine();
        engine.add_command(shutdown_executor());
        engine.register_commands().await.unwrap();
        let id = id_of(&engine, "shutdown");

        let session: Arc<dyn Session> = Arc::new(MemorySession::default());
        let focused = vec![InteractionOption::new("confirm", OptionKind::Boolean, true).focused()];
        let err = engine
            .autocomplete(
                session.clone(),
                Arc::new(interaction(InteractionKind::Autocomplete, id, "shutdown", focused)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Parsing(ParsingError::NoAutocomplete(_))));

        let err = engine
            .autocomplete(
                session,
                Arc::new(interaction(InteractionKind::Autocomplete, id, "shutdown", Vec::new())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Parsing(ParsingError::NoFocus)));
    }

    #[tokio::test]
    async fn test_failed_autocomplete_answers_empty() {
        let (engine, _) = engine();
        let errors = capture_errors(&engine);
        engine.add_command(shutdown_executor());
        engine.register_commands().await.unwrap();
        let id = id_of(&engine, "shutdown");

        let focused = vec![InteractionOption::new("confirm", OptionKind::Boolean, true).focused()];
        let session = Arc::new(MemorySession::default());
        engine
            .handle(session.clone(), interaction(InteractionKind::Autocomplete, id, "shutdown", focused))
            .await;

        assert_eq!(session.responses(), vec![Response::Autocomplete(Vec::new())]);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_handler_sees_caller_token() {
        let (engine, _) = engine();
        let watch = Executor::new(
            "watch",
            "Reports cancellation",
            |session: Arc<dyn Session>, interaction: Arc<Interaction>, token: CancellationToken| async move {
                let state = if token.is_cancelled() { "cancelled" } else { "running" };
                session.respond(&interaction, &Response::message(state)).await
            },
        )
        .unwrap();
        engine.add_command(watch);
        engine.register_commands().await.unwrap();
        let id = id_of(&engine, "watch");

        let session = Arc::new(MemorySession::default());
        let token = CancellationToken::new();
        token.cancel();
        engine
            .handle_with_context(
                session.clone(),
                interaction(InteractionKind::Command, id, "watch", Vec::new()),
                token,
            )
            .await;
        engine
            .handle(session.clone(), interaction(InteractionKind::Command, id, "watch", Vec::new()))
            .await;

        assert_eq!(
            session.responses(),
            vec![Response::message("cancelled"), Response::message("running")]
        );
    }

    #[tokio::test]
    async fn test_handler_can_add_and_sync() {
        let registry = Arc::new(MemoryRegistry::default());
        let engine = Arc::new(Engine::new(registry.clone()));
        let handle = Arc::clone(&engine);
        let install = Executor::new("install", "Publishes ping", move || {
            let engine = Arc::clone(&handle);
            async move {
                engine.add_command(ping_executor());
                engine.sync_commands().await?;
                anyhow::Ok(())
            }
        })
        .unwrap();
        engine.add_command(install);
        engine.sync_commands().await.unwrap();
        let id = id_of(&engine, "install");

        let errors = capture_errors(&engine);
        let session = Arc::new(MemorySession::default());
        let dispatch = engine.handle(session, interaction(InteractionKind::Command, id, "install", Vec::new()));
        tokio::time::timeout(Duration::from_secs(5), dispatch)
            .await
            .expect("dispatch deadlocked");

        assert!(errors.lock().unwrap().is_empty());
        assert!(engine.is_registered(id_of(&engine, "ping")));
        assert_eq!(registry.names(Scope::Global), vec!["install", "ping"]);
    }

    #[tokio::test]
    async fn test_add_during_sync_wins() {
        let registry = Arc::new(GatedRegistry::default());
        let engine = Arc::new(Engine::new(registry.clone()));
        let ran = Arc::new(StdMutex::new(Vec::new()));
        engine.add_command(recording("old", ran.clone()));

        let syncing = Arc::clone(&engine);
        let sync = tokio::spawn(async move { syncing.sync_commands().await });
        registry.entered.notified().await;
        engine.add_command(recording("new", ran.clone()));
        registry.release.notify_one();
        sync.await.unwrap().unwrap();

        let id = id_of(&engine, "cmd");
        engine
            .handle(
                Arc::new(MemorySession::default()),
                interaction(InteractionKind::Command, id, "cmd", Vec::new()),
            )
            .await;
        assert_eq!(*ran.lock().unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_sync_twice_is_noop() {
        let (engine, registry) = engine();
        engine.add_command(ping_executor());
        engine.add_guild_command(1, admin_command());

        let first = engine.sync_commands().await.unwrap();
        assert_eq!(first.created.len(), 2);
        let calls = registry.calls();

        let second = engine.sync_commands().await.unwrap();
        assert!(second.is_noop());
        assert_eq!(registry.calls(), calls);
        assert_eq!(engine.registered().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_failure_is_scoped() {
        let (engine, registry) = engine();
        registry.fail_on_create("bot");
        engine.add_command(ping_executor());
        engine.add_guild_command(1, admin_command());

        let err = engine.sync_commands().await.unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].scope, Scope::Guild(1));
        assert_eq!(err.report.created, vec!["ping"]);
        assert_eq!(engine.registered().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_command_deletes_registration() {
        let (engine, registry) = engine();
        let ping = ping_executor();
        engine.add_command(ping.clone());
        engine.register_commands().await.unwrap();

        engine.remove_command(ping).await.unwrap();
        assert!(engine.registered().is_empty());
        assert!(registry.names(Scope::Global).is_empty());
    }

    #[tokio::test]
    async fn test_remove_command_unmaps_when_delete_fails() {
        let (engine, registry) = engine();
        let ping = ping_executor();
        engine.add_command(ping.clone());
        engine.register_commands().await.unwrap();
        let id = id_of(&engine, "ping");

        // Deleted remotely behind the engine's back, so the engine's delete fails
        registry.delete(Scope::Global, id).await.unwrap();
        assert!(engine.remove_command(ping).await.is_err());
        assert!(!engine.is_registered(id));

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        engine.set_raw_handler(move |_session, interaction| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(interaction.command_id);
            }
        });
        let session = Arc::new(MemorySession::default());
        engine
            .handle(session.clone(), interaction(InteractionKind::Command, id, "ping", Vec::new()))
            .await;
        assert!(session.responses().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_unregister_and_close() {
        let (engine, registry) = engine();
        engine.add_command(ping_executor());
        engine.add_guild_command(1, admin_command());
        engine.register_commands().await.unwrap();

        engine.unregister_commands().await.unwrap();
        assert!(engine.registered().is_empty());
        assert_eq!(registry.calls(), (2, 2));

        engine.close();
        let report = engine.sync_commands().await.unwrap();
        assert!(report.is_noop());
    }
}
