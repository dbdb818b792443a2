//! Shared test fixtures: sample payloads, executors and in-memory collaborators

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::commands::context::{Meta, Request};
use crate::commands::executor::Executor;
use crate::commands::handler::{Data, Unmarshal};
use crate::commands::sync::RegistryService;
use crate::core::error::{PlatformError, PlatformOperation, SchemaError};
use crate::core::model::{
    Channel, Interaction, InteractionKind, InteractionOption, RemoteCommand, Response, Role, Scope, User,
    WireCommand,
};
use crate::core::session::Session;
use crate::schema::payload::{Fields, Payload};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reason {
    pub reason: String,
    pub silent: bool,
}

impl Payload for Reason {
    fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError> {
        fields
            .field("reason", "description:Why", |r| &mut r.reason)?
            .field("silent", "required:false", |r| &mut r.silent)?;
        Ok(())
    }
}

/// Two own fields followed by an embedded group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Announce {
    pub title: String,
    pub count: i64,
    pub reason: Reason,
}

impl Payload for Announce {
    fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError> {
        fields
            .field("title", "description:Headline", |a| &mut a.title)?
            .field("count", "required", |a| &mut a.count)?
            .embed(|a| &mut a.reason)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShutdownArgs {
    pub confirm: bool,
    pub message: Option<String>,
    pub path: Vec<String>,
}

impl Payload for ShutdownArgs {
    fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError> {
        fields
            .field("confirm", "description:Really shut down", |a| &mut a.confirm)?
            .field(
                "message",
                "required:false,description:Message shown before shutting down",
                |a| &mut a.message,
            )?
            .field("path", "special:path", |a| &mut a.path)?;
        Ok(())
    }
}

/// The invoking user, built from the interaction itself
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub id: u64,
    pub name: String,
}

#[async_trait]
impl Unmarshal for Caller {
    async fn unmarshal(
        _session: &Arc<dyn Session>,
        interaction: &Interaction,
        _options: &[InteractionOption],
    ) -> anyhow::Result<Self> {
        Ok(Caller {
            id: interaction.user.id,
            name: interaction.user.name.clone(),
        })
    }
}

/// `/ping`, answers "pong"
pub fn ping_executor() -> Executor {
    Executor::new(
        "ping",
        "Check the bot is alive",
        |session: Arc<dyn Session>, interaction: Arc<Interaction>| async move {
            session.respond(&interaction, &Response::message("pong")).await
        },
    )
    .unwrap()
}

/// `/shutdown`, fails unless confirmed
pub fn shutdown_executor() -> Executor {
    Executor::new(
        "shutdown",
        "Stop the bot",
        |session: Arc<dyn Session>, interaction: Arc<Interaction>, Data(args): Data<ShutdownArgs>| async move {
            if !args.confirm {
                bail!("not confirmed");
            }
            let content = format!("{} ({})", args.message.unwrap_or_default(), args.path.join("/"));
            session.respond(&interaction, &Response::ephemeral(content)).await
        },
    )
    .unwrap()
}

pub fn interaction(kind: InteractionKind, command_id: u64, name: &str, options: Vec<InteractionOption>) -> Interaction {
    let mut interaction = Interaction::new(kind, command_id, name, options);
    interaction.guild_id = Some(1);
    interaction.user = User {
        id: 10,
        name: "ada".to_string(),
        bot: false,
    };
    interaction
}

/// A bare request targeting `/ping`
pub fn request() -> Request {
    Request::new(
        Arc::new(MemorySession::default()),
        Arc::new(interaction(InteractionKind::Command, 1, "ping", Vec::new())),
        Vec::new(),
        Meta {
            path: vec!["ping".to_string()],
        },
        ping_executor().target(),
        false,
        CancellationToken::new(),
    )
}

#[derive(Default)]
pub struct MemorySession {
    users: HashMap<u64, User>,
    roles: HashMap<u64, Role>,
    channels: HashMap<u64, Channel>,
    responses: Mutex<Vec<Response>>,
}

impl MemorySession {
    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id, user);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role.id, role);
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.insert(channel.id, channel);
        self
    }

    pub fn responses(&self) -> Vec<Response> {
        self.responses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for MemorySession {
    fn application_id(&self) -> u64 {
        99
    }

    async fn user(&self, user_id: u64) -> Result<User> {
        self.users.get(&user_id).cloned().ok_or_else(|| anyhow!("unknown user {user_id}"))
    }

    async fn role(&self, _guild_id: Option<u64>, role_id: u64) -> Result<Role> {
        self.roles.get(&role_id).cloned().ok_or_else(|| anyhow!("unknown role {role_id}"))
    }

    async fn channel(&self, channel_id: u64) -> Result<Channel> {
        self.channels
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown channel {channel_id}"))
    }

    async fn respond(&self, _interaction: &Interaction, response: &Response) -> Result<()> {
        self.responses.lock().unwrap().push(response.clone());
        Ok(())
    }

    async fn edit_response(&self, _interaction: &Interaction, content: &str) -> Result<()> {
        self.responses.lock().unwrap().push(Response::message(content));
        Ok(())
    }
}

#[derive(Default)]
struct RegistryState {
    scopes: HashMap<Scope, Vec<RemoteCommand>>,
    next_id: u64,
    creates: usize,
    deletes: usize,
    fail_on_create: Option<String>,
}

/// Registry service keeping remote commands in memory and counting calls
#[derive(Default)]
pub struct MemoryRegistry {
    state: Mutex<RegistryState>,
}

impl MemoryRegistry {
    /// Put a command in place without counting it as a call
    pub fn seed(&self, scope: Scope, command: WireCommand) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = 1000 + state.next_id;
        state.scopes.entry(scope).or_default().push(RemoteCommand { id, command });
        id
    }

    pub fn names(&self, scope: Scope) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .scopes
            .get(&scope)
            .map(|commands| commands.iter().map(|c| c.command.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Create and delete calls so far
    pub fn calls(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.creates, state.deletes)
    }

    pub fn fail_on_create(&self, name: &str) {
        self.state.lock().unwrap().fail_on_create = Some(name.to_string());
    }
}

#[async_trait]
impl RegistryService for MemoryRegistry {
    async fn create(&self, scope: Scope, command: &WireCommand) -> Result<u64, PlatformError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on_create.as_deref() == Some(command.name.as_str()) {
            return Err(PlatformError::new(
                PlatformOperation::Create,
                scope,
                anyhow!("rejected {}", command.name),
            ));
        }

        state.creates += 1;
        state.next_id += 1;
        let id = 1000 + state.next_id;
        let remote = RemoteCommand {
            id,
            command: command.clone(),
        };

        let commands = state.scopes.entry(scope).or_default();
        match commands.iter().position(|c| c.command.name == command.name) {
            Some(position) => commands[position] = remote,
            None => commands.push(remote),
        }
        Ok(id)
    }

    async fn delete(&self, scope: Scope, id: u64) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.deletes += 1;
        let commands = state.scopes.entry(scope).or_default();
        let before = commands.len();
        commands.retain(|c| c.id != id);
        if commands.len() == before {
            return Err(PlatformError::new(
                PlatformOperation::Delete,
                scope,
                anyhow!("unknown command {id}"),
            ));
        }
        Ok(())
    }

    async fn list(&self, scope: Scope) -> Result<Vec<RemoteCommand>, PlatformError> {
        let state = self.state.lock().unwrap();
        Ok(state.scopes.get(&scope).cloned().unwrap_or_default())
    }
}
