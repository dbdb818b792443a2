//! Platform model shared by the schema, command tree and serenity adapters
//!
//! Covers the closed option-kind enumeration, channel kinds, static choices,
//! the wire command schema sent to the registry, the inbound interaction
//! payload and the resolved channel/user/role records handed to handlers.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Add `Response` rendering for interaction callbacks
//! - 1.1.0: Add `Scope` and `RemoteCommand` for registry sync
//! - 1.0.0: Initial model extracted from the slash command builders

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Interaction response flag hiding a message from everyone but the caller
const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Kind of a command option as the platform encodes it on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum OptionKind {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Unknown(u8),
}

impl From<u8> for OptionKind {
    fn from(value: u8) -> Self {
        match value {
            1 => OptionKind::SubCommand,
            2 => OptionKind::SubCommandGroup,
            3 => OptionKind::String,
            4 => OptionKind::Integer,
            5 => OptionKind::Boolean,
            6 => OptionKind::User,
            7 => OptionKind::Channel,
            8 => OptionKind::Role,
            9 => OptionKind::Mentionable,
            10 => OptionKind::Number,
            other => OptionKind::Unknown(other),
        }
    }
}

impl From<OptionKind> for u8 {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::SubCommand => 1,
            OptionKind::SubCommandGroup => 2,
            OptionKind::String => 3,
            OptionKind::Integer => 4,
            OptionKind::Boolean => 5,
            OptionKind::User => 6,
            OptionKind::Channel => 7,
            OptionKind::Role => 8,
            OptionKind::Mentionable => 9,
            OptionKind::Number => 10,
            OptionKind::Unknown(other) => other,
        }
    }
}

impl OptionKind {
    /// Whether this kind addresses a node of the command tree rather than a value
    pub fn is_subcommand(self) -> bool {
        matches!(self, OptionKind::SubCommand | OptionKind::SubCommandGroup)
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::SubCommand => write!(f, "SubCommand"),
            OptionKind::SubCommandGroup => write!(f, "SubCommandGroup"),
            OptionKind::String => write!(f, "String"),
            OptionKind::Integer => write!(f, "Integer"),
            OptionKind::Boolean => write!(f, "Boolean"),
            OptionKind::User => write!(f, "User"),
            OptionKind::Channel => write!(f, "Channel"),
            OptionKind::Role => write!(f, "Role"),
            OptionKind::Mentionable => write!(f, "Mentionable"),
            OptionKind::Number => write!(f, "Number"),
            OptionKind::Unknown(n) => write!(f, "Unknown({n})"),
        }
    }
}

/// Channel kind, used both for resolved channels and channel-option filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelKind {
    #[default]
    Text,
    Private,
    Voice,
    Group,
    Category,
    News,
    NewsThread,
    PublicThread,
    PrivateThread,
    Stage,
    Directory,
    Forum,
    Unknown(u8),
}

impl From<u8> for ChannelKind {
    fn from(value: u8) -> Self {
        match value {
            0 => ChannelKind::Text,
            1 => ChannelKind::Private,
            2 => ChannelKind::Voice,
            3 => ChannelKind::Group,
            4 => ChannelKind::Category,
            5 => ChannelKind::News,
            10 => ChannelKind::NewsThread,
            11 => ChannelKind::PublicThread,
            12 => ChannelKind::PrivateThread,
            13 => ChannelKind::Stage,
            14 => ChannelKind::Directory,
            15 => ChannelKind::Forum,
            other => ChannelKind::Unknown(other),
        }
    }
}

impl From<ChannelKind> for u8 {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Text => 0,
            ChannelKind::Private => 1,
            ChannelKind::Voice => 2,
            ChannelKind::Group => 3,
            ChannelKind::Category => 4,
            ChannelKind::News => 5,
            ChannelKind::NewsThread => 10,
            ChannelKind::PublicThread => 11,
            ChannelKind::PrivateThread => 12,
            ChannelKind::Stage => 13,
            ChannelKind::Directory => 14,
            ChannelKind::Forum => 15,
            ChannelKind::Unknown(other) => other,
        }
    }
}

/// Value carried by a static or autocompleted choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    String(String),
    Integer(i64),
    Number(f64),
}

/// A name/value pair offered to the caller for an option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
    pub value: ChoiceValue,
}

impl Choice {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ChoiceValue::String(value.into()),
        }
    }

    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: ChoiceValue::Integer(value),
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: ChoiceValue::Number(value),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One option of a wire command schema
///
/// Subcommand and subcommand-group options carry their children in `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOption {
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<ChannelKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<WireOption>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub autocomplete: bool,
}

impl WireOption {
    /// Bare option of the given kind, used for subcommand nodes
    pub fn node(kind: OptionKind, name: &str, description: &str, options: Vec<WireOption>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            description: description.to_string(),
            required: false,
            choices: Vec::new(),
            channel_types: Vec::new(),
            options,
            autocomplete: false,
        }
    }
}

/// Declarative command schema registered with the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCommand {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<WireOption>,
}

impl WireCommand {
    /// Whether the remote definition differs from this one in anything we register
    pub fn differs_from(&self, remote: &WireCommand) -> bool {
        self.description != remote.description
            || self.options.len() != remote.options.len()
            || self.options != remote.options
    }
}

/// A command definition as listed by the registry, with its remote identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub id: u64,
    #[serde(flatten)]
    pub command: WireCommand,
}

/// Registration scope of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Guild(u64),
}

impl Scope {
    pub fn guild_id(self) -> Option<u64> {
        match self {
            Scope::Global => None,
            Scope::Guild(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Guild(id) => write!(f, "guild {id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub mentionable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
}

/// Something that is either a user or a role
///
/// An id that resolves to neither leaves both sides empty; handlers must
/// tolerate that rather than expect one of them to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mentionable {
    pub user: Option<User>,
    pub role: Option<Role>,
}

impl Mentionable {
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.role.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    /// A command invocation
    Command,
    /// An input-suggestion request for the focused option
    Autocomplete,
}

/// One option value of an inbound interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<InteractionOption>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub focused: bool,
}

impl InteractionOption {
    pub fn new(name: impl Into<String>, kind: OptionKind, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: Some(value.into()),
            options: Vec::new(),
            focused: false,
        }
    }

    pub fn subcommand(name: impl Into<String>, options: Vec<InteractionOption>) -> Self {
        Self {
            name: name.into(),
            kind: OptionKind::SubCommand,
            value: None,
            options,
            focused: false,
        }
    }

    pub fn group(name: impl Into<String>, options: Vec<InteractionOption>) -> Self {
        Self {
            name: name.into(),
            kind: OptionKind::SubCommandGroup,
            value: None,
            options,
            focused: false,
        }
    }

    /// Mark this option as the autocomplete target
    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }
}

/// Inbound interaction event, reduced to what dispatch needs
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: u64,
    pub application_id: u64,
    pub token: String,
    pub kind: InteractionKind,
    pub command_id: u64,
    pub command_name: String,
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub user: User,
    /// Permission bits of the invoking member, absent outside guilds
    pub member_permissions: Option<u64>,
    pub options: Vec<InteractionOption>,
}

impl Interaction {
    pub fn new(
        kind: InteractionKind,
        command_id: u64,
        command_name: impl Into<String>,
        options: Vec<InteractionOption>,
    ) -> Self {
        Self {
            id: 0,
            application_id: 0,
            token: String::new(),
            kind,
            command_id,
            command_name: command_name.into(),
            guild_id: None,
            channel_id: 0,
            user: User::default(),
            member_permissions: None,
            options,
        }
    }

    pub fn scope(&self) -> Scope {
        match self.guild_id {
            Some(id) => Scope::Guild(id),
            None => Scope::Global,
        }
    }

    /// The option currently being typed, if this is an autocomplete request
    pub fn focused_option(&self) -> Option<&InteractionOption> {
        fn find(options: &[InteractionOption]) -> Option<&InteractionOption> {
            options.iter().find_map(|opt| {
                if opt.focused {
                    Some(opt)
                } else {
                    find(&opt.options)
                }
            })
        }
        find(&self.options)
    }
}

/// Interaction callback sent back through the session
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Message { content: String, ephemeral: bool },
    Deferred { ephemeral: bool },
    Autocomplete(Vec<Choice>),
}

impl Response {
    pub fn message(content: impl Into<String>) -> Self {
        Response::Message {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Response::Message {
            content: content.into(),
            ephemeral: true,
        }
    }

    /// Render as the platform's interaction callback body
    pub fn to_json(&self) -> Value {
        let flags = |ephemeral: bool| if ephemeral { EPHEMERAL_FLAG } else { 0 };
        match self {
            Response::Message { content, ephemeral } => json!({
                "type": 4,
                "data": { "content": content, "flags": flags(*ephemeral) },
            }),
            Response::Deferred { ephemeral } => json!({
                "type": 5,
                "data": { "flags": flags(*ephemeral) },
            }),
            Response::Autocomplete(choices) => json!({
                "type": 8,
                "data": { "choices": choices },
            }),
        }
    }
}
