//! Conversions between serenity's model and the platform model
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0

use serde::Serialize;
use serenity::model::application::command::{Command as SerenityCommand, CommandOption};
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandData, CommandDataOption,
};
use serenity::model::application::interaction::autocomplete::AutocompleteInteraction;
use serenity::model::channel::{Channel as SerenityChannel, PartialChannel};
use serenity::model::guild::{Member, Role as SerenityRole};
use serenity::model::user::User as SerenityUser;

use crate::core::model::{
    Channel, ChannelKind, Choice, ChoiceValue, Interaction, InteractionKind, InteractionOption, OptionKind,
    RemoteCommand, Role, User, WireCommand, WireOption,
};

/// Wire number of a serenity enum, which serenity serializes as its number
fn wire_number<T: Serialize>(value: &T) -> u8 {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_u64())
        .and_then(|n| u8::try_from(n).ok())
        .unwrap_or(u8::MAX)
}

pub fn user(user: &SerenityUser) -> User {
    User {
        id: user.id.0,
        name: user.name.clone(),
        bot: user.bot,
    }
}

pub fn role(role: &SerenityRole) -> Role {
    Role {
        id: role.id.0,
        name: role.name.clone(),
        mentionable: role.mentionable,
    }
}

pub fn partial_channel(channel: &PartialChannel) -> Channel {
    Channel {
        id: channel.id.0,
        name: channel.name.clone().unwrap_or_default(),
        kind: ChannelKind::from(wire_number(&channel.kind)),
    }
}

pub fn channel(channel: SerenityChannel) -> Channel {
    match channel {
        SerenityChannel::Guild(c) => Channel {
            id: c.id.0,
            kind: ChannelKind::from(wire_number(&c.kind)),
            name: c.name,
        },
        SerenityChannel::Private(c) => Channel {
            id: c.id.0,
            name: c.name(),
            kind: ChannelKind::Private,
        },
        SerenityChannel::Category(c) => Channel {
            id: c.id.0,
            name: c.name,
            kind: ChannelKind::Category,
        },
        other => Channel {
            id: other.id().0,
            name: String::new(),
            kind: ChannelKind::Unknown(u8::MAX),
        },
    }
}

fn option(option: &CommandDataOption) -> InteractionOption {
    InteractionOption {
        name: option.name.clone(),
        kind: OptionKind::from(wire_number(&option.kind)),
        value: option.value.clone(),
        options: option.options.iter().map(self::option).collect(),
        focused: option.focused,
    }
}

#[allow(clippy::too_many_arguments)]
fn interaction(
    kind: InteractionKind,
    id: u64,
    application_id: u64,
    token: &str,
    data: &CommandData,
    guild_id: Option<u64>,
    channel_id: u64,
    invoker: &SerenityUser,
    member: Option<&Member>,
) -> Interaction {
    Interaction {
        id,
        application_id,
        token: token.to_string(),
        kind,
        command_id: data.id.0,
        command_name: data.name.clone(),
        guild_id,
        channel_id,
        user: user(invoker),
        member_permissions: member.and_then(|m| m.permissions).map(|p| p.bits()),
        options: data.options.iter().map(option).collect(),
    }
}

pub fn command_interaction(command: &ApplicationCommandInteraction) -> Interaction {
    interaction(
        InteractionKind::Command,
        command.id.0,
        command.application_id.0,
        &command.token,
        &command.data,
        command.guild_id.map(|g| g.0),
        command.channel_id.0,
        &command.user,
        command.member.as_ref(),
    )
}

pub fn autocomplete_interaction(autocomplete: &AutocompleteInteraction) -> Interaction {
    interaction(
        InteractionKind::Autocomplete,
        autocomplete.id.0,
        autocomplete.application_id.0,
        &autocomplete.token,
        &autocomplete.data,
        autocomplete.guild_id.map(|g| g.0),
        autocomplete.channel_id.0,
        &autocomplete.user,
        autocomplete.member.as_ref(),
    )
}

fn choice_value(value: &serde_json::Value) -> ChoiceValue {
    serde_json::from_value(value.clone()).unwrap_or_else(|_| ChoiceValue::String(value.to_string()))
}

fn wire_option(option: &CommandOption) -> WireOption {
    WireOption {
        kind: OptionKind::from(wire_number(&option.kind)),
        name: option.name.clone(),
        description: option.description.clone(),
        required: option.required,
        choices: option
            .choices
            .iter()
            .map(|c| Choice {
                name: c.name.clone(),
                value: choice_value(&c.value),
            })
            .collect(),
        channel_types: option
            .channel_types
            .iter()
            .map(|kind| ChannelKind::from(wire_number(kind)))
            .collect(),
        options: option.options.iter().map(wire_option).collect(),
        autocomplete: option.autocomplete,
    }
}

/// A listed remote command in wire form, for diffing
pub fn remote_command(command: &SerenityCommand) -> RemoteCommand {
    RemoteCommand {
        id: command.id.0,
        command: WireCommand {
            name: command.name.clone(),
            description: command.description.clone(),
            options: command.options.iter().map(wire_option).collect(),
        },
    }
}
