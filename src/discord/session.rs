//! Session over serenity's HTTP client
//!
//! Lookups use the data Discord resolved into the interaction first and fall
//! back to HTTP only for ids it did not include.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use log::debug;
use serenity::http::Http;
use serenity::model::application::interaction::application_command::CommandDataResolved;
use std::collections::HashMap;
use std::sync::Arc;

use super::convert;
use crate::core::model::{Channel, Interaction, Response, Role, User};
use crate::core::session::Session;

#[derive(Debug, Default)]
struct Resolved {
    users: HashMap<u64, User>,
    roles: HashMap<u64, Role>,
    channels: HashMap<u64, Channel>,
}

impl From<&CommandDataResolved> for Resolved {
    fn from(resolved: &CommandDataResolved) -> Self {
        Self {
            users: resolved.users.iter().map(|(id, u)| (id.0, convert::user(u))).collect(),
            roles: resolved.roles.iter().map(|(id, r)| (id.0, convert::role(r))).collect(),
            channels: resolved
                .channels
                .iter()
                .map(|(id, c)| (id.0, convert::partial_channel(c)))
                .collect(),
        }
    }
}

/// Per-interaction session handed to the engine
pub struct SerenitySession {
    http: Arc<Http>,
    application_id: u64,
    resolved: Resolved,
}

impl SerenitySession {
    pub fn new(http: Arc<Http>, application_id: u64) -> Self {
        Self {
            http,
            application_id,
            resolved: Resolved::default(),
        }
    }

    /// Session that answers lookups from the interaction's resolved data first
    pub fn with_resolved(mut self, resolved: &CommandDataResolved) -> Self {
        self.resolved = Resolved::from(resolved);
        self
    }
}

#[async_trait]
impl Session for SerenitySession {
    fn application_id(&self) -> u64 {
        self.application_id
    }

    async fn user(&self, user_id: u64) -> Result<User> {
        if let Some(user) = self.resolved.users.get(&user_id) {
            return Ok(user.clone());
        }
        debug!("🔍 Fetching user {user_id}");
        let user = self.http.get_user(user_id).await.context("fetching user")?;
        Ok(convert::user(&user))
    }

    async fn role(&self, guild_id: Option<u64>, role_id: u64) -> Result<Role> {
        if let Some(role) = self.resolved.roles.get(&role_id) {
            return Ok(role.clone());
        }
        let guild_id = guild_id.ok_or_else(|| anyhow!("role {role_id} looked up outside a guild"))?;
        debug!("🔍 Fetching roles of guild {guild_id}");
        let roles = self.http.get_guild_roles(guild_id).await.context("fetching roles")?;
        roles
            .iter()
            .find(|role| role.id.0 == role_id)
            .map(convert::role)
            .ok_or_else(|| anyhow!("role {role_id} not found in guild {guild_id}"))
    }

    async fn channel(&self, channel_id: u64) -> Result<Channel> {
        if let Some(channel) = self.resolved.channels.get(&channel_id) {
            return Ok(channel.clone());
        }
        debug!("🔍 Fetching channel {channel_id}");
        let channel = self.http.get_channel(channel_id).await.context("fetching channel")?;
        Ok(convert::channel(channel))
    }

    async fn respond(&self, interaction: &Interaction, response: &Response) -> Result<()> {
        self.http
            .create_interaction_response(interaction.id, &interaction.token, &response.to_json())
            .await
            .context("sending interaction response")?;
        Ok(())
    }

    async fn edit_response(&self, interaction: &Interaction, content: &str) -> Result<()> {
        self.http
            .edit_original_interaction_response(&interaction.token, &serde_json::json!({ "content": content }))
            .await
            .context("editing interaction response")?;
        Ok(())
    }
}
