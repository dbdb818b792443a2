//! Registry service over serenity's HTTP client
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0

use async_trait::async_trait;
use serenity::http::Http;
use std::sync::Arc;

use super::convert;
use crate::commands::sync::RegistryService;
use crate::core::error::{PlatformError, PlatformOperation};
use crate::core::model::{RemoteCommand, Scope, WireCommand};

/// Application command endpoints; the `Http` must carry the application id
pub struct SerenityRegistry {
    http: Arc<Http>,
}

impl SerenityRegistry {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RegistryService for SerenityRegistry {
    async fn create(&self, scope: Scope, command: &WireCommand) -> Result<u64, PlatformError> {
        let fail = |e: anyhow::Error| PlatformError::new(PlatformOperation::Create, scope, e);
        let body = serde_json::to_value(command).map_err(|e| fail(e.into()))?;

        let created = match scope {
            Scope::Global => self.http.create_global_application_command(&body).await,
            Scope::Guild(guild_id) => self.http.create_guild_application_command(guild_id, &body).await,
        }
        .map_err(|e| fail(e.into()))?;
        Ok(created.id.0)
    }

    async fn delete(&self, scope: Scope, id: u64) -> Result<(), PlatformError> {
        match scope {
            Scope::Global => self.http.delete_global_application_command(id).await,
            Scope::Guild(guild_id) => self.http.delete_guild_application_command(guild_id, id).await,
        }
        .map_err(|e| PlatformError::new(PlatformOperation::Delete, scope, e.into()))
    }

    async fn list(&self, scope: Scope) -> Result<Vec<RemoteCommand>, PlatformError> {
        let commands = match scope {
            Scope::Global => self.http.get_global_application_commands().await,
            Scope::Guild(guild_id) => self.http.get_guild_application_commands(guild_id).await,
        }
        .map_err(|e| PlatformError::new(PlatformOperation::List, scope, e.into()))?;
        Ok(commands.iter().map(convert::remote_command).collect())
    }
}
