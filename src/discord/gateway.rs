//! Gateway event handler
//!
//! Brings the remote registry in line once the gateway is ready, then hands
//! every command and autocomplete interaction to the engine.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0

use log::{debug, error, info, warn};
use serenity::async_trait;
use serenity::model::application::interaction::Interaction as SerenityInteraction;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;

use super::convert;
use super::session::SerenitySession;
use crate::commands::engine::Engine;

pub struct Gateway {
    engine: Arc<Engine>,
    sync: bool,
}

impl Gateway {
    /// With `sync` the remote registry is diffed on ready; otherwise every
    /// command is created unconditionally
    pub fn new(engine: Arc<Engine>, sync: bool) -> Self {
        Self { engine, sync }
    }

    async fn publish(&self) {
        if self.sync {
            match self.engine.sync_commands().await {
                Ok(report) => info!("✅ Commands in sync: {report}"),
                Err(e) => {
                    error!("❌ Failed to sync slash commands: {e}");
                    for failure in &e.failures {
                        error!("   - {failure:#}");
                    }
                    if !e.report.is_noop() {
                        warn!("⚠️ Partially applied: {}", e.report);
                    }
                }
            }
        } else {
            match self.engine.register_commands().await {
                Ok(report) => info!("✅ Registered slash commands: {report}"),
                Err(e) => error!("❌ Failed to register slash commands: {e:#}"),
            }
        }
    }
}

#[async_trait]
impl EventHandler for Gateway {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        info!("🤖 Bot ID: {}", ready.user.id);
        if let Some(shard) = ready.shard {
            info!("⚡ Shard: {}/{}", shard[0] + 1, shard[1]);
        }

        self.publish().await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: SerenityInteraction) {
        match interaction {
            SerenityInteraction::ApplicationCommand(command) => {
                let session = SerenitySession::new(Arc::clone(&ctx.http), command.application_id.0)
                    .with_resolved(&command.data.resolved);
                self.engine
                    .handle(Arc::new(session), convert::command_interaction(&command))
                    .await;
            }
            SerenityInteraction::Autocomplete(autocomplete) => {
                let session = SerenitySession::new(Arc::clone(&ctx.http), autocomplete.application_id.0)
                    .with_resolved(&autocomplete.data.resolved);
                self.engine
                    .handle(Arc::new(session), convert::autocomplete_interaction(&autocomplete))
                    .await;
            }
            SerenityInteraction::Ping(_) => {
                debug!("Ping interaction received - Discord health check");
            }
            other => {
                debug!("Ignoring {:?} interaction", other.kind());
            }
        }
    }
}
