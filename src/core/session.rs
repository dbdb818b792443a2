//! Session collaborator
//!
//! The connection to the platform is opaque to the binding layer. It is only
//! used to resolve channel/user/role references, to answer interactions and to
//! know which application is acting.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::Result;
use async_trait::async_trait;

use super::model::{Channel, Interaction, Response, Role, User};

/// Handle to the platform session, passed through to handlers untouched
#[async_trait]
pub trait Session: Send + Sync {
    /// Identity of the acting application
    fn application_id(&self) -> u64;

    async fn user(&self, user_id: u64) -> Result<User>;

    async fn role(&self, guild_id: Option<u64>, role_id: u64) -> Result<Role>;

    async fn channel(&self, channel_id: u64) -> Result<Channel>;

    /// Send the initial response to an interaction
    async fn respond(&self, interaction: &Interaction, response: &Response) -> Result<()>;

    /// Replace the content of the initial response
    async fn edit_response(&self, interaction: &Interaction, content: &str) -> Result<()>;
}
