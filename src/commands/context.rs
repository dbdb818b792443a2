//! Per-dispatch request
//!
//! - **Version**: 2.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.1.0: Cancellation token comes from the caller of the dispatch
//! - 2.0.0: Immutable per-dispatch request replaces the shared service context
//! - 1.0.0: Initial implementation with core shared state

use std::any::type_name;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::executor::Executor;
use crate::core::error::ParsingError;
use crate::core::model::{Interaction, InteractionOption, Response};
use crate::core::session::Session;
use crate::schema::payload::{CommandSchema, ErasedSchema, FieldMeta, Payload};
use crate::schema::reconstruct::{reconstruct, Inputs};

/// Request metadata exposed to handlers
///
/// `path` is the route the executor was reached through: command name,
/// optional group name, subcommand name. It is the only way for an executor
/// mounted under several names to tell which one was invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub path: Vec<String>,
}

/// What a dispatch resolved to, captured while the tree was read-locked
#[derive(Clone)]
pub(crate) struct Target {
    pub executor: Executor,
    pub schema: Option<Arc<dyn ErasedSchema>>,
    pub fields: Arc<Vec<FieldMeta>>,
}

#[derive(Clone)]
struct RequestState {
    id: Uuid,
    token: CancellationToken,
    session: Arc<dyn Session>,
    interaction: Arc<Interaction>,
    options: Vec<InteractionOption>,
    meta: Meta,
    target: Target,
    autocomplete: bool,
}

/// Immutable bundle handed down the middleware chain
///
/// Cheap to clone; created for one inbound interaction and dropped once the
/// chain returns.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestState>,
}

impl Request {
    pub(crate) fn new(
        session: Arc<dyn Session>,
        interaction: Arc<Interaction>,
        options: Vec<InteractionOption>,
        meta: Meta,
        target: Target,
        autocomplete: bool,
        token: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(RequestState {
                id: Uuid::new_v4(),
                token,
                session,
                interaction,
                options,
                meta,
                target,
                autocomplete,
            }),
        }
    }

    /// Same request with a different cancellation context
    pub fn with_context(&self, token: CancellationToken) -> Self {
        let mut state = (*self.inner).clone();
        state.token = token;
        Self {
            inner: Arc::new(state),
        }
    }

    /// Identifier used to tag log lines of this dispatch
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.inner.session
    }

    pub fn interaction(&self) -> &Interaction {
        &self.inner.interaction
    }

    pub(crate) fn shared_interaction(&self) -> Arc<Interaction> {
        Arc::clone(&self.inner.interaction)
    }

    /// Raw options of the resolved executor
    pub fn options(&self) -> &[InteractionOption] {
        &self.inner.options
    }

    pub fn meta(&self) -> &Meta {
        &self.inner.meta
    }

    pub fn executor(&self) -> &Executor {
        &self.inner.target.executor
    }

    pub fn is_autocomplete(&self) -> bool {
        self.inner.autocomplete
    }

    /// Rebuild the executor's payload from this request's options
    pub async fn payload<P: Payload>(&self) -> Result<P, ParsingError> {
        let schema = self
            .inner
            .target
            .schema
            .as_ref()
            .and_then(|schema| schema.as_any().downcast_ref::<CommandSchema<P>>())
            .ok_or(ParsingError::PayloadMismatch(type_name::<P>()))?;

        let inputs = Inputs {
            options: &self.inner.options,
            path: &self.inner.meta.path,
            session: self.inner.session.as_ref(),
            guild_id: self.inner.interaction.guild_id,
            lenient_focus: self.inner.autocomplete,
        };
        reconstruct(schema, &self.inner.target.fields, inputs).await
    }

    /// Answer the interaction through the session
    pub async fn respond(&self, response: Response) -> anyhow::Result<()> {
        self.inner.session.respond(&self.inner.interaction, &response).await
    }
}
