//! Executor, the leaf of the command tree
//!
//! Binds one handler, its payload schema and its own interceptor chain. Once
//! mounted into the engine an executor is locked: its schema can no longer be
//! edited because it may already be registered remotely.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Add `bind_as` for mounting one handler under several names
//! - 1.1.0: Per-field autocomplete handlers
//! - 1.0.0: Initial executor with payload schema

use log::warn;
use std::sync::{Arc, RwLock};

use super::context::Target;
use super::handler::{
    classify, classify_autocomplete, erase_autocomplete, erase_handler, AutocompleteHandler, BoxedHandler, Handler,
    ParameterRole,
};
use super::middleware::Chain;
use super::node::{read, write};
use crate::core::error::SchemaError;
use crate::core::model::{WireCommand, WireOption};
use crate::schema::payload::{ensure_unique, validate_description, validate_name, ErasedSchema, FieldMeta};

struct ExecutorState {
    name: String,
    description: String,
    handler: BoxedHandler,
    roles: Vec<ParameterRole>,
    schema: Option<Arc<dyn ErasedSchema>>,
    fields: Arc<Vec<FieldMeta>>,
    middleware: Chain,
    locked: bool,
}

/// Handle to an executor; clones share the same state
#[derive(Clone)]
pub struct Executor {
    inner: Arc<RwLock<ExecutorState>>,
}

impl Executor {
    /// Classify `handler` and build its payload schema
    pub fn new<H, T>(name: impl Into<String>, description: impl Into<String>, handler: H) -> Result<Self, SchemaError>
    where
        H: Handler<T>,
        T: 'static,
    {
        let name = name.into();
        let description = description.into();
        validate_name(&name)?;
        validate_description(&name, &description)?;

        let signature = classify(&H::parameters())?;
        let fields = signature
            .schema
            .as_ref()
            .map(|schema| schema.fields().to_vec())
            .unwrap_or_default();

        Ok(Self::from_state(ExecutorState {
            name,
            description,
            handler: erase_handler(handler),
            roles: signature.roles,
            schema: signature.schema,
            fields: Arc::new(fields),
            middleware: Chain::new(),
            locked: false,
        }))
    }

    fn from_state(state: ExecutorState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Same handler and schema under another name, with its own middleware and lock
    pub fn bind_as(&self, name: impl Into<String>, description: impl Into<String>) -> Result<Executor, SchemaError> {
        let name = name.into();
        let description = description.into();
        validate_name(&name)?;
        validate_description(&name, &description)?;

        let state = read(&self.inner);
        Ok(Self::from_state(ExecutorState {
            name,
            description,
            handler: Arc::clone(&state.handler),
            roles: state.roles.clone(),
            schema: state.schema.clone(),
            fields: Arc::new(state.fields.as_ref().clone()),
            middleware: Chain::new(),
            locked: false,
        }))
    }

    pub fn name(&self) -> String {
        read(&self.inner).name.clone()
    }

    pub fn description(&self) -> String {
        read(&self.inner).description.clone()
    }

    /// Field by its struct field name
    pub fn field(&self, field_name: &str) -> Option<FieldMeta> {
        read(&self.inner)
            .fields
            .iter()
            .find(|field| field.field_name == field_name)
            .cloned()
    }

    /// Field by its composite index path
    pub fn field_by_index(&self, index: &[usize]) -> Option<FieldMeta> {
        read(&self.inner)
            .fields
            .iter()
            .find(|field| field.index == index)
            .cloned()
    }

    pub fn fields(&self) -> Vec<FieldMeta> {
        read(&self.inner).fields.as_ref().clone()
    }

    /// Edit the metadata of one field
    pub fn update_field<F>(&self, field_name: &str, edit: F) -> Result<(), SchemaError>
    where
        F: FnOnce(&mut FieldMeta),
    {
        let mut state = write(&self.inner);
        if state.locked {
            return Err(SchemaError::Locked(state.name.clone()));
        }

        let position = state
            .fields
            .iter()
            .position(|field| field.field_name == field_name)
            .ok_or_else(|| SchemaError::FieldNotFound(field_name.to_string()))?;

        let mut updated = state.fields[position].clone();
        edit(&mut updated);
        validate_name(&updated.name)?;
        validate_description(&updated.field_name, &updated.description)?;
        ensure_unique(
            &state.name,
            state
                .fields
                .iter()
                .enumerate()
                .map(|(i, field)| if i == position { &updated } else { field }),
        )?;

        Arc::make_mut(&mut state.fields)[position] = updated;
        Ok(())
    }

    /// Attach an autocomplete handler to one field
    ///
    /// A payload parameter of the autocomplete handler must be this
    /// executor's payload type.
    pub fn set_autocomplete<H, T>(&self, field_name: &str, handler: H) -> Result<(), SchemaError>
    where
        H: AutocompleteHandler<T>,
        T: 'static,
    {
        let mut state = write(&self.inner);
        if state.locked {
            return Err(SchemaError::Locked(state.name.clone()));
        }

        classify_autocomplete(&H::parameters(), state.schema.as_deref())?;

        let position = state
            .fields
            .iter()
            .position(|field| field.field_name == field_name)
            .ok_or_else(|| SchemaError::FieldNotFound(field_name.to_string()))?;

        Arc::make_mut(&mut state.fields)[position].autocomplete = Some(erase_autocomplete(handler));
        Ok(())
    }

    pub fn set_middleware(&self, chain: Chain) {
        write(&self.inner).middleware = chain;
    }

    pub fn middleware(&self) -> Chain {
        read(&self.inner).middleware.clone()
    }

    /// Freeze the schema; one way
    pub fn lock(&self) {
        write(&self.inner).locked = true;
    }

    pub fn is_locked(&self) -> bool {
        read(&self.inner).locked
    }

    pub fn parameters(&self) -> Vec<ParameterRole> {
        read(&self.inner).roles.clone()
    }

    /// Name of the payload type, if the handler takes one
    pub fn payload_type(&self) -> Option<&'static str> {
        read(&self.inner).schema.as_ref().map(|schema| schema.payload_name())
    }

    /// Wire options of the payload fields, in declaration order
    pub fn wire_options(&self) -> Vec<WireOption> {
        let state = read(&self.inner);
        let mut optional_seen = false;
        for field in state.fields.iter() {
            if !field.required {
                optional_seen = true;
            } else if optional_seen {
                warn!(
                    "Required option \"{}\" of \"{}\" follows an optional one, the platform may reject it",
                    field.name, state.name
                );
                break;
            }
        }
        state.fields.iter().map(FieldMeta::wire_option).collect()
    }

    /// Wire form when registered directly as a command
    pub fn wire_command(&self) -> WireCommand {
        WireCommand {
            name: self.name(),
            description: self.description(),
            options: self.wire_options(),
        }
    }

    pub(crate) fn handler(&self) -> BoxedHandler {
        Arc::clone(&read(&self.inner).handler)
    }

    /// Snapshot of what dispatch needs, taken under the read lock
    pub(crate) fn target(&self) -> Target {
        let state = read(&self.inner);
        Target {
            executor: self.clone(),
            schema: state.schema.clone(),
            fields: Arc::clone(&state.fields),
        }
    }

    pub fn same(&self, other: &Executor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::Meta;
    use crate::commands::handler::Data;
    use crate::core::model::{Choice, OptionKind};
    use crate::testing::{ping_executor, shutdown_executor, ShutdownArgs};

    #[test]
    fn test_executor_without_payload() {
        let executor = ping_executor();
        assert_eq!(executor.name(), "ping");
        assert!(executor.fields().is_empty());
        assert!(executor.payload_type().is_none());

        let wire = executor.wire_command();
        assert_eq!(wire.name, "ping");
        assert!(wire.options.is_empty());
    }

    #[test]
    fn test_invalid_name() {
        let result = Executor::new("Ping", "", || async { anyhow::Ok(()) });
        assert!(matches!(result, Err(SchemaError::InvalidName(_))));
    }

    #[test]
    fn test_invalid_description() {
        let result = Executor::new("ping", "", || async { anyhow::Ok(()) });
        assert!(matches!(result, Err(SchemaError::InvalidDescription { len: 0, .. })));

        let executor = ping_executor();
        assert!(matches!(
            executor.bind_as("pong", "x".repeat(101)),
            Err(SchemaError::InvalidDescription { len: 101, .. })
        ));

        let executor = shutdown_executor();
        let err = executor
            .update_field("message", |field| field.description.clear())
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDescription { .. }));
    }

    #[test]
    fn test_field_lookup() {
        let executor = shutdown_executor();
        assert_eq!(executor.field("message").unwrap().kind(), OptionKind::String);
        assert_eq!(executor.field_by_index(&[0]).unwrap().field_name(), "confirm");
        assert!(executor.field("path").is_none());
        assert!(executor.payload_type().unwrap().ends_with("ShutdownArgs"));
    }

    #[test]
    fn test_update_field() {
        let executor = shutdown_executor();
        executor
            .update_field("message", |field| {
                field.name = "note".to_string();
                field.description = "Parting words".to_string();
            })
            .unwrap();

        let option = &executor.wire_options()[1];
        assert_eq!(option.name, "note");
        assert_eq!(option.description, "Parting words");

        let err = executor
            .update_field("message", |field| field.name = "confirm".to_string())
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName { .. }));

        let err = executor.update_field("nope", |_| {}).unwrap_err();
        assert!(matches!(err, SchemaError::FieldNotFound(_)));
    }

    #[test]
    fn test_locked_executor_rejects_edits() {
        let executor = shutdown_executor();
        executor.lock();

        assert!(executor.is_locked());
        assert!(matches!(
            executor.update_field("message", |field| field.required = true),
            Err(SchemaError::Locked(_))
        ));
        assert!(matches!(
            executor.set_autocomplete("message", |_m: Meta| async { Vec::<Choice>::new() }),
            Err(SchemaError::Locked(_))
        ));
    }

    #[test]
    fn test_autocomplete_marks_wire_option() {
        let executor = shutdown_executor();
        executor
            .set_autocomplete("message", |Data(args): Data<ShutdownArgs>| async move {
                vec![Choice::string(args.message.unwrap_or_default(), "echo")]
            })
            .unwrap();

        let options = executor.wire_options();
        assert!(!options[0].autocomplete);
        assert!(options[1].autocomplete);
    }

    #[test]
    fn test_bind_as_shares_schema_not_lock() {
        let executor = shutdown_executor();
        executor.lock();

        let alias = executor.bind_as("halt", "Stop the bot").unwrap();
        assert_eq!(alias.name(), "halt");
        assert!(!alias.is_locked());
        assert!(!alias.same(&executor));
        assert_eq!(alias.wire_options(), executor.wire_options());
        assert_eq!(alias.payload_type(), executor.payload_type());
    }
}
