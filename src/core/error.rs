//! Error kinds surfaced by the binding layer
//!
//! - `SchemaError`: build time, the handler is never mounted
//! - `ParsingError`: dispatch time, before invocation; local schema and the
//!   platform disagree (or an input could not be resolved)
//! - `DispatchError`: everything the dispatch boundary hands to the error handler
//! - `PlatformError`: a collaborator call (registry or session) failed
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Split middleware failures from handler failures
//! - 1.0.0: Initial error kinds

use std::fmt;
use thiserror::Error;

use super::model::{OptionKind, Scope};

/// Build-time failure while turning a handler or payload into a schema
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("parsing metadata of \"{field}\": {reason}")]
    Metadata { field: String, reason: String },

    #[error("unrecognized metadata key \"{key}\" with value \"{value}\" on \"{field}\"")]
    UnknownKey {
        field: String,
        key: String,
        value: String,
    },

    #[error("converting \"{value}\" into bool for \"required\" on \"{field}\"")]
    InvalidRequired { field: String, value: String },

    #[error("unrecognized special tag with value \"{value}\" on \"{field}\"")]
    UnknownSpecial { field: String, value: String },

    #[error("invalid receiver type \"{type_name}\" on special:path tag of \"{field}\", expecting a list of strings")]
    InvalidSpecialReceiver { field: String, type_name: String },

    #[error("\"special\" cannot be combined with other keys on \"{field}\"")]
    SpecialNotExclusive { field: String },

    #[error("unrecognized struct \"{type_name}\" on \"{field}\"")]
    UnrecognizedRecord { field: String, type_name: String },

    #[error("unsupported kind \"{type_name}\" on \"{field}\"")]
    UnsupportedKind { field: String, type_name: String },

    #[error("choices of \"{field}\" mix value types")]
    MixedChoices { field: String },

    #[error("duplicate option name \"{name}\" in \"{payload}\"")]
    DuplicateName { payload: String, name: String },

    #[error("invalid name \"{0}\": expecting 1-32 lowercase letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("description of \"{owner}\" has {len} characters, expecting 1-100")]
    InvalidDescription { owner: String, len: usize },

    #[error("payload parameter {type_name} (#{position}) must be the last parameter")]
    PayloadNotLast {
        type_name: &'static str,
        position: usize,
    },

    #[error("handler takes more than one payload parameter")]
    MultiplePayloads,

    #[error("unexpected payload type: should be \"{expected}\" not \"{actual}\"")]
    PayloadMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("field \"{0}\" not found")]
    FieldNotFound(String),

    #[error("\"{0}\" is locked and can no longer be modified")]
    Locked(String),

    #[error("name \"{name}\" is already used by a {existing} in \"{parent}\"")]
    NameCollision {
        parent: String,
        name: String,
        existing: &'static str,
    },
}

/// Dispatch-time failure raised before the handler runs
#[derive(Debug, Error)]
pub enum ParsingError {
    #[error("option not found locally: \"{name}\" of type {kind}")]
    OptionNotFound { name: String, kind: OptionKind },

    #[error("type mismatch in \"{field}\": we expect it to be {expected}, but the platform says it is {actual}")]
    TypeMismatch {
        field: String,
        expected: OptionKind,
        actual: OptionKind,
    },

    #[error("missing options: expecting a subcommand for {path}, none given")]
    MissingOptions { path: String },

    #[error("non command option type: expecting SubCommand or SubCommandGroup but received {kind} for {path}")]
    NonCommandOption { kind: OptionKind, path: String },

    #[error("missing subcommand group: group \"{name}\" not found on {path}")]
    MissingGroup { name: String, path: String },

    #[error("missing subcommand: subcommand \"{name}\" not found on {path}")]
    MissingSubcommand { name: String, path: String },

    #[error("invalid value for \"{field}\": {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("resolving \"{field}\": {source}")]
    Unresolved {
        field: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unmarshalling {type_name}: {source}")]
    Unmarshal {
        type_name: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("no options in focus")]
    NoFocus,

    #[error("field \"{0}\" has no autocomplete handler")]
    NoAutocomplete(String),

    #[error("payload {0} is not the payload of this executor")]
    PayloadMismatch(&'static str),
}

/// Which collaborator call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformOperation {
    Create,
    Delete,
    List,
    Respond,
}

impl fmt::Display for PlatformOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlatformOperation::Create => "create",
            PlatformOperation::Delete => "delete",
            PlatformOperation::List => "list",
            PlatformOperation::Respond => "respond",
        };
        f.write_str(name)
    }
}

/// A registry or session call failed
#[derive(Debug, Error)]
#[error("{operation} in {scope} failed: {source}")]
pub struct PlatformError {
    pub operation: PlatformOperation,
    pub scope: Scope,
    #[source]
    pub source: anyhow::Error,
}

impl PlatformError {
    pub fn new(operation: PlatformOperation, scope: Scope, source: anyhow::Error) -> Self {
        Self {
            operation,
            scope,
            source,
        }
    }
}

/// Everything that can reach the operator's error handler
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Parsing(#[from] ParsingError),

    #[error("command execution failed: {0:#}")]
    Execution(anyhow::Error),

    #[error("middleware declined: {0:#}")]
    Middleware(anyhow::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("no command registered under id {0}")]
    UnknownCommand(u64),
}

impl DispatchError {
    /// Wrap an interceptor's own failure
    pub fn middleware(err: impl Into<anyhow::Error>) -> Self {
        DispatchError::Middleware(err.into())
    }

    /// Whether this signals that local schema and remote state have diverged
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            DispatchError::Parsing(
                ParsingError::OptionNotFound { .. }
                    | ParsingError::TypeMismatch { .. }
                    | ParsingError::MissingOptions { .. }
                    | ParsingError::NonCommandOption { .. }
                    | ParsingError::MissingGroup { .. }
                    | ParsingError::MissingSubcommand { .. }
            )
        )
    }
}
