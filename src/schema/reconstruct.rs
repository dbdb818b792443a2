//! Request reconstructor
//!
//! Turns the flat option list of one executor back into a typed payload.
//! Options the platform did not send leave their field at its `Default`
//! value; that is the only representation of "not provided".
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Accept partial focused input during autocomplete
//! - 1.0.0: Initial reconstruction with session lookups

use log::debug;
use serde_json::Value;

use super::kind::FieldInput;
use super::payload::{CommandSchema, ErasedSchema, FieldMeta, Payload};
use super::tag::SpecialKind;
use crate::core::error::ParsingError;
use crate::core::model::{InteractionOption, Mentionable, OptionKind};
use crate::core::session::Session;

/// Everything a payload is rebuilt from
pub struct Inputs<'a> {
    pub options: &'a [InteractionOption],
    /// Resolved invocation path, fed to `special:path` fields
    pub path: &'a [String],
    pub session: &'a dyn Session,
    pub guild_id: Option<u64>,
    /// Skip values of the focused option that do not convert (partial autocomplete input)
    pub lenient_focus: bool,
}

/// Locate the field bound to `option` and check the platform agrees on its kind
pub fn find_field<'f>(
    fields: &'f [FieldMeta],
    option: &InteractionOption,
) -> Result<(usize, &'f FieldMeta), ParsingError> {
    let (position, meta) = fields
        .iter()
        .enumerate()
        .find(|(_, meta)| meta.name == option.name)
        .ok_or_else(|| ParsingError::OptionNotFound {
            name: option.name.clone(),
            kind: option.kind,
        })?;

    if meta.kind != option.kind {
        return Err(ParsingError::TypeMismatch {
            field: meta.field_name.clone(),
            expected: meta.kind,
            actual: option.kind,
        });
    }
    Ok((position, meta))
}

/// Rebuild a payload from the options of one dispatch
///
/// `fields` is the executor's current field list; it is positionally aligned
/// with the schema's own list (edits never add, drop or reorder fields).
pub async fn reconstruct<P: Payload>(
    schema: &CommandSchema<P>,
    fields: &[FieldMeta],
    inputs: Inputs<'_>,
) -> Result<P, ParsingError> {
    debug!(
        "Reconstructing {} from {} option(s)",
        std::any::type_name::<P>(),
        inputs.options.len()
    );

    let mut payload = P::default();

    for option in inputs.options {
        let (position, meta) = find_field(fields, option)?;
        let skip_failure = inputs.lenient_focus && option.focused;

        let input = match resolve_input(meta, option, inputs.session, inputs.guild_id).await {
            Ok(input) => input,
            Err(e) if skip_failure => {
                debug!("Skipping partial focused value of \"{}\": {e}", option.name);
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = schema.assign(position, &mut payload, input) {
            if skip_failure {
                debug!("Skipping partial focused value of \"{}\": {e}", option.name);
                continue;
            }
            return Err(ParsingError::InvalidValue {
                field: meta.field_name.clone(),
                reason: e.to_string(),
            });
        }
    }

    for (position, special) in schema.specials().iter().enumerate() {
        let input = match special.kind {
            SpecialKind::Path => FieldInput::Path(inputs.path.to_vec()),
        };
        schema
            .assign_special(position, &mut payload, input)
            .map_err(|e| ParsingError::InvalidValue {
                field: special.field_name.clone(),
                reason: e.to_string(),
            })?;
    }

    Ok(payload)
}

/// Convert the raw value of `option` into a field input, resolving references
async fn resolve_input(
    meta: &FieldMeta,
    option: &InteractionOption,
    session: &dyn Session,
    guild_id: Option<u64>,
) -> Result<FieldInput, ParsingError> {
    let invalid = |reason: &str| ParsingError::InvalidValue {
        field: meta.field_name.clone(),
        reason: reason.to_string(),
    };
    let unresolved = |source: anyhow::Error| ParsingError::Unresolved {
        field: meta.field_name.clone(),
        source,
    };

    let value = option.value.as_ref().ok_or_else(|| invalid("missing value"))?;

    let input = match meta.kind {
        OptionKind::String => match value {
            Value::String(s) => FieldInput::String(s.clone()),
            other => FieldInput::String(other.to_string()),
        },
        OptionKind::Integer if meta.is_unsigned() => {
            FieldInput::Unsigned(as_u64(value).ok_or_else(|| invalid("expecting an unsigned integer"))?)
        }
        OptionKind::Integer => FieldInput::Integer(as_i64(value).ok_or_else(|| invalid("expecting an integer"))?),
        OptionKind::Boolean => FieldInput::Boolean(as_bool(value).ok_or_else(|| invalid("expecting a boolean"))?),
        OptionKind::Number => FieldInput::Number(as_f64(value).ok_or_else(|| invalid("expecting a number"))?),
        OptionKind::Channel => {
            let id = as_u64(value).ok_or_else(|| invalid("expecting a channel id"))?;
            FieldInput::Channel(session.channel(id).await.map_err(unresolved)?)
        }
        OptionKind::User => {
            let id = as_u64(value).ok_or_else(|| invalid("expecting a user id"))?;
            FieldInput::User(session.user(id).await.map_err(unresolved)?)
        }
        OptionKind::Role => {
            let id = as_u64(value).ok_or_else(|| invalid("expecting a role id"))?;
            FieldInput::Role(session.role(guild_id, id).await.map_err(unresolved)?)
        }
        OptionKind::Mentionable => {
            let id = as_u64(value).ok_or_else(|| invalid("expecting a user or role id"))?;
            FieldInput::Mentionable(resolve_mentionable(session, guild_id, id).await)
        }
        other => return Err(invalid(&format!("unsupported option kind {other}"))),
    };
    Ok(input)
}

/// User first, then role; neither leaves the mentionable empty
async fn resolve_mentionable(session: &dyn Session, guild_id: Option<u64>, id: u64) -> Mentionable {
    match session.user(id).await {
        Ok(user) => Mentionable {
            user: Some(user),
            role: None,
        },
        Err(user_err) => match session.role(guild_id, id).await {
            Ok(role) => Mentionable {
                user: None,
                role: Some(role),
            },
            Err(role_err) => {
                debug!("Mentionable {id} is neither a user ({user_err}) nor a role ({role_err})");
                Mentionable::default()
            }
        },
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_str()?.trim().parse().ok())
}

fn as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_str()?.trim().parse().ok())
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64().or_else(|| value.as_str()?.trim().parse().ok())
}

fn as_bool(value: &Value) -> Option<bool> {
    value.as_bool().or_else(|| value.as_str()?.trim().parse().ok())
}
