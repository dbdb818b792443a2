//! Payload schema extraction
//!
//! A payload is a plain struct whose fields become command options. Authors
//! describe it once through [`Fields`], in declaration order:
//!
//! ```ignore
//! #[derive(Default)]
//! struct ShutdownArgs {
//!     confirm: bool,
//!     message: Option<String>,
//!     path: Vec<String>,
//! }
//!
//! impl Payload for ShutdownArgs {
//!     fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError> {
//!         fields
//!             .field("confirm", "description:Really shut down", |a| &mut a.confirm)?
//!             .field("message", "required:false", |a| &mut a.message)?
//!             .field("path", "special:path", |a| &mut a.path)?;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Embedded groups are flattened with [`Fields::embed`]; their index paths are
//! prefixed with the offset of the embedding field.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Validate wire names against the platform naming rule
//! - 1.1.0: Add embedded argument groups
//! - 1.0.0: Initial field and special field extraction

use regex::Regex;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::kind::{option_kind, FieldInput, FieldType, TypeShape};
use super::tag::{self, SpecialKind};
use crate::commands::handler::BoxedAutocomplete;
use crate::core::error::SchemaError;
use crate::core::model::{ChannelKind, Choice, OptionKind, WireOption};

/// A struct whose fields are bound to command options
pub trait Payload: Default + Send + Sync + 'static {
    fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError>;
}

type Assign<P> = Arc<dyn Fn(&mut P, FieldInput) -> anyhow::Result<()> + Send + Sync>;

/// Per-field metadata, used for the wire schema and for reconstruction
///
/// `name`, `description`, `required`, `choices` and `channel_kinds` may be
/// edited through `Executor::update_field` until the executor is locked.
#[derive(Clone)]
pub struct FieldMeta {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub choices: Option<Vec<Choice>>,
    pub channel_kinds: Option<Vec<ChannelKind>>,
    pub(crate) index: Vec<usize>,
    pub(crate) field_name: String,
    pub(crate) kind: OptionKind,
    pub(crate) shape: TypeShape,
    pub(crate) type_name: &'static str,
    pub(crate) autocomplete: Option<BoxedAutocomplete>,
}

impl FieldMeta {
    /// Composite index path of the struct field
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn has_autocomplete(&self) -> bool {
        self.autocomplete.is_some()
    }

    pub(crate) fn is_unsigned(&self) -> bool {
        matches!(self.shape, TypeShape::Int { signed: false })
    }

    pub fn wire_option(&self) -> WireOption {
        WireOption {
            kind: self.kind,
            name: self.name.clone(),
            description: self.description.clone(),
            required: self.required,
            choices: self.choices.clone().unwrap_or_default(),
            channel_types: self.channel_kinds.clone().unwrap_or_default(),
            options: Vec::new(),
            autocomplete: self.autocomplete.is_some(),
        }
    }
}

impl fmt::Debug for FieldMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMeta")
            .field("index", &self.index)
            .field("field_name", &self.field_name)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("autocomplete", &self.autocomplete.is_some())
            .finish()
    }
}

/// A field populated from request metadata instead of option values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialMeta {
    pub index: Vec<usize>,
    pub field_name: String,
    pub kind: SpecialKind,
}

struct FieldEntry<P> {
    meta: FieldMeta,
    assign: Assign<P>,
}

struct SpecialEntry<P> {
    meta: SpecialMeta,
    assign: Assign<P>,
}

/// Builder handed to [`Payload::describe`]
pub struct Fields<P> {
    prefix: Vec<usize>,
    next: usize,
    entries: Vec<FieldEntry<P>>,
    specials: Vec<SpecialEntry<P>>,
}

impl<P: Payload> Fields<P> {
    fn with_prefix(prefix: Vec<usize>) -> Self {
        Self {
            prefix,
            next: 0,
            entries: Vec::new(),
            specials: Vec::new(),
        }
    }

    fn next_index(&mut self) -> Vec<usize> {
        let mut index = self.prefix.clone();
        index.push(self.next);
        self.next += 1;
        index
    }

    /// Declare the next field of the payload
    ///
    /// `tag` is the field metadata (see the `tag` module); the wire name
    /// defaults to the lower-cased field name and fields are required unless
    /// the tag says otherwise.
    pub fn field<T: FieldType>(
        &mut self,
        field_name: &str,
        tag: &str,
        access: fn(&mut P) -> &mut T,
    ) -> Result<&mut Self, SchemaError> {
        let index = self.next_index();
        let parsed = tag::parse(field_name, tag)?;
        let assign: Assign<P> = Arc::new(move |payload: &mut P, input: FieldInput| {
            *access(payload) = T::from_input(input)?;
            Ok(())
        });

        if let Some(kind) = parsed.special {
            match kind {
                SpecialKind::Path if !T::shape().is_string_list() => {
                    return Err(SchemaError::InvalidSpecialReceiver {
                        field: field_name.to_string(),
                        type_name: type_name::<T>().to_string(),
                    });
                }
                SpecialKind::Path => {}
            }
            self.specials.push(SpecialEntry {
                meta: SpecialMeta {
                    index,
                    field_name: field_name.to_string(),
                    kind,
                },
                assign,
            });
            return Ok(self);
        }

        let shape = T::shape();
        let channel_kinds = T::channel_kinds();
        let choices = T::choices();
        let kind = option_kind(
            field_name,
            type_name::<T>(),
            &shape,
            channel_kinds.as_deref(),
            choices.as_deref(),
        )?;

        let name = parsed.name.unwrap_or_else(|| field_name.to_lowercase());
        self.entries.push(FieldEntry {
            meta: FieldMeta {
                description: parsed.description.unwrap_or_else(|| name.clone()),
                name,
                required: parsed.required.unwrap_or(true),
                choices,
                channel_kinds,
                index,
                field_name: field_name.to_string(),
                kind,
                shape,
                type_name: type_name::<T>(),
                autocomplete: None,
            },
            assign,
        });
        Ok(self)
    }

    /// Flatten a reusable argument group into this payload
    pub fn embed<E: Payload>(&mut self, access: fn(&mut P) -> &mut E) -> Result<&mut Self, SchemaError> {
        let mut inner = Fields::<E>::with_prefix(self.next_index());
        E::describe(&mut inner)?;

        for entry in inner.entries {
            let assign = entry.assign;
            self.entries.push(FieldEntry {
                meta: entry.meta,
                assign: Arc::new(move |payload: &mut P, input| assign(access(payload), input)),
            });
        }
        for special in inner.specials {
            let assign = special.assign;
            self.specials.push(SpecialEntry {
                meta: special.meta,
                assign: Arc::new(move |payload: &mut P, input| assign(access(payload), input)),
            });
        }
        Ok(self)
    }
}

/// Schema of one payload type: ordered fields, special fields and setters
pub struct CommandSchema<P> {
    fields: Vec<FieldMeta>,
    assigns: Vec<Assign<P>>,
    specials: Vec<SpecialMeta>,
    special_assigns: Vec<Assign<P>>,
}

impl<P: Payload> CommandSchema<P> {
    pub fn build() -> Result<Self, SchemaError> {
        let mut described = Fields::<P>::with_prefix(Vec::new());
        P::describe(&mut described)?;

        for entry in &described.entries {
            validate_name(&entry.meta.name)?;
            validate_description(&entry.meta.field_name, &entry.meta.description)?;
        }
        ensure_unique(type_name::<P>(), described.entries.iter().map(|entry| &entry.meta))?;

        let (fields, assigns) = described
            .entries
            .into_iter()
            .map(|entry| (entry.meta, entry.assign))
            .unzip();
        let (specials, special_assigns) = described
            .specials
            .into_iter()
            .map(|special| (special.meta, special.assign))
            .unzip();

        Ok(Self {
            fields,
            assigns,
            specials,
            special_assigns,
        })
    }

    /// Set the field at `position` of the field list
    pub(crate) fn assign(&self, position: usize, payload: &mut P, input: FieldInput) -> anyhow::Result<()> {
        match self.assigns.get(position) {
            Some(assign) => assign(payload, input),
            None => anyhow::bail!("no field at position {position}"),
        }
    }

    pub(crate) fn assign_special(&self, position: usize, payload: &mut P, input: FieldInput) -> anyhow::Result<()> {
        match self.special_assigns.get(position) {
            Some(assign) => assign(payload, input),
            None => anyhow::bail!("no special field at position {position}"),
        }
    }
}

/// Type-erased view of a [`CommandSchema`], held by executors
pub trait ErasedSchema: Send + Sync {
    fn payload_type(&self) -> TypeId;
    fn payload_name(&self) -> &'static str;
    fn fields(&self) -> &[FieldMeta];
    fn specials(&self) -> &[SpecialMeta];
    fn as_any(&self) -> &dyn Any;
}

impl<P: Payload> ErasedSchema for CommandSchema<P> {
    fn payload_type(&self) -> TypeId {
        TypeId::of::<P>()
    }

    fn payload_name(&self) -> &'static str {
        type_name::<P>()
    }

    fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    fn specials(&self) -> &[SpecialMeta] {
        &self.specials
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Build the erased schema of `P`; used by the signature classifier
pub fn build_schema<P: Payload>() -> Result<Arc<dyn ErasedSchema>, SchemaError> {
    Ok(Arc::new(CommandSchema::<P>::build()?))
}

static NAME_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Check a command, group, subcommand or option name against the platform naming rule
pub fn validate_name(name: &str) -> Result<(), SchemaError> {
    let pattern = NAME_PATTERN.get_or_init(|| Regex::new(r"^[-_\p{Ll}\p{Lo}\p{N}]{1,32}$").ok());
    match pattern {
        Some(re) if re.is_match(name) => Ok(()),
        _ => Err(SchemaError::InvalidName(name.to_string())),
    }
}

/// Descriptions of commands, groups, subcommands and options must hold 1-100 characters
pub fn validate_description(owner: &str, description: &str) -> Result<(), SchemaError> {
    let len = description.chars().count();
    if (1..=100).contains(&len) {
        Ok(())
    } else {
        Err(SchemaError::InvalidDescription {
            owner: owner.to_string(),
            len,
        })
    }
}

/// Wire names must be unique within one schema
pub(crate) fn ensure_unique<'a>(
    payload: &str,
    fields: impl IntoIterator<Item = &'a FieldMeta>,
) -> Result<(), SchemaError> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateName {
                payload: payload.to_string(),
                name: field.name.clone(),
            });
        }
    }
    Ok(())
}
