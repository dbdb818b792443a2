//! Type-kind mapper
//!
//! Every payload field type describes its own shape through [`FieldType`];
//! [`option_kind`] turns that shape (plus the optional channel-kind and choice
//! capabilities) into the platform option kind.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Opaque records declaring choices map by choice value type
//! - 1.0.0: Primitive and platform record mapping

use anyhow::{anyhow, bail, Result};

use crate::core::error::SchemaError;
use crate::core::model::{Channel, ChannelKind, Choice, ChoiceValue, Mentionable, OptionKind, Role, User};

/// Platform records recognized by identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    Channel,
    User,
    Role,
    Mentionable,
    /// Any other record, only accepted when it declares channel kinds or choices
    Other(&'static str),
}

/// Static structure of a field type, as far as the mapper cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Str,
    Int { signed: bool },
    Bool,
    Float,
    Record(RecordShape),
    Sequence(Box<TypeShape>),
    Unsupported(&'static str),
}

impl TypeShape {
    /// Whether this is a list of strings, the only shape accepted by `special:path`
    pub fn is_string_list(&self) -> bool {
        matches!(self, TypeShape::Sequence(inner) if **inner == TypeShape::Str)
    }
}

/// A raw option value after session lookups, ready to be coerced into a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    String(String),
    Integer(i64),
    Unsigned(u64),
    Boolean(bool),
    Number(f64),
    Channel(Channel),
    User(User),
    Role(Role),
    Mentionable(Mentionable),
    /// Resolved invocation path, only ever fed to special fields
    Path(Vec<String>),
}

impl FieldInput {
    fn describe(&self) -> &'static str {
        match self {
            FieldInput::String(_) => "string",
            FieldInput::Integer(_) => "integer",
            FieldInput::Unsigned(_) => "unsigned integer",
            FieldInput::Boolean(_) => "boolean",
            FieldInput::Number(_) => "number",
            FieldInput::Channel(_) => "channel",
            FieldInput::User(_) => "user",
            FieldInput::Role(_) => "role",
            FieldInput::Mentionable(_) => "mentionable",
            FieldInput::Path(_) => "path",
        }
    }
}

/// A type that can sit in a payload field
///
/// `channel_kinds` and `choices` are the optional capabilities: a type that
/// declares them gets the filter or the static choice list attached to its
/// option, and an otherwise unknown record becomes acceptable.
pub trait FieldType: Sized + Send + Sync + 'static {
    fn shape() -> TypeShape;

    fn channel_kinds() -> Option<Vec<ChannelKind>> {
        None
    }

    fn choices() -> Option<Vec<Choice>> {
        None
    }

    /// Final coercion of a resolved value into the destination type
    fn from_input(input: FieldInput) -> Result<Self>;
}

/// Map a field shape onto the platform option kind
pub fn option_kind(
    field: &str,
    type_name: &str,
    shape: &TypeShape,
    channel_kinds: Option<&[ChannelKind]>,
    choices: Option<&[Choice]>,
) -> Result<OptionKind, SchemaError> {
    match shape {
        TypeShape::Str => Ok(OptionKind::String),
        TypeShape::Int { .. } => Ok(OptionKind::Integer),
        TypeShape::Bool => Ok(OptionKind::Boolean),
        TypeShape::Float => Ok(OptionKind::Number),
        TypeShape::Record(RecordShape::Channel) => Ok(OptionKind::Channel),
        TypeShape::Record(RecordShape::User) => Ok(OptionKind::User),
        TypeShape::Record(RecordShape::Role) => Ok(OptionKind::Role),
        TypeShape::Record(RecordShape::Mentionable) => Ok(OptionKind::Mentionable),
        TypeShape::Record(RecordShape::Other(_)) => {
            if channel_kinds.is_some() {
                return Ok(OptionKind::Channel);
            }
            match choices {
                Some(choices) => choice_kind(field, choices),
                None => Err(SchemaError::UnrecognizedRecord {
                    field: field.to_string(),
                    type_name: type_name.to_string(),
                }),
            }
        }
        TypeShape::Sequence(_) | TypeShape::Unsupported(_) => Err(SchemaError::UnsupportedKind {
            field: field.to_string(),
            type_name: type_name.to_string(),
        }),
    }
}

/// Compound option kind carried by a fixed choice list
fn choice_kind(field: &str, choices: &[Choice]) -> Result<OptionKind, SchemaError> {
    let mut kind = None;
    for choice in choices {
        let this = match choice.value {
            ChoiceValue::String(_) => OptionKind::String,
            ChoiceValue::Integer(_) => OptionKind::Integer,
            ChoiceValue::Number(_) => OptionKind::Number,
        };
        match kind {
            None => kind = Some(this),
            Some(seen) if seen == this => {}
            Some(_) => {
                return Err(SchemaError::MixedChoices {
                    field: field.to_string(),
                })
            }
        }
    }
    Ok(kind.unwrap_or(OptionKind::String))
}

fn mismatch<T>(input: &FieldInput) -> anyhow::Error {
    anyhow!("cannot assign {} to {}", input.describe(), std::any::type_name::<T>())
}

macro_rules! impl_integer {
    ($signed:expr => $($ty:ty),*) => {
        $(
            impl FieldType for $ty {
                fn shape() -> TypeShape {
                    TypeShape::Int { signed: $signed }
                }

                fn from_input(input: FieldInput) -> Result<Self> {
                    match input {
                        FieldInput::Integer(v) => <$ty>::try_from(v)
                            .map_err(|_| anyhow!("{v} out of range for {}", stringify!($ty))),
                        FieldInput::Unsigned(v) => <$ty>::try_from(v)
                            .map_err(|_| anyhow!("{v} out of range for {}", stringify!($ty))),
                        other => Err(mismatch::<$ty>(&other)),
                    }
                }
            }
        )*
    };
}

impl_integer!(true => i8, i16, i32, i64, isize);
impl_integer!(false => u8, u16, u32, u64, usize);

impl FieldType for f64 {
    fn shape() -> TypeShape {
        TypeShape::Float
    }

    fn from_input(input: FieldInput) -> Result<Self> {
        match input {
            FieldInput::Number(v) => Ok(v),
            FieldInput::Integer(v) => Ok(v as f64),
            other => Err(mismatch::<f64>(&other)),
        }
    }
}

impl FieldType for f32 {
    fn shape() -> TypeShape {
        TypeShape::Float
    }

    fn from_input(input: FieldInput) -> Result<Self> {
        f64::from_input(input).map(|v| v as f32)
    }
}

impl FieldType for bool {
    fn shape() -> TypeShape {
        TypeShape::Bool
    }

    fn from_input(input: FieldInput) -> Result<Self> {
        match input {
            FieldInput::Boolean(v) => Ok(v),
            other => Err(mismatch::<bool>(&other)),
        }
    }
}

impl FieldType for String {
    fn shape() -> TypeShape {
        TypeShape::Str
    }

    fn from_input(input: FieldInput) -> Result<Self> {
        match input {
            FieldInput::String(v) => Ok(v),
            other => Err(mismatch::<String>(&other)),
        }
    }
}

macro_rules! impl_record {
    ($($ty:ident),*) => {
        $(
            impl FieldType for $ty {
                fn shape() -> TypeShape {
                    TypeShape::Record(RecordShape::$ty)
                }

                fn from_input(input: FieldInput) -> Result<Self> {
                    match input {
                        FieldInput::$ty(v) => Ok(v),
                        other => Err(mismatch::<$ty>(&other)),
                    }
                }
            }
        )*
    };
}

impl_record!(Channel, User, Role, Mentionable);

impl<T: FieldType> FieldType for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::Sequence(Box::new(T::shape()))
    }

    fn from_input(input: FieldInput) -> Result<Self> {
        match input {
            FieldInput::Path(segments) => segments
                .into_iter()
                .map(|segment| T::from_input(FieldInput::String(segment)))
                .collect(),
            other => bail!("cannot assign {} to a list", other.describe()),
        }
    }
}

/// Optional destination: absent options leave it `None`
impl<T: FieldType> FieldType for Option<T> {
    fn shape() -> TypeShape {
        T::shape()
    }

    fn channel_kinds() -> Option<Vec<ChannelKind>> {
        T::channel_kinds()
    }

    fn choices() -> Option<Vec<Choice>> {
        T::choices()
    }

    fn from_input(input: FieldInput) -> Result<Self> {
        T::from_input(input).map(Some)
    }
}
