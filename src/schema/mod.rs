//! # Schema
//!
//! Payload description, field metadata, option-kind mapping and request
//! reconstruction.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add embedded argument groups
//! - 1.0.0: Initial schema extraction

pub mod kind;
pub mod payload;
pub mod reconstruct;
pub mod tag;

pub use kind::{FieldInput, FieldType, RecordShape, TypeShape};
pub use payload::{validate_description, validate_name, CommandSchema, ErasedSchema, FieldMeta, Fields, Payload, SpecialMeta};
pub use tag::SpecialKind;
