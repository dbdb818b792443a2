//! Declarative field metadata
//!
//! A tag is a comma separated list of bare tokens or `key:value` pairs, read
//! as CSV, e.g. `name:target,"description:Who, or what",required:false`. A
//! token may be quoted to embed commas; `""` inside quotes is a literal quote.
//! Each token is split on its first `:` so values may contain further colons.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Tokenize with the csv reader; line breaks separate tokens
//! - 1.0.0: Initial metadata parser

use csv::ReaderBuilder;

use crate::core::error::SchemaError;

/// Out-of-band data a special field is populated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKind {
    /// The resolved invocation path (command, group, subcommand)
    Path,
}

/// Parsed field metadata; `None` means "not given"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    pub name: Option<String>,
    pub description: Option<String>,
    pub required: Option<bool>,
    pub special: Option<SpecialKind>,
}

/// Parse the metadata attached to `field`
pub fn parse(field: &str, tag: &str) -> Result<FieldTag, SchemaError> {
    let tokens = tokenize(tag).map_err(|reason| SchemaError::Metadata {
        field: field.to_string(),
        reason,
    })?;

    let mut parsed = FieldTag::default();
    let mut other_keys = false;

    for token in tokens {
        let (key, value) = match token.split_once(':') {
            Some((key, value)) => (key, value),
            None => (token.as_str(), ""),
        };

        match key {
            "name" => parsed.name = Some(value.to_string()),
            "description" => parsed.description = Some(value.to_string()),
            "required" => {
                let required = if value.is_empty() {
                    true
                } else {
                    parse_bool(value).ok_or_else(|| SchemaError::InvalidRequired {
                        field: field.to_string(),
                        value: value.to_string(),
                    })?
                };
                parsed.required = Some(required);
            }
            "special" => match value {
                "path" => parsed.special = Some(SpecialKind::Path),
                _ => {
                    return Err(SchemaError::UnknownSpecial {
                        field: field.to_string(),
                        value: value.to_string(),
                    })
                }
            },
            _ => {
                return Err(SchemaError::UnknownKey {
                    field: field.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
        }

        if key != "special" {
            other_keys = true;
        }
    }

    if parsed.special.is_some() && other_keys {
        return Err(SchemaError::SpecialNotExclusive {
            field: field.to_string(),
        });
    }

    Ok(parsed)
}

/// Boolean spellings accepted for `required:<value>`
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Split a tag into tokens, honoring quotes and trimming leading whitespace
///
/// Line breaks separate records, and the tokens of every record are joined.
fn tokenize(tag: &str) -> Result<Vec<String>, String> {
    // Valid quoting always pairs up; an odd count is an unterminated or bare quote
    if tag.matches('"').count() % 2 == 1 {
        return Err(format!("unbalanced quote in {tag:?}"));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(tag.as_bytes());

    let mut tokens = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("reading {tag:?}: {e}"))?;
        tokens.extend(
            record
                .iter()
                .map(str::trim_start)
                .filter(|token| !token.trim().is_empty())
                .map(str::to_string),
        );
    }
    Ok(tokens)
}
