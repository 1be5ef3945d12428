//! Field definitions and per-type value checks.

use crate::metadata::parse_timestamp;
use crate::{FiletagError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One selectable value of an enum field.
///
/// Only `id` is interpreted; labels and other attributes are carried along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldOption {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }
}

/// Declared type of a metadata field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Value must equal one of the option ids. Never empty.
    Enum(Vec<FieldOption>),
    String,
    Text,
    /// `YYYY-MM-DD-HHMMSS`, whole seconds.
    Date,
}

impl FieldType {
    /// Type name as written in schema files.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Enum(_) => "enum",
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Date => "date",
        }
    }

    /// Check a value against this type, describing the mismatch on failure.
    pub fn check_value(&self, value: &str) -> std::result::Result<(), String> {
        match self {
            FieldType::Enum(options) => {
                if options.iter().any(|o| o.id == value) {
                    Ok(())
                } else {
                    let ids: Vec<&str> = options.iter().map(|o| o.id.as_str()).collect();
                    Err(format!("'{}' is not one of {:?}", value, ids))
                }
            }
            FieldType::String | FieldType::Text => Ok(()),
            FieldType::Date => parse_timestamp(value)
                .map(|_| ())
                .ok_or_else(|| format!("'{}' is not a YYYY-MM-DD-HHMMSS timestamp", value)),
        }
    }
}

/// A recognized metadata field.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataField {
    pub id: String,
    pub field_type: FieldType,
}

impl MetadataField {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            field_type,
        }
    }

    pub fn enumeration<I, S>(id: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            FieldType::Enum(options.into_iter().map(FieldOption::new).collect()),
        )
    }
}

/// Field as it appears in a schema file, before type resolution.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawField {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
}

impl TryFrom<RawField> for MetadataField {
    type Error = FiletagError;

    fn try_from(raw: RawField) -> Result<Self> {
        let field_type = match raw.type_name.as_str() {
            "enum" => match raw.options {
                Some(options) if !options.is_empty() => FieldType::Enum(options),
                _ => {
                    return Err(FiletagError::schema(
                        raw.id,
                        "enum field declares no options",
                    ))
                }
            },
            "string" => FieldType::String,
            "text" => FieldType::Text,
            "date" => FieldType::Date,
            other => {
                return Err(FiletagError::schema(
                    raw.id,
                    format!("unsupported field type '{}'", other),
                ))
            }
        };

        Ok(MetadataField {
            id: raw.id,
            field_type,
        })
    }
}
