//! Field schema: the set of metadata fields a deployment recognizes.
//!
//! Schemas are read from a JSON document of the form
//! `{"fields": [{"id": ..., "type": ..., "options": [...]}]}`. Every field is
//! resolved to a [`FieldType`] while loading, so an unsupported type or a
//! malformed enum is reported before any metadata is generated or written.

mod field;

pub use field::{FieldOption, FieldType, MetadataField};

use crate::metadata::{atomic_read_json, Metadata};
use crate::{FiletagError, Result};
use field::RawField;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    fields: Vec<RawField>,
}

/// Ordered, immutable collection of metadata fields keyed by id.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    fields: Vec<MetadataField>,
    index: HashMap<String, usize>,
}

impl FieldSchema {
    /// Build a schema from resolved fields.
    ///
    /// Fails when a field id is empty or repeated.
    pub fn from_fields(fields: Vec<MetadataField>) -> Result<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if field.id.is_empty() {
                return Err(FiletagError::schema(
                    format!("#{}", position),
                    "field id is empty",
                ));
            }
            if index.insert(field.id.clone(), position).is_some() {
                return Err(FiletagError::schema(&field.id, "duplicate field id"));
            }
        }

        Ok(Self { fields, index })
    }

    /// Parse a schema document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: SchemaDocument =
            serde_json::from_str(json).map_err(|e| FiletagError::Json {
                message: format!("Failed to parse schema: {}", e),
                source: Some(e),
            })?;
        Self::from_document(document)
    }

    /// Load a schema document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let document: SchemaDocument = atomic_read_json(path)?.ok_or_else(|| {
            FiletagError::io_with_path(
                std::io::Error::new(std::io::ErrorKind::NotFound, "schema file not found"),
                path,
            )
        })?;
        let schema = Self::from_document(document)?;
        debug!("Loaded {} fields from {}", schema.len(), path.display());
        Ok(schema)
    }

    fn from_document(document: SchemaDocument) -> Result<Self> {
        let fields = document
            .fields
            .into_iter()
            .map(MetadataField::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::from_fields(fields)
    }

    /// Recognized field ids, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataField> {
        self.fields.iter()
    }

    pub fn field(&self, id: &str) -> Option<&MetadataField> {
        self.index.get(id).map(|&i| &self.fields[i])
    }

    pub fn type_of(&self, id: &str) -> Option<&FieldType> {
        self.field(id).map(|f| &f.field_type)
    }

    /// Options of an enum field; `None` for unknown or non-enum fields.
    pub fn options_of(&self, id: &str) -> Option<&[FieldOption]> {
        match self.type_of(id) {
            Some(FieldType::Enum(options)) => Some(options),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check that every key is a known field and every value fits its type.
    ///
    /// Partial records are valid; use this before a `set_tags` call.
    pub fn validate(&self, metadata: &Metadata) -> Result<()> {
        for (key, value) in metadata {
            let field = self.field(key).ok_or_else(|| FiletagError::Validation {
                field: key.clone(),
                message: "unknown field".to_string(),
            })?;
            field
                .field_type
                .check_value(value)
                .map_err(|message| FiletagError::Validation {
                    field: key.clone(),
                    message,
                })?;
        }
        Ok(())
    }
}
