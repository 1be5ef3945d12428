//! Metadata records and their persistence helpers.
//!
//! This module provides:
//! - The [`Metadata`] record type (field id → string value)
//! - Timestamp formatting for `date` fields
//! - Schema-driven random generation
//! - Atomic JSON file operations

mod atomic;
mod generator;

pub use atomic::{atomic_read_json, atomic_write_json};
pub(crate) use atomic::backup_path_for;
pub use generator::{MetadataGenerator, RANDOM_STRING_LEN};

use chrono::{Local, NaiveDateTime, Timelike};
use std::collections::BTreeMap;

/// Field id → value. Every value is a string regardless of field type.
pub type Metadata = BTreeMap<String, String>;

/// Canonical `date` field format, whole seconds only.
pub const DATE_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Format a timestamp for a `date` field, discarding sub-second precision.
pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp
        .with_nanosecond(0)
        .unwrap_or(timestamp)
        .format(DATE_FORMAT)
        .to_string()
}

/// Current local time formatted for a `date` field.
pub fn now_timestamp() -> String {
    format_timestamp(Local::now().naive_local())
}

/// Parse a `date` field value, accepting only the canonical rendering.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .ok()
        .filter(|ts| ts.format(DATE_FORMAT).to_string() == value)
}
