//! Normalized result envelope returned by every mutating / listing operation.
//!
//! An envelope is a status (`OK` / `WARN` / `ERR`), a one-line summary and an
//! ordered list of metadata fields. It renders to the text contract
//!
//! ```text
//! OK: Disk attached
//! • vm=test1
//! • created=true
//! ```
//!
//! and serializes to JSON with `metadata` as an insertion-ordered object.
//! `WARN` means the request was a no-op or only partially applied.

use crate::error::{VBoxError, VBoxErrorKind};
use crate::input::provided;
use log::{debug, warn};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvelopeStatus {
    Ok,
    Warn,
    Err,
}

impl EnvelopeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Err => "ERR",
        }
    }
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    status: EnvelopeStatus,
    summary: String,
    fields: Vec<(String, Value)>,
    error_kind: Option<VBoxErrorKind>,
}

impl Envelope {
    fn new(status: EnvelopeStatus, summary: impl Into<String>) -> Self {
        Self {
            status,
            summary: summary.into(),
            fields: Vec::new(),
            error_kind: None,
        }
    }

    pub fn ok(summary: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Ok, summary)
    }

    pub fn warn(summary: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Warn, summary)
    }

    pub fn err(summary: impl Into<String>) -> Self {
        Self::new(EnvelopeStatus::Err, summary)
    }

    /// Append a metadata field. `None` values are kept and rendered as `null`.
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    /// Append the failure's message as `error` and record its kind.
    pub fn error(mut self, err: &VBoxError) -> Self {
        self.error_kind = Some(err.kind);
        self.field("error", err.message.clone())
    }

    /// Record a failure kind without adding metadata.
    pub fn with_kind(mut self, kind: VBoxErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }

    pub fn status(&self) -> EnvelopeStatus {
        self.status
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn error_kind(&self) -> Option<VBoxErrorKind> {
        self.error_kind
    }

    /// First field with the given key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Field value as a string slice, if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.status == EnvelopeStatus::Ok
    }

    pub fn is_warn(&self) -> bool {
        self.status == EnvelopeStatus::Warn
    }

    pub fn is_err(&self) -> bool {
        self.status == EnvelopeStatus::Err
    }
}

/// ERR envelope for a failed operation on `vm`.
///
/// Input validation failures use their own message as the summary; every
/// other failure keeps `summary` and carries the verbatim message as `error`.
pub fn failure(summary: &str, vm: &str, err: &VBoxError) -> Envelope {
    if err.is_precondition() {
        debug!("{} rejected for '{}': {}", summary, vm.trim(), err);
    } else {
        warn!("{} for '{}': {}", summary, vm.trim(), err);
    }
    if err.kind == VBoxErrorKind::InvalidInput {
        let env = Envelope::err(err.message.clone()).with_kind(err.kind);
        return match provided(vm) {
            Some(vm) => env.field("vm", vm),
            None => env,
        };
    }
    Envelope::err(summary).field("vm", vm).error(err)
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status.as_str(), self.summary)?;
        for (k, v) in &self.fields {
            write!(f, "\n• {}={}", k, render_value(v))?;
        }
        Ok(())
    }
}

struct OrderedFields<'a>(&'a [(String, Value)]);

impl Serialize for OrderedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.error_kind.is_some() { 4 } else { 3 };
        let mut s = serializer.serialize_struct("Envelope", len)?;
        s.serialize_field("status", &self.status)?;
        s.serialize_field("summary", &self.summary)?;
        s.serialize_field("metadata", &OrderedFields(&self.fields))?;
        if let Some(kind) = &self.error_kind {
            s.serialize_field("errorKind", kind)?;
        }
        s.end()
    }
}
