//! The unified output record shared by posts, comments and replies.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which kind of raw node a record was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Submission,
    Comment,
    CommentReply,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Submission => "submission",
            RecordType::Comment => "comment",
            RecordType::CommentReply => "comment_reply",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time at which a batch run started; stamped on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieveTime(NaiveDateTime);

impl RetrieveTime {
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    pub fn at(time: NaiveDateTime) -> Self {
        Self(time)
    }

    pub fn formatted(&self) -> String {
        self.0.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl From<DateTime<Local>> for RetrieveTime {
    fn from(time: DateTime<Local>) -> Self {
        Self(time.naive_local())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl FieldValue {
    /// Nullable-text rendering used by tabular output; `Null` is empty.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s.as_str()),
            FieldValue::Int(i) => Cow::Owned(i.to_string()),
            // Whole floats keep their `.0` so ratios never read as integers.
            FieldValue::Float(x) if x.is_finite() && x.fract() == 0.0 => {
                Cow::Owned(format!("{:.1}", x))
            }
            FieldValue::Float(x) => Cow::Owned(x.to_string()),
            FieldValue::Bool(b) => Cow::Borrowed(if *b { "True" } else { "False" }),
            FieldValue::Null => Cow::Borrowed(""),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// One output row. Fields keep insertion order; `type` and `submission_id`
/// are always present.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    record_type: RecordType,
    submission_id: String,
    fields: Vec<(&'static str, FieldValue)>,
}

impl CanonicalRecord {
    pub fn builder(record_type: RecordType, submission_id: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            record_type,
            submission_id: submission_id.into(),
            fields: Vec::with_capacity(24),
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    pub fn id(&self) -> Option<&str> {
        match self.get("id") {
            Some(FieldValue::Text(id)) => Some(id),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct RecordBuilder {
    record_type: RecordType,
    submission_id: String,
    fields: Vec<(&'static str, FieldValue)>,
}

impl RecordBuilder {
    /// Sets a field, replacing any earlier value under the same name.
    pub fn field(mut self, name: &'static str, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Appends the derived `type`, `submission_id` and `retrieve_time` columns.
    pub fn build(self, retrieve_time: &RetrieveTime) -> CanonicalRecord {
        let record_type = self.record_type;
        let submission_id = self.submission_id.clone();
        let fields = self
            .field("type", record_type.as_str())
            .field("submission_id", submission_id.clone())
            .field("retrieve_time", retrieve_time.formatted())
            .fields;
        CanonicalRecord {
            record_type,
            submission_id,
            fields,
        }
    }
}
