//! Entity-agnostic record projection used by every view mode.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Display-oriented projection of one domain entity.
///
/// Rebuilt from fresh domain data on every pass and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRecord {
  pub id: String,
  pub title: String,
  pub subtitle: Option<String>,
  pub description: Option<String>,
  pub status: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  /// Column/group the record belongs to (kanban column id, for instance)
  pub group_key: Option<String>,
  pub primary_date: Option<DateTime<Utc>>,
  /// Entity-specific attributes, addressable by field name
  #[serde(default)]
  pub metadata: Map<String, Value>,
}

impl ViewRecord {
  pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      title: title.into(),
      ..Self::default()
    }
  }

  pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.metadata.insert(key.to_string(), value.into());
    self
  }

  /// Look a field up by name.
  ///
  /// Built-in fields answer to camelCase or snake_case names; anything else
  /// is read from `metadata`.
  pub fn field(&self, name: &str) -> Option<FieldValue> {
    match name {
      "id" => Some(FieldValue::Text(self.id.clone())),
      "title" => Some(FieldValue::Text(self.title.clone())),
      "subtitle" => self.subtitle.clone().map(FieldValue::Text),
      "description" => self.description.clone().map(FieldValue::Text),
      "status" => self.status.clone().map(FieldValue::Text),
      "tags" => Some(FieldValue::Tags(self.tags.clone())),
      "groupKey" | "group_key" => self.group_key.clone().map(FieldValue::Text),
      "primaryDate" | "primary_date" => self.primary_date.map(FieldValue::Date),
      other => self.metadata.get(other).and_then(FieldValue::from_json),
    }
  }
}

/// Pure mapping from a domain entity to its view projection.
pub trait IntoViewRecord {
  fn to_view_record(&self) -> ViewRecord;
}

/// A record's value for one field, coerced on demand by filters and sorts.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  Text(String),
  Number(f64),
  Date(DateTime<Utc>),
  Bool(bool),
  Tags(Vec<String>),
}

impl FieldValue {
  pub fn from_json(value: &Value) -> Option<Self> {
    match value {
      Value::Null => None,
      Value::Bool(b) => Some(FieldValue::Bool(*b)),
      Value::Number(n) => n.as_f64().map(FieldValue::Number),
      Value::String(s) => Some(FieldValue::Text(s.clone())),
      Value::Array(items) => Some(FieldValue::Tags(
        items
          .iter()
          .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
          })
          .collect(),
      )),
      Value::Object(_) => Some(FieldValue::Text(value.to_string())),
    }
  }

  /// Text form, used by text operators and as a grouping key.
  pub fn as_text(&self) -> String {
    match self {
      FieldValue::Text(s) => s.clone(),
      FieldValue::Number(n) => format_number(*n),
      FieldValue::Date(d) => d.to_rfc3339(),
      FieldValue::Bool(b) => b.to_string(),
      FieldValue::Tags(tags) => tags.join(", "),
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      FieldValue::Number(n) => Some(*n),
      FieldValue::Text(s) => s.trim().parse().ok(),
      _ => None,
    }
  }

  pub fn as_date(&self) -> Option<DateTime<Utc>> {
    match self {
      FieldValue::Date(d) => Some(*d),
      FieldValue::Text(s) => parse_date(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      FieldValue::Bool(b) => Some(*b),
      FieldValue::Text(s) => match s.trim().to_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
      },
      FieldValue::Number(n) => Some(*n != 0.0),
      _ => None,
    }
  }

  pub fn as_tags(&self) -> Vec<String> {
    match self {
      FieldValue::Tags(tags) => tags.clone(),
      FieldValue::Text(s) if !s.trim().is_empty() => vec![s.clone()],
      _ => Vec::new(),
    }
  }

  /// Whether the value counts as absent for `isEmpty`.
  pub fn is_empty(&self) -> bool {
    match self {
      FieldValue::Text(s) => s.trim().is_empty(),
      FieldValue::Tags(tags) => tags.is_empty(),
      _ => false,
    }
  }
}

fn format_number(n: f64) -> String {
  if n.fract() == 0.0 && n.abs() < 1e15 {
    format!("{}", n as i64)
  } else {
    n.to_string()
  }
}

/// Parse RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  DateTime::parse_from_rfc3339(s)
    .map(|d| d.with_timezone(&Utc))
    .ok()
    .or_else(|| {
      NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
    })
}
