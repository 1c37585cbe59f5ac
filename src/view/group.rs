//! Grouping of view records by one field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::record::ViewRecord;

/// Group records by a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
  pub field: String,
  /// Drop the group of records with no value for `field`
  #[serde(default)]
  pub hide_empty: bool,
}

impl GroupConfig {
  pub fn by(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      hide_empty: false,
    }
  }
}

/// One derived group. Recomputed from records + config, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedGroup {
  /// `None` for records missing the field
  pub key: Option<String>,
  pub label: String,
  pub records: Vec<ViewRecord>,
}

/// Group records by the configured field.
///
/// The missing-value group comes first, the rest follow in key order.
/// Record order inside a group is preserved.
pub fn group_records<'a, I>(records: I, config: &GroupConfig) -> Vec<AppliedGroup>
where
  I: IntoIterator<Item = &'a ViewRecord>,
{
  let mut missing: Vec<ViewRecord> = Vec::new();
  let mut keyed: BTreeMap<String, Vec<ViewRecord>> = BTreeMap::new();

  for record in records {
    let key = record
      .field(&config.field)
      .filter(|v| !v.is_empty())
      .map(|v| v.as_text());
    match key {
      Some(key) => keyed.entry(key).or_default().push(record.clone()),
      None => missing.push(record.clone()),
    }
  }

  let mut groups = Vec::with_capacity(keyed.len() + 1);
  if !missing.is_empty() && !config.hide_empty {
    groups.push(AppliedGroup {
      key: None,
      label: format!("No {}", config.field),
      records: missing,
    });
  }
  for (key, records) in keyed {
    groups.push(AppliedGroup {
      label: key.clone(),
      key: Some(key),
      records,
    });
  }
  groups
}
