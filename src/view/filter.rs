//! Typed filter conditions and their evaluation against view records.
//!
//! Each condition type carries its own operator enum, so an operator can
//! never be paired with the wrong type. Value shape still has to agree with
//! the operator (ranges for `between`, a relative range for `within`), which
//! [`FilterCondition::validate`] checks.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::record::{FieldValue, ViewRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterCondition {
  Text {
    field: String,
    operator: TextOperator,
    value: String,
  },
  Number {
    field: String,
    operator: NumberOperator,
    value: NumberValue,
  },
  Date {
    field: String,
    operator: DateOperator,
    value: DateValue,
  },
  Tag {
    field: String,
    operator: TagOperator,
    value: Vec<String>,
  },
  Boolean {
    field: String,
    operator: BooleanOperator,
    value: bool,
  },
  Empty {
    field: String,
    operator: EmptyOperator,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextOperator {
  Contains,
  Equals,
  StartsWith,
  EndsWith,
  NotContains,
  NotEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberOperator {
  Equals,
  NotEquals,
  GreaterThan,
  GreaterThanOrEqual,
  LessThan,
  LessThanOrEqual,
  Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateOperator {
  Before,
  After,
  Between,
  /// Relative range resolved against "now" at evaluation time
  Within,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagOperator {
  IncludesAny,
  IncludesAll,
  Excludes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BooleanOperator {
  Is,
  IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyOperator {
  IsEmpty,
  IsNotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberValue {
  Range { min: f64, max: f64 },
  Single(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
  Relative(RelativeRange),
  Range {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  },
  Instant(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativeRange {
  pub direction: RelativeDirection,
  pub amount: u32,
  pub unit: RelativeUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeDirection {
  Last,
  Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeUnit {
  Days,
  Weeks,
  Months,
}

impl RelativeRange {
  /// Resolve to an inclusive absolute range around `now`.
  pub fn resolve(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let amount = i64::from(self.amount);
    let delta = match self.unit {
      RelativeUnit::Days => Duration::try_days(amount),
      RelativeUnit::Weeks => Duration::try_weeks(amount),
      RelativeUnit::Months => None,
    };
    // Out-of-range results clamp to the ends of the representable range
    let shifted = match (self.unit, self.direction) {
      (RelativeUnit::Months, RelativeDirection::Last) => {
        now.checked_sub_months(Months::new(self.amount))
      }
      (RelativeUnit::Months, RelativeDirection::Next) => {
        now.checked_add_months(Months::new(self.amount))
      }
      (_, RelativeDirection::Last) => delta.and_then(|d| now.checked_sub_signed(d)),
      (_, RelativeDirection::Next) => delta.and_then(|d| now.checked_add_signed(d)),
    };
    let shifted = shifted.unwrap_or(match self.direction {
      RelativeDirection::Last => DateTime::<Utc>::MIN_UTC,
      RelativeDirection::Next => DateTime::<Utc>::MAX_UTC,
    });

    match self.direction {
      RelativeDirection::Last => (shifted, now),
      RelativeDirection::Next => (now, shifted),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
  #[error("filter has no field")]
  MissingField,
  #[error("filter on '{field}': {reason}")]
  InvalidValue { field: String, reason: String },
}

impl FilterCondition {
  pub fn field(&self) -> &str {
    match self {
      FilterCondition::Text { field, .. }
      | FilterCondition::Number { field, .. }
      | FilterCondition::Date { field, .. }
      | FilterCondition::Tag { field, .. }
      | FilterCondition::Boolean { field, .. }
      | FilterCondition::Empty { field, .. } => field,
    }
  }

  /// Check that the value shape agrees with the operator.
  pub fn validate(&self) -> Result<(), FilterError> {
    let field = self.field();
    if field.trim().is_empty() {
      return Err(FilterError::MissingField);
    }
    let invalid = |reason: &str| -> Result<(), FilterError> {
      Err(FilterError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
      })
    };

    match self {
      FilterCondition::Number {
        operator, value, ..
      } => match (operator, value) {
        (NumberOperator::Between, NumberValue::Range { min, max }) if min > max => {
          invalid("range minimum is above its maximum")
        }
        (NumberOperator::Between, NumberValue::Range { .. }) => Ok(()),
        (NumberOperator::Between, NumberValue::Single(_)) => invalid("between needs {min, max}"),
        (_, NumberValue::Range { .. }) => invalid("only between takes a range"),
        (_, NumberValue::Single(_)) => Ok(()),
      },
      FilterCondition::Date {
        operator, value, ..
      } => match (operator, value) {
        (DateOperator::Between, DateValue::Range { start, end }) if start > end => {
          invalid("range start is after its end")
        }
        (DateOperator::Between, DateValue::Range { .. }) => Ok(()),
        (DateOperator::Between, _) => invalid("between needs {start, end}"),
        (DateOperator::Within, DateValue::Relative(_)) => Ok(()),
        (DateOperator::Within, _) => invalid("within needs {direction, amount, unit}"),
        (DateOperator::Before | DateOperator::After, DateValue::Instant(_)) => Ok(()),
        (DateOperator::Before | DateOperator::After, _) => invalid("before/after take a single date"),
      },
      _ => Ok(()),
    }
  }

  /// Evaluate against one record.
  ///
  /// Conditions whose value does not fit their operator are incomplete and
  /// let every record through.
  pub fn matches(&self, record: &ViewRecord, now: DateTime<Utc>) -> bool {
    if let Err(e) = self.validate() {
      debug!(error = %e, "ignoring incomplete filter condition");
      return true;
    }

    let actual = record.field(self.field());

    match self {
      FilterCondition::Text {
        operator, value, ..
      } => {
        let actual = actual.map(|v| v.as_text()).unwrap_or_default().to_lowercase();
        let expected = value.to_lowercase();
        match operator {
          TextOperator::Contains => actual.contains(&expected),
          TextOperator::Equals => actual == expected,
          TextOperator::StartsWith => actual.starts_with(&expected),
          TextOperator::EndsWith => actual.ends_with(&expected),
          TextOperator::NotContains => !actual.contains(&expected),
          TextOperator::NotEquals => actual != expected,
        }
      }
      FilterCondition::Number {
        operator, value, ..
      } => {
        let Some(actual) = actual.and_then(|v| v.as_number()) else {
          return *operator == NumberOperator::NotEquals;
        };
        match (operator, value) {
          (NumberOperator::Between, NumberValue::Range { min, max }) => {
            actual >= *min && actual <= *max
          }
          (NumberOperator::Equals, NumberValue::Single(n)) => (actual - n).abs() < f64::EPSILON,
          (NumberOperator::NotEquals, NumberValue::Single(n)) => {
            (actual - n).abs() >= f64::EPSILON
          }
          (NumberOperator::GreaterThan, NumberValue::Single(n)) => actual > *n,
          (NumberOperator::GreaterThanOrEqual, NumberValue::Single(n)) => actual >= *n,
          (NumberOperator::LessThan, NumberValue::Single(n)) => actual < *n,
          (NumberOperator::LessThanOrEqual, NumberValue::Single(n)) => actual <= *n,
          _ => true,
        }
      }
      FilterCondition::Date {
        operator, value, ..
      } => {
        let Some(actual) = actual.and_then(|v| v.as_date()) else {
          return false;
        };
        match (operator, value) {
          (DateOperator::Before, DateValue::Instant(at)) => actual < *at,
          (DateOperator::After, DateValue::Instant(at)) => actual > *at,
          (DateOperator::Between, DateValue::Range { start, end }) => {
            actual >= *start && actual <= *end
          }
          (DateOperator::Within, DateValue::Relative(range)) => {
            let (start, end) = range.resolve(now);
            actual >= start && actual <= end
          }
          _ => true,
        }
      }
      FilterCondition::Tag {
        operator, value, ..
      } => {
        let tags = actual.map(|v| v.as_tags()).unwrap_or_default();
        match operator {
          TagOperator::IncludesAny => value.iter().any(|t| tags.contains(t)),
          TagOperator::IncludesAll => value.iter().all(|t| tags.contains(t)),
          TagOperator::Excludes => !value.iter().any(|t| tags.contains(t)),
        }
      }
      FilterCondition::Boolean {
        operator, value, ..
      } => {
        let actual = actual.and_then(|v| v.as_bool()).unwrap_or(false);
        match operator {
          BooleanOperator::Is => actual == *value,
          BooleanOperator::IsNot => actual != *value,
        }
      }
      FilterCondition::Empty { operator, .. } => {
        let empty = actual.as_ref().map(FieldValue::is_empty).unwrap_or(true);
        match operator {
          EmptyOperator::IsEmpty => empty,
          EmptyOperator::IsNotEmpty => !empty,
        }
      }
    }
  }
}

/// Keep records passing every condition.
pub fn apply_filters<'a>(
  records: &'a [ViewRecord],
  conditions: &[FilterCondition],
  now: DateTime<Utc>,
) -> Vec<&'a ViewRecord> {
  records
    .iter()
    .filter(|record| conditions.iter().all(|c| c.matches(record, now)))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use serde_json::json;

  fn named(id: &str, name: &str) -> ViewRecord {
    ViewRecord::new(id, name).with_meta("name", name)
  }

  fn text(field: &str, operator: TextOperator, value: &str) -> FilterCondition {
    FilterCondition::Text {
      field: field.to_string(),
      operator,
      value: value.to_string(),
    }
  }

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
  }

  #[test]
  fn test_contains_is_case_insensitive() {
    let records = vec![named("1", "Microphone"), named("2", "Camera")];
    let conditions = vec![text("name", TextOperator::Contains, "mic")];

    let passed = apply_filters(&records, &conditions, now());

    assert_eq!(passed.len(), 1);
    assert_eq!(passed[0].id, "1");
  }

  #[test]
  fn test_text_operators() {
    let record = named("1", "Stage Light");
    let check = |op, value| text("name", op, value).matches(&record, now());

    assert!(check(TextOperator::Equals, "stage light"));
    assert!(check(TextOperator::StartsWith, "STAGE"));
    assert!(check(TextOperator::EndsWith, "light"));
    assert!(check(TextOperator::NotContains, "mic"));
    assert!(check(TextOperator::NotEquals, "stage"));
    assert!(!check(TextOperator::NotContains, "light"));
  }

  #[test]
  fn test_conditions_combine_with_and() {
    let records = vec![
      named("1", "Microphone").with_meta("value", 100),
      named("2", "Mic stand").with_meta("value", 20),
    ];
    let conditions = vec![
      text("name", TextOperator::Contains, "mic"),
      FilterCondition::Number {
        field: "value".to_string(),
        operator: NumberOperator::GreaterThan,
        value: NumberValue::Single(50.0),
      },
    ];

    let passed = apply_filters(&records, &conditions, now());
    assert_eq!(passed.len(), 1);
    assert_eq!(passed[0].id, "1");
  }

  #[test]
  fn test_number_between_is_inclusive() {
    let condition = FilterCondition::Number {
      field: "value".to_string(),
      operator: NumberOperator::Between,
      value: NumberValue::Range {
        min: 10.0,
        max: 20.0,
      },
    };
    let at = |v: i64| condition.matches(&ViewRecord::new("x", "x").with_meta("value", v), now());

    assert!(at(10));
    assert!(at(20));
    assert!(!at(21));
    assert!(!condition.matches(&ViewRecord::new("x", "x"), now()));
  }

  #[test]
  fn test_date_relative_range() {
    let condition = FilterCondition::Date {
      field: "primaryDate".to_string(),
      operator: DateOperator::Within,
      value: DateValue::Relative(RelativeRange {
        direction: RelativeDirection::Last,
        amount: 1,
        unit: RelativeUnit::Months,
      }),
    };
    let dated = |d: DateTime<Utc>| ViewRecord {
      primary_date: Some(d),
      ..ViewRecord::new("x", "x")
    };

    assert!(condition.matches(&dated(Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap()), now()));
    assert!(!condition.matches(&dated(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()), now()));
    assert!(!condition.matches(&dated(Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap()), now()));
  }

  fn within(direction: RelativeDirection, amount: u32, unit: RelativeUnit) -> FilterCondition {
    FilterCondition::Date {
      field: "primaryDate".to_string(),
      operator: DateOperator::Within,
      value: DateValue::Relative(RelativeRange {
        direction,
        amount,
        unit,
      }),
    }
  }

  fn dated(d: DateTime<Utc>) -> ViewRecord {
    ViewRecord {
      primary_date: Some(d),
      ..ViewRecord::new("x", "x")
    }
  }

  #[test]
  fn test_within_next_weeks_is_inclusive() {
    let condition = within(RelativeDirection::Next, 2, RelativeUnit::Weeks);
    let end = Utc.with_ymd_and_hms(2024, 6, 29, 12, 0, 0).unwrap();

    assert!(condition.matches(&dated(now()), now()));
    assert!(condition.matches(&dated(end), now()));
    assert!(!condition.matches(&dated(end + Duration::seconds(1)), now()));
    assert!(!condition.matches(&dated(now() - Duration::seconds(1)), now()));
  }

  #[test]
  fn test_within_last_days_is_inclusive() {
    let condition = within(RelativeDirection::Last, 3, RelativeUnit::Days);
    let start = Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap();

    assert!(condition.matches(&dated(start), now()));
    assert!(condition.matches(&dated(now()), now()));
    assert!(!condition.matches(&dated(start - Duration::seconds(1)), now()));
    assert!(!condition.matches(&dated(now() + Duration::seconds(1)), now()));
  }

  #[test]
  fn test_huge_relative_amount_clamps_instead_of_overflowing() {
    let old = Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap();
    let far = Utc.with_ymd_and_hms(2900, 1, 1, 0, 0, 0).unwrap();

    for unit in [RelativeUnit::Days, RelativeUnit::Weeks, RelativeUnit::Months] {
      let last = within(RelativeDirection::Last, u32::MAX, unit);
      assert_eq!(resolved(&last).0, DateTime::<Utc>::MIN_UTC);
      assert!(last.matches(&dated(old), now()));
      assert!(!last.matches(&dated(far), now()));

      let next = within(RelativeDirection::Next, u32::MAX, unit);
      assert_eq!(resolved(&next).1, DateTime::<Utc>::MAX_UTC);
      assert!(next.matches(&dated(far), now()));
      assert!(!next.matches(&dated(old), now()));
    }
  }

  fn resolved(condition: &FilterCondition) -> (DateTime<Utc>, DateTime<Utc>) {
    match condition {
      FilterCondition::Date {
        value: DateValue::Relative(range),
        ..
      } => range.resolve(now()),
      _ => unreachable!(),
    }
  }

  #[test]
  fn test_relative_range_from_json_does_not_panic() {
    let condition: FilterCondition = serde_json::from_value(json!({
      "type": "date",
      "field": "primaryDate",
      "operator": "within",
      "value": {"direction": "last", "amount": 1_000_000_000u32, "unit": "days"}
    }))
    .unwrap();
    assert!(condition.matches(&dated(now()), now()));
  }

  #[test]
  fn test_date_absolute_operators_on_text_dates() {
    let record = ViewRecord::new("x", "x").with_meta("purchased", "2024-01-10");
    let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let before = FilterCondition::Date {
      field: "purchased".to_string(),
      operator: DateOperator::Before,
      value: DateValue::Instant(at),
    };
    let after = FilterCondition::Date {
      field: "purchased".to_string(),
      operator: DateOperator::After,
      value: DateValue::Instant(at),
    };

    assert!(before.matches(&record, now()));
    assert!(!after.matches(&record, now()));
  }

  #[test]
  fn test_tag_operators() {
    let record = ViewRecord {
      tags: vec!["audio".to_string(), "portable".to_string()],
      ..ViewRecord::new("x", "x")
    };
    let tag = |operator, value: &[&str]| FilterCondition::Tag {
      field: "tags".to_string(),
      operator,
      value: value.iter().map(|s| s.to_string()).collect(),
    };

    assert!(tag(TagOperator::IncludesAny, &["video", "audio"]).matches(&record, now()));
    assert!(!tag(TagOperator::IncludesAll, &["video", "audio"]).matches(&record, now()));
    assert!(tag(TagOperator::IncludesAll, &["portable", "audio"]).matches(&record, now()));
    assert!(tag(TagOperator::Excludes, &["video"]).matches(&record, now()));
    assert!(!tag(TagOperator::Excludes, &["audio"]).matches(&record, now()));
  }

  #[test]
  fn test_boolean_and_empty_operators() {
    let record = ViewRecord::new("x", "x")
      .with_meta("portable", true)
      .with_meta("notes", "  ");

    let boolean = |operator, value| FilterCondition::Boolean {
      field: "portable".to_string(),
      operator,
      value,
    };
    assert!(boolean(BooleanOperator::Is, true).matches(&record, now()));
    assert!(boolean(BooleanOperator::IsNot, false).matches(&record, now()));

    let empty = |field: &str, operator| FilterCondition::Empty {
      field: field.to_string(),
      operator,
    };
    assert!(empty("notes", EmptyOperator::IsEmpty).matches(&record, now()));
    assert!(empty("missing", EmptyOperator::IsEmpty).matches(&record, now()));
    assert!(empty("portable", EmptyOperator::IsNotEmpty).matches(&record, now()));
  }

  #[test]
  fn test_value_shape_must_match_operator() {
    let bad = FilterCondition::Number {
      field: "value".to_string(),
      operator: NumberOperator::Between,
      value: NumberValue::Single(3.0),
    };
    assert!(bad.validate().is_err());
    // Incomplete conditions do not filter anything out
    assert!(bad.matches(&ViewRecord::new("x", "x"), now()));

    let reversed = FilterCondition::Number {
      field: "value".to_string(),
      operator: NumberOperator::Between,
      value: NumberValue::Range { min: 5.0, max: 1.0 },
    };
    assert!(reversed.validate().is_err());

    let missing_field = text(" ", TextOperator::Contains, "x");
    assert_eq!(missing_field.validate(), Err(FilterError::MissingField));
  }

  #[test]
  fn test_conditions_deserialize_from_tagged_json() {
    let conditions: Vec<FilterCondition> = serde_json::from_value(json!([
      {"type": "text", "field": "name", "operator": "startsWith", "value": "mi"},
      {"type": "number", "field": "value", "operator": "between", "value": {"min": 1, "max": 2}},
      {"type": "date", "field": "due", "operator": "within",
       "value": {"direction": "next", "amount": 2, "unit": "weeks"}},
      {"type": "tag", "field": "tags", "operator": "includesAny", "value": ["a"]},
      {"type": "boolean", "field": "active", "operator": "isNot", "value": false},
      {"type": "empty", "field": "notes", "operator": "isNotEmpty"}
    ]))
    .unwrap();

    assert_eq!(conditions.len(), 6);
    assert!(conditions.iter().all(|c| c.validate().is_ok()));
    assert!(matches!(
      conditions[2],
      FilterCondition::Date {
        value: DateValue::Relative(RelativeRange {
          unit: RelativeUnit::Weeks,
          ..
        }),
        ..
      }
    ));
  }

  #[test]
  fn test_operator_outside_type_is_rejected() {
    let parsed: Result<FilterCondition, _> = serde_json::from_value(json!(
      {"type": "boolean", "field": "active", "operator": "contains", "value": true}
    ));
    assert!(parsed.is_err());
  }
}
