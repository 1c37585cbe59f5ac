//! Per-view display state: mode, filters, grouping, sorting and paging.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::warn;

use super::filter::{apply_filters, FilterCondition};
use super::group::{group_records, AppliedGroup, GroupConfig};
use super::record::{FieldValue, ViewRecord};
use crate::cache::DurableStore;

pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  #[default]
  Table,
  Gallery,
  Kanban,
  Calendar,
}

impl std::str::FromStr for ViewMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "table" => Ok(ViewMode::Table),
      "gallery" => Ok(ViewMode::Gallery),
      "kanban" => Ok(ViewMode::Kanban),
      "calendar" => Ok(ViewMode::Calendar),
      other => Err(format!("unknown view mode '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
  pub column: String,
  pub direction: SortDirection,
}

/// State of one view instance.
///
/// Changing filters, grouping, sort or page size sends the view back to
/// page 1. Page size itself only changes when set explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
  mode: ViewMode,
  filters: Vec<FilterCondition>,
  group: Option<GroupConfig>,
  sort: Option<SortState>,
  page: usize,
  page_size: usize,
}

impl Default for ViewState {
  fn default() -> Self {
    Self {
      mode: ViewMode::default(),
      filters: Vec::new(),
      group: None,
      sort: None,
      page: 1,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }
}

/// Result of running records through a view state.
#[derive(Debug, Clone)]
pub struct ViewPage {
  /// Records on the current page, sorted
  pub records: Vec<ViewRecord>,
  /// Records passing the filters, across all pages
  pub total: usize,
  pub page: usize,
  pub page_size: usize,
  pub total_pages: usize,
  /// Current page grouped, when grouping is configured
  pub groups: Option<Vec<AppliedGroup>>,
}

impl ViewState {
  pub fn mode(&self) -> ViewMode {
    self.mode
  }

  pub fn filters(&self) -> &[FilterCondition] {
    &self.filters
  }

  pub fn group(&self) -> Option<&GroupConfig> {
    self.group.as_ref()
  }

  pub fn sort(&self) -> Option<&SortState> {
    self.sort.as_ref()
  }

  pub fn page(&self) -> usize {
    self.page
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  pub fn set_mode(&mut self, mode: ViewMode) {
    self.mode = mode;
  }

  pub fn set_filters(&mut self, filters: Vec<FilterCondition>) {
    self.filters = filters;
    self.page = 1;
  }

  pub fn add_filter(&mut self, filter: FilterCondition) {
    self.filters.push(filter);
    self.page = 1;
  }

  pub fn remove_filter(&mut self, index: usize) -> Option<FilterCondition> {
    if index >= self.filters.len() {
      return None;
    }
    self.page = 1;
    Some(self.filters.remove(index))
  }

  pub fn clear_filters(&mut self) {
    self.set_filters(Vec::new());
  }

  pub fn set_group(&mut self, group: Option<GroupConfig>) {
    self.group = group;
    self.page = 1;
  }

  pub fn set_sort(&mut self, sort: Option<SortState>) {
    self.sort = sort;
    self.page = 1;
  }

  /// Cycle a column through ascending, descending, unsorted.
  pub fn toggle_sort(&mut self, column: &str) {
    let next = match &self.sort {
      Some(s) if s.column == column && s.direction == SortDirection::Asc => Some(SortState {
        column: column.to_string(),
        direction: SortDirection::Desc,
      }),
      Some(s) if s.column == column => None,
      _ => Some(SortState {
        column: column.to_string(),
        direction: SortDirection::Asc,
      }),
    };
    self.set_sort(next);
  }

  pub fn set_page(&mut self, page: usize) {
    self.page = page.max(1);
  }

  pub fn set_page_size(&mut self, page_size: usize) {
    self.page_size = page_size.max(1);
    self.page = 1;
  }

  /// Filter, sort, paginate and group `records`.
  pub fn apply(&self, records: &[ViewRecord], now: DateTime<Utc>) -> ViewPage {
    let mut visible = apply_filters(records, &self.filters, now);

    if let Some(sort) = &self.sort {
      visible.sort_by(|a, b| {
        compare_fields(a.field(&sort.column), b.field(&sort.column), sort.direction)
      });
    }

    let total = visible.len();
    let total_pages = total.div_ceil(self.page_size).max(1);
    let page = self.page.min(total_pages);

    let records: Vec<ViewRecord> = visible
      .into_iter()
      .skip((page - 1) * self.page_size)
      .take(self.page_size)
      .cloned()
      .collect();

    let groups = self
      .group
      .as_ref()
      .map(|config| group_records(&records, config));

    ViewPage {
      records,
      total,
      page,
      page_size: self.page_size,
      total_pages,
      groups,
    }
  }
}

/// Order two field values. Missing values sort last in either direction.
fn compare_fields(a: Option<FieldValue>, b: Option<FieldValue>, direction: SortDirection) -> Ordering {
  let (a, b) = match (a, b) {
    (None, None) => return Ordering::Equal,
    (None, Some(_)) => return Ordering::Greater,
    (Some(_), None) => return Ordering::Less,
    (Some(a), Some(b)) => (a, b),
  };

  let ordering = match (&a, &b) {
    (FieldValue::Date(x), FieldValue::Date(y)) => x.cmp(y),
    _ => match (a.as_number(), b.as_number()) {
      (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
      _ => a.as_text().to_lowercase().cmp(&b.as_text().to_lowercase()),
    },
  };

  match direction {
    SortDirection::Asc => ordering,
    SortDirection::Desc => ordering.reverse(),
  }
}

/// Persists view state per caller-supplied namespace.
///
/// Each part is stored under its own key so one unreadable part does not
/// cost the others.
#[derive(Clone)]
pub struct ViewStateStore {
  store: Arc<dyn DurableStore>,
}

impl ViewStateStore {
  pub fn new(store: Arc<dyn DurableStore>) -> Self {
    Self { store }
  }

  fn key(namespace: &str, part: &str) -> String {
    format!("{}:view:{}", namespace, part)
  }

  fn read<T: DeserializeOwned>(&self, namespace: &str, part: &str) -> Option<T> {
    let key = Self::key(namespace, part);
    let raw = match self.store.get(&key) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(key = %key, error = %e, "failed to read view state");
        return None;
      }
    };
    match serde_json::from_str(&raw) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key = %key, error = %e, "ignoring unreadable view state");
        None
      }
    }
  }

  fn write<T: Serialize>(&self, namespace: &str, part: &str, value: Option<&T>) -> Result<()> {
    let key = Self::key(namespace, part);
    match value {
      Some(value) => {
        let raw = serde_json::to_string(value)
          .map_err(|e| eyre!("Failed to serialize view state {}: {}", key, e))?;
        self.store.set(&key, &raw)
      }
      None => self.store.remove(&key),
    }
  }

  /// Restore the state saved under `namespace`, defaulting what is missing.
  pub fn load(&self, namespace: &str) -> ViewState {
    let defaults = ViewState::default();
    ViewState {
      mode: self.read(namespace, "mode").unwrap_or(defaults.mode),
      filters: self.read(namespace, "filters").unwrap_or(defaults.filters),
      group: self.read(namespace, "group"),
      sort: self.read(namespace, "sort"),
      page: self
        .read::<usize>(namespace, "page")
        .map(|p| p.max(1))
        .unwrap_or(defaults.page),
      page_size: self
        .read::<usize>(namespace, "pageSize")
        .map(|s| s.max(1))
        .unwrap_or(defaults.page_size),
    }
  }

  pub fn save(&self, namespace: &str, state: &ViewState) -> Result<()> {
    self.write(namespace, "mode", Some(&state.mode))?;
    self.write(namespace, "filters", Some(&state.filters))?;
    self.write(namespace, "group", state.group.as_ref())?;
    self.write(namespace, "sort", state.sort.as_ref())?;
    self.write(namespace, "page", Some(&state.page))?;
    self.write(namespace, "pageSize", Some(&state.page_size))?;
    Ok(())
  }

  /// Forget everything saved under `namespace`.
  pub fn reset(&self, namespace: &str) -> Result<()> {
    for key in self.store.keys_with_prefix(&Self::key(namespace, ""))? {
      self.store.remove(&key)?;
    }
    Ok(())
  }
}
