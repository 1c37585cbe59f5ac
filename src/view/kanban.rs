//! Kanban board state: columns, incremental column loading and drag-and-drop.

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::record::ViewRecord;

/// Records revealed per "load more" step.
pub const DEFAULT_COLUMN_BATCH: usize = 20;

/// One board column.
///
/// Tracks how many of its records are visible separately from how many it
/// holds, so more can be revealed without refetching.
#[derive(Debug, Clone)]
pub struct KanbanColumn {
  pub id: String,
  pub title: String,
  records: Vec<ViewRecord>,
  visible: usize,
  batch: usize,
}

impl KanbanColumn {
  pub fn new(
    id: impl Into<String>,
    title: impl Into<String>,
    records: Vec<ViewRecord>,
    batch: usize,
  ) -> Self {
    let batch = batch.max(1);
    let visible = batch.min(records.len());
    Self {
      id: id.into(),
      title: title.into(),
      records,
      visible,
      batch,
    }
  }

  pub fn records(&self) -> &[ViewRecord] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn visible_count(&self) -> usize {
    self.visible
  }

  pub fn visible_records(&self) -> &[ViewRecord] {
    &self.records[..self.visible]
  }

  pub fn has_more(&self) -> bool {
    self.visible < self.records.len()
  }

  /// Reveal the next batch. Returns the new visible count.
  pub fn load_more(&mut self) -> usize {
    self.visible = (self.visible + self.batch).min(self.records.len());
    self.visible
  }

  /// Replace the column's records, keeping the visible count in range.
  pub fn set_records(&mut self, records: Vec<ViewRecord>) {
    let previous_len = self.records.len();
    self.records = records;
    self.sync_visible(previous_len);
  }

  fn insert(&mut self, index: usize, record: ViewRecord) {
    let previous_len = self.records.len();
    self.records.insert(index.min(previous_len), record);
    self.sync_visible(previous_len);
  }

  fn remove(&mut self, index: usize) -> ViewRecord {
    let previous_len = self.records.len();
    let record = self.records.remove(index);
    self.sync_visible(previous_len);
    record
  }

  fn sync_visible(&mut self, previous_len: usize) {
    let len = self.records.len();
    if len == previous_len {
      return;
    }
    let mut visible = self.visible;
    if previous_len > 0 && visible >= previous_len && len > previous_len {
      // Everything was on screen, keep new arrivals on screen too
      visible += len - previous_len;
    }
    self.visible = visible.max(self.batch.min(len)).min(len);
  }
}

/// A completed drag gesture as reported by the UI.
///
/// `to_index` is the insertion slot in the destination column as it looked
/// before the dragged record was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropEvent {
  pub from_column: String,
  pub from_index: usize,
  pub to_column: String,
  pub to_index: usize,
}

/// Resolved source and destination of one drag gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct DropContext {
  pub record: ViewRecord,
  pub from_column: String,
  pub from_index: usize,
  pub to_column: String,
  /// Final position of the record once the move is applied
  pub to_index: usize,
}

impl DropContext {
  pub fn is_noop(&self) -> bool {
    self.from_column == self.to_column && self.from_index == self.to_index
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropRejected {
  #[error("move not allowed: {0}")]
  Denied(String),
  #[error("no column '{0}' on this board")]
  UnknownColumn(String),
  #[error("column '{column}' has no record at {index}")]
  IndexOutOfRange { column: String, index: usize },
  #[error("move failed: {0}")]
  CommitFailed(String),
}

/// Undo-history entry describing one change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoAction {
  pub entity_type: String,
  pub entity_id: String,
  pub action_type: String,
  pub before_state: Value,
  pub after_state: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Value>,
}

/// Undo/history collaborator.
pub trait UndoRecorder {
  /// Record an action, returning its opaque id
  fn record(&self, action: UndoAction) -> impl Future<Output = Result<String>> + Send;
}

/// Caller hooks around a drop.
pub trait DropHandler {
  /// Veto a move before anything changes. `Err` carries the reason.
  fn can_drop(&self, _ctx: &DropContext) -> std::result::Result<(), String> {
    Ok(())
  }

  /// Persist the move. On error the board is put back as it was.
  fn commit(&self, _ctx: &DropContext) -> impl Future<Output = Result<()>> + Send {
    async { Ok(()) }
  }

  /// Build the undo entry for a committed move. Takes precedence over the
  /// entry inferred from record metadata.
  fn undo_action(&self, _ctx: &DropContext) -> Option<UndoAction> {
    None
  }

  /// Called when the undo recorder fails. The drop itself still succeeds.
  fn on_undo_error(&self, _ctx: &DropContext, _error: &color_eyre::Report) {}
}

/// Handler that allows every move and persists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl DropHandler for AcceptAll {}

/// Outcome of a successful drop.
#[derive(Debug, Clone)]
pub struct DropOutcome {
  pub context: DropContext,
  pub moved: bool,
  pub undo_action_id: Option<String>,
}

/// Undo entry built from metadata already attached to the record.
///
/// Needs `entityType` in the record metadata; `entityId` and `groupField`
/// are optional and default to the record id and `groupKey`.
pub fn infer_undo_action(ctx: &DropContext) -> Option<UndoAction> {
  let meta = &ctx.record.metadata;
  let entity_type = meta.get("entityType")?.as_str()?.to_string();
  let entity_id = meta
    .get("entityId")
    .and_then(|v| match v {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    })
    .unwrap_or_else(|| ctx.record.id.clone());
  let field = meta
    .get("groupField")
    .and_then(Value::as_str)
    .unwrap_or("groupKey");

  let state = |column: &str, position: usize| {
    let mut map = Map::new();
    map.insert(field.to_string(), Value::from(column));
    map.insert("position".to_string(), Value::from(position));
    Value::Object(map)
  };

  Some(UndoAction {
    entity_type,
    entity_id,
    action_type: "move".to_string(),
    before_state: state(&ctx.from_column, ctx.from_index),
    after_state: state(&ctx.to_column, ctx.to_index),
    metadata: Some(json!({ "source": "kanban" })),
  })
}

/// Board of columns built from view records by their `group_key`.
#[derive(Debug, Clone, Default)]
pub struct KanbanBoard {
  columns: Vec<KanbanColumn>,
}

impl KanbanBoard {
  pub fn new(columns: Vec<KanbanColumn>) -> Self {
    Self { columns }
  }

  /// Place records into `(id, title)` columns by `group_key`.
  /// Records whose key names no column are left off the board.
  pub fn from_records(records: &[ViewRecord], columns: &[(&str, &str)], batch: usize) -> Self {
    let columns = columns
      .iter()
      .map(|(id, title)| {
        let in_column: Vec<ViewRecord> = records
          .iter()
          .filter(|r| r.group_key.as_deref() == Some(*id))
          .cloned()
          .collect();
        KanbanColumn::new(*id, *title, in_column, batch)
      })
      .collect::<Vec<_>>();

    let placed: usize = columns.iter().map(KanbanColumn::len).sum();
    if placed < records.len() {
      debug!(
        skipped = records.len() - placed,
        "records without a matching column"
      );
    }

    Self { columns }
  }

  pub fn columns(&self) -> &[KanbanColumn] {
    &self.columns
  }

  pub fn column(&self, id: &str) -> Option<&KanbanColumn> {
    self.columns.iter().find(|c| c.id == id)
  }

  pub fn column_mut(&mut self, id: &str) -> Option<&mut KanbanColumn> {
    self.columns.iter_mut().find(|c| c.id == id)
  }

  fn position(&self, id: &str) -> std::result::Result<usize, DropRejected> {
    self
      .columns
      .iter()
      .position(|c| c.id == id)
      .ok_or_else(|| DropRejected::UnknownColumn(id.to_string()))
  }

  /// Work out where a drop really lands.
  ///
  /// Moving down inside one column shifts the target up by one, since the
  /// record is removed before it is reinserted.
  pub fn resolve_drop(&self, event: &DropEvent) -> std::result::Result<DropContext, DropRejected> {
    let from = &self.columns[self.position(&event.from_column)?];
    let to = &self.columns[self.position(&event.to_column)?];

    let record = from
      .records
      .get(event.from_index)
      .cloned()
      .ok_or_else(|| DropRejected::IndexOutOfRange {
        column: from.id.clone(),
        index: event.from_index,
      })?;

    let same_column = event.from_column == event.to_column;
    let mut to_index = event.to_index;
    if same_column && to_index > event.from_index {
      to_index -= 1;
    }
    let max_index = if same_column { to.len() - 1 } else { to.len() };
    to_index = to_index.min(max_index);

    Ok(DropContext {
      record,
      from_column: event.from_column.clone(),
      from_index: event.from_index,
      to_column: event.to_column.clone(),
      to_index,
    })
  }

  /// Move the record described by `ctx`, updating its `group_key`.
  fn apply(&mut self, ctx: &DropContext) {
    let Some(from) = self.column_mut(&ctx.from_column) else {
      return;
    };
    let mut record = from.remove(ctx.from_index);
    record.group_key = Some(ctx.to_column.clone());
    if let Some(to) = self.column_mut(&ctx.to_column) {
      to.insert(ctx.to_index, record);
    }
  }

  fn revert(&mut self, ctx: &DropContext) {
    let Some(to) = self.column_mut(&ctx.to_column) else {
      return;
    };
    let mut record = to.remove(ctx.to_index);
    record.group_key = ctx.record.group_key.clone();
    if let Some(from) = self.column_mut(&ctx.from_column) {
      from.insert(ctx.from_index, record);
    }
  }

  /// Resolve, vet, commit and record one drop.
  pub async fn handle_drop<H, R>(
    &mut self,
    event: &DropEvent,
    handler: &H,
    recorder: Option<&R>,
  ) -> std::result::Result<DropOutcome, DropRejected>
  where
    H: DropHandler,
    R: UndoRecorder,
  {
    let ctx = self.resolve_drop(event)?;
    if ctx.is_noop() {
      return Ok(DropOutcome {
        context: ctx,
        moved: false,
        undo_action_id: None,
      });
    }

    if let Err(reason) = handler.can_drop(&ctx) {
      info!(record = %ctx.record.id, reason = %reason, "drop vetoed");
      return Err(DropRejected::Denied(reason));
    }

    self.apply(&ctx);
    if let Err(e) = handler.commit(&ctx).await {
      warn!(record = %ctx.record.id, error = %e, "drop commit failed, reverting");
      self.revert(&ctx);
      return Err(DropRejected::CommitFailed(e.to_string()));
    }

    let action = handler.undo_action(&ctx).or_else(|| infer_undo_action(&ctx));
    let undo_action_id = match (action, recorder) {
      (Some(action), Some(recorder)) => match recorder.record(action).await {
        Ok(id) => Some(id),
        Err(e) => {
          warn!(record = %ctx.record.id, error = %e, "failed to record undo action");
          handler.on_undo_error(&ctx, &e);
          None
        }
      },
      _ => None,
    };

    Ok(DropOutcome {
      context: ctx,
      moved: true,
      undo_action_id,
    })
  }
}
