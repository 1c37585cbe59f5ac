//! Inventory entities and their projection into view records.

pub mod types;

pub use types::{Asset, AssetStatus, Booking, BookingStatus};

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::view::kanban::DEFAULT_COLUMN_BATCH;
use crate::view::{IntoViewRecord, KanbanBoard, ViewRecord};

/// Read a JSON array of entities from disk.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  serde_json::from_str(&contents).map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))
}

pub fn to_records<T: IntoViewRecord>(items: &[T]) -> Vec<ViewRecord> {
  items.iter().map(IntoViewRecord::to_view_record).collect()
}

/// Kanban board with one column per asset status.
pub fn asset_board(records: &[ViewRecord]) -> KanbanBoard {
  let columns: Vec<(&str, &str)> = AssetStatus::all()
    .iter()
    .map(|s| (s.as_str(), s.label()))
    .collect();
  KanbanBoard::from_records(records, &columns, DEFAULT_COLUMN_BATCH)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::view::{AcceptAll, DropEvent, UndoAction, UndoRecorder};
  use std::sync::Mutex;

  #[derive(Default)]
  struct Recorded(Mutex<Vec<UndoAction>>);

  impl UndoRecorder for Recorded {
    async fn record(&self, action: UndoAction) -> Result<String> {
      let mut actions = self.0.lock().unwrap();
      actions.push(action);
      Ok(format!("undo-{}", actions.len()))
    }
  }

  fn assets() -> Vec<Asset> {
    serde_json::from_str(
      r#"[
        {"id": "a-1", "name": "Mic", "status": "available"},
        {"id": "a-2", "name": "Projector", "status": "available"},
        {"id": "a-3", "name": "Camera", "status": "maintenance"}
      ]"#,
    )
    .unwrap()
  }

  #[test]
  fn test_asset_board_columns_follow_status() {
    let board = asset_board(&to_records(&assets()));

    let ids: Vec<&str> = board.columns().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["available", "checked_out", "maintenance", "retired"]);
    assert_eq!(board.column("available").unwrap().len(), 2);
    assert_eq!(board.column("maintenance").unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_checkout_drop_records_asset_undo() {
    let mut board = asset_board(&to_records(&assets()));
    let recorder = Recorded::default();

    let outcome = board
      .handle_drop(
        &DropEvent {
          from_column: "available".to_string(),
          from_index: 0,
          to_column: "checked_out".to_string(),
          to_index: 0,
        },
        &AcceptAll,
        Some(&recorder),
      )
      .await
      .unwrap();

    assert!(outcome.moved);
    assert_eq!(outcome.undo_action_id.as_deref(), Some("undo-1"));

    let actions = recorder.0.lock().unwrap();
    assert_eq!(actions[0].entity_type, "asset");
    assert_eq!(actions[0].entity_id, "a-1");
    assert_eq!(actions[0].before_state["status"], "available");
    assert_eq!(actions[0].after_state["status"], "checked_out");
  }

  #[test]
  fn test_load_json_missing_file() {
    let err = load_json::<Asset>(Path::new("/nonexistent/assets.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
  }
}
