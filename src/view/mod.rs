//! Entity-agnostic view state: filtering, grouping, sorting, paging and
//! kanban boards over [`ViewRecord`]s.

pub mod filter;
pub mod group;
pub mod kanban;
pub mod record;
pub mod state;

pub use filter::{apply_filters, FilterCondition, FilterError};
pub use group::{group_records, AppliedGroup, GroupConfig};
pub use kanban::{
  AcceptAll, DropContext, DropEvent, DropHandler, DropOutcome, DropRejected, KanbanBoard,
  KanbanColumn, UndoAction, UndoRecorder,
};
pub use record::{FieldValue, IntoViewRecord, ViewRecord};
pub use state::{SortDirection, SortState, ViewMode, ViewPage, ViewState, ViewStateStore};
