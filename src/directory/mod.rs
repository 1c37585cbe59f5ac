//! People/group directory lookups behind a two-level cache.

pub mod cached_client;
pub mod client;
pub mod error;
pub mod types;

pub use cached_client::{PersonSearch, MIN_QUERY_CHARS};
pub use client::{Directory, HttpDirectory};
pub use error::{classify, DirectoryError, SearchError, SearchErrorCode};
pub use types::{DirectoryEntry, RawDirectoryRecord, ResultKind};
