//! Raw directory payloads and the normalized entry the cache stores.
//!
//! Person and group results arrive with different field names. The raw type
//! accepts all of them and the conversion falls back through an ordered
//! list of candidate name fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label used when a result carries no usable name at all.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Kind of directory entity a result refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
  Person,
  Group,
  #[serde(other)]
  Other,
}

impl ResultKind {
  /// Order in which kinds are tried when only an id is known.
  pub const LOOKUP_ORDER: [ResultKind; 3] =
    [ResultKind::Person, ResultKind::Group, ResultKind::Other];

  pub fn as_str(&self) -> &'static str {
    match self {
      ResultKind::Person => "person",
      ResultKind::Group => "group",
      ResultKind::Other => "other",
    }
  }
}

impl std::str::FromStr for ResultKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "person" | "people" => Ok(ResultKind::Person),
      "group" | "groups" => Ok(ResultKind::Group),
      other => Err(format!("unknown result type '{}'", other)),
    }
  }
}

/// A result as the directory API returns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDirectoryRecord {
  /// String or numeric id, depending on the endpoint
  pub id: Option<Value>,
  #[serde(rename = "type", alias = "kind")]
  pub kind: Option<ResultKind>,
  pub title: Option<String>,
  pub display_name: Option<String>,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub name: Option<String>,
  pub email: Option<String>,
  #[serde(alias = "avatar")]
  pub avatar_url: Option<String>,
  pub member_count: Option<u64>,
}

impl RawDirectoryRecord {
  /// Normalized id, if the record carries one.
  pub fn id_string(&self) -> Option<String> {
    match &self.id {
      Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
      Some(Value::Number(n)) => Some(n.to_string()),
      _ => None,
    }
  }

  /// Best available display name.
  pub fn display_name(&self) -> String {
    let full_name = {
      let parts: Vec<&str> = [&self.first_name, &self.last_name]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
      (!parts.is_empty()).then(|| parts.join(" "))
    };

    non_blank(&self.title)
      .or_else(|| non_blank(&self.display_name))
      .or(full_name)
      .or_else(|| non_blank(&self.name))
      .or_else(|| non_blank(&self.email))
      .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
  }

  pub fn into_entry(self) -> DirectoryEntry {
    let kind = self.kind.unwrap_or(ResultKind::Person);
    let subtitle = match kind {
      ResultKind::Group => self
        .member_count
        .map(|n| format!("{} member{}", n, if n == 1 { "" } else { "s" })),
      _ => non_blank(&self.email),
    };

    DirectoryEntry {
      id: self.id_string(),
      kind,
      display_name: self.display_name(),
      subtitle,
      avatar_url: non_blank(&self.avatar_url),
    }
  }
}

fn non_blank(value: &Option<String>) -> Option<String> {
  value
    .as_deref()
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(String::from)
}

/// Normalized directory result, as cached and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
  pub id: Option<String>,
  pub kind: ResultKind,
  pub display_name: String,
  pub subtitle: Option<String>,
  pub avatar_url: Option<String>,
}

impl DirectoryEntry {
  /// Identity used to collapse duplicate search results.
  pub fn dedupe_key(&self) -> (ResultKind, String) {
    (
      self.kind,
      self
        .id
        .clone()
        .unwrap_or_else(|| self.display_name.clone()),
    )
  }

  /// Key this entry is cached under, `kind:id`. Matches [`Self::dedupe_key`].
  pub fn cache_key(&self) -> String {
    let (kind, id) = self.dedupe_key();
    Self::key_for(kind, &id)
  }

  pub fn key_for(kind: ResultKind, id: &str) -> String {
    format!("{}:{}", kind.as_str(), id)
  }
}
