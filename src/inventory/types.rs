use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::view::{IntoViewRecord, ViewRecord};

/// Lifecycle state of a tracked asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
  #[default]
  Available,
  CheckedOut,
  Maintenance,
  Retired,
}

impl AssetStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      AssetStatus::Available => "available",
      AssetStatus::CheckedOut => "checked_out",
      AssetStatus::Maintenance => "maintenance",
      AssetStatus::Retired => "retired",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      AssetStatus::Available => "Available",
      AssetStatus::CheckedOut => "Checked out",
      AssetStatus::Maintenance => "Maintenance",
      AssetStatus::Retired => "Retired",
    }
  }

  pub fn all() -> &'static [AssetStatus] {
    &[
      AssetStatus::Available,
      AssetStatus::CheckedOut,
      AssetStatus::Maintenance,
      AssetStatus::Retired,
    ]
  }
}

/// Tracked piece of equipment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
  pub id: String,
  pub name: String,
  pub category: Option<String>,
  #[serde(default)]
  pub status: AssetStatus,
  pub location: Option<String>,
  pub description: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  pub serial_number: Option<String>,
  pub purchase_date: Option<NaiveDate>,
  pub purchase_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
  #[default]
  Pending,
  Approved,
  CheckedOut,
  Returned,
  Cancelled,
}

impl BookingStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      BookingStatus::Pending => "pending",
      BookingStatus::Approved => "approved",
      BookingStatus::CheckedOut => "checked_out",
      BookingStatus::Returned => "returned",
      BookingStatus::Cancelled => "cancelled",
    }
  }
}

/// Reservation of an asset by a person
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
  pub id: String,
  pub asset_id: String,
  pub asset_name: String,
  /// Directory id of the person who booked
  pub person_id: Option<String>,
  pub booked_by: String,
  #[serde(default)]
  pub status: BookingStatus,
  pub starts_at: DateTime<Utc>,
  pub ends_at: DateTime<Utc>,
  pub notes: Option<String>,
}

fn put(metadata: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
  if let Some(value) = value {
    metadata.insert(key.to_string(), value.into());
  }
}

impl IntoViewRecord for Asset {
  fn to_view_record(&self) -> ViewRecord {
    let mut metadata = Map::new();
    metadata.insert("entityType".to_string(), "asset".into());
    metadata.insert("groupField".to_string(), "status".into());
    metadata.insert("name".to_string(), self.name.clone().into());
    put(&mut metadata, "category", self.category.clone());
    put(&mut metadata, "location", self.location.clone());
    put(&mut metadata, "serialNumber", self.serial_number.clone());
    put(&mut metadata, "purchasePrice", self.purchase_price);

    ViewRecord {
      id: self.id.clone(),
      title: self.name.clone(),
      subtitle: self.category.clone(),
      description: self.description.clone(),
      status: Some(self.status.as_str().to_string()),
      tags: self.tags.clone(),
      group_key: Some(self.status.as_str().to_string()),
      primary_date: self
        .purchase_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc()),
      metadata,
    }
  }
}

impl IntoViewRecord for Booking {
  fn to_view_record(&self) -> ViewRecord {
    let mut metadata = Map::new();
    metadata.insert("entityType".to_string(), "booking".into());
    metadata.insert("groupField".to_string(), "status".into());
    metadata.insert("assetId".to_string(), self.asset_id.clone().into());
    metadata.insert("bookedBy".to_string(), self.booked_by.clone().into());
    metadata.insert("endsAt".to_string(), self.ends_at.to_rfc3339().into());
    put(&mut metadata, "personId", self.person_id.clone());

    ViewRecord {
      id: self.id.clone(),
      title: self.asset_name.clone(),
      subtitle: Some(self.booked_by.clone()),
      description: self.notes.clone(),
      status: Some(self.status.as_str().to_string()),
      tags: Vec::new(),
      group_key: Some(self.status.as_str().to_string()),
      primary_date: Some(self.starts_at),
      metadata,
    }
  }
}
