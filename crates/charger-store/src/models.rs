//! Charger status models

use crate::error::UnknownStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A charger row as stored by the registration service.
///
/// `status` is kept as the raw string from the store; use
/// [`ChargerRecord::declared_status`] to validate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargerRecord {
    pub id: i64,
    pub name: String,
    pub status: String,
}

impl ChargerRecord {
    /// Create a new record
    pub fn new(id: i64, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: status.into(),
        }
    }

    /// Parse the declared status of this record
    pub fn declared_status(&self) -> Result<DeclaredStatus, UnknownStatus> {
        self.status.parse()
    }
}

/// Declared lifecycle status of a charger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredStatus {
    /// Charger should have a running workload
    Active,
    /// Charger workload is broken and must be respawned
    Error,
    /// Charger workload must be removed
    Disabled,
    /// Charger is left alone
    Inactive,
}

impl DeclaredStatus {
    /// Wire value as stored in the status column
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclaredStatus::Active => "active",
            DeclaredStatus::Error => "error",
            DeclaredStatus::Disabled => "disabled",
            DeclaredStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for DeclaredStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeclaredStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(DeclaredStatus::Active),
            "error" => Ok(DeclaredStatus::Error),
            "disabled" => Ok(DeclaredStatus::Disabled),
            "inactive" => Ok(DeclaredStatus::Inactive),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}
