//! Technician - Field Technician Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GeoPoint, JobSummary, TechId};
use crate::constants::ONLINE_FRESHNESS_MS;

/// Reported technician status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TechnicianStatus {
    Online,
    Offline,
    OnWay,
    OnSite,
}

impl TechnicianStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TechnicianStatus::Online => "Online",
            TechnicianStatus::Offline => "Offline",
            TechnicianStatus::OnWay => "On Way",
            TechnicianStatus::OnSite => "On Site",
        }
    }

    /// Wire name, e.g. `ON_WAY`
    pub fn code(&self) -> &'static str {
        match self {
            TechnicianStatus::Online => "ONLINE",
            TechnicianStatus::Offline => "OFFLINE",
            TechnicianStatus::OnWay => "ON_WAY",
            TechnicianStatus::OnSite => "ON_SITE",
        }
    }
}

impl std::fmt::Display for TechnicianStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A technician as known to the console
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: TechId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<TechnicianStatus>,
    #[serde(default)]
    pub is_tracking: bool,
    #[serde(default)]
    pub last_lat: Option<f64>,
    #[serde(default)]
    pub last_lng: Option<f64>,
    #[serde(default)]
    pub last_ping: Option<DateTime<Utc>>,
    /// Jobs attached by the backend; the first one is the active job
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

impl Technician {
    /// Minimal record created from an incremental event for an unknown id
    pub fn minimal(id: TechId, name: Option<String>, position: GeoPoint) -> Self {
        Self {
            id,
            name,
            email: None,
            status: None,
            is_tracking: false,
            last_lat: Some(position.lat),
            last_lng: Some(position.lng),
            last_ping: None,
            jobs: Vec::new(),
        }
    }

    /// Last known position, if both coordinates are present
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.last_lat, self.last_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }

    /// Tracking enabled and pinged within the freshness window
    pub fn is_effectively_online(&self, now: DateTime<Utc>) -> bool {
        let Some(last_ping) = self.last_ping else {
            return false;
        };
        self.is_tracking && (now - last_ping).num_milliseconds() < ONLINE_FRESHNESS_MS
    }

    /// Status shown to the operator: stale technicians read as offline
    pub fn display_status(&self, now: DateTime<Utc>) -> TechnicianStatus {
        if !self.is_effectively_online(now) {
            return TechnicianStatus::Offline;
        }
        self.status.unwrap_or(TechnicianStatus::Online)
    }

    pub fn active_job(&self) -> Option<&JobSummary> {
        self.jobs.first()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("?")
    }

    /// Case-insensitive match on name or email
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        let hit = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(&query))
        };
        hit(&self.name) || hit(&self.email)
    }
}
