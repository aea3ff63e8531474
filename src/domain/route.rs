//! Route - In-Progress Trips and Recorded Points

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GeoPoint, JobId, JobSummary, PersonSummary, TechId, id_string};

/// A job's in-progress trip
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub job_id: JobId,
    pub tech_id: TechId,
    pub start_lat: f64,
    pub start_lng: f64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub job: Option<JobSummary>,
    #[serde(default)]
    pub technician: Option<PersonSummary>,
}

impl Route {
    pub fn start(&self) -> GeoPoint {
        GeoPoint::new(self.start_lat, self.start_lng)
    }

    pub fn job_title(&self) -> &str {
        self.job
            .as_ref()
            .map(|j| j.title.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or("Unknown Job")
    }

    pub fn technician_name(&self) -> Option<&str> {
        self.technician.as_ref().and_then(|t| t.name.as_deref())
    }
}

/// One recorded location along a route
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_start_point: bool,
    #[serde(default)]
    pub is_end_point: bool,
}

impl RoutePoint {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Response of `GET /routes/job/{jobId}` and the `jobRoute` push event
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRoute {
    #[serde(default)]
    pub route: Option<Route>,
    #[serde(default)]
    pub location_history: Option<Vec<RoutePoint>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_route_without_history() {
        let parsed: JobRoute = serde_json::from_str("{}").expect("parse");
        assert!(parsed.route.is_none());
        assert!(parsed.location_history.is_none());
    }

    #[test]
    fn test_route_point_markers_default_false() {
        let p: RoutePoint =
            serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5}"#).expect("parse point");
        assert!(!p.is_start_point);
        assert!(!p.is_end_point);
        assert_eq!(p.position(), GeoPoint::new(1.5, 2.5));
    }

    #[test]
    fn test_route_labels() {
        let json = r#"{
            "id": "r1", "jobId": "j1", "techId": "t1",
            "startLat": 23.7, "startLng": 90.3,
            "startedAt": "2026-03-01T09:00:00Z",
            "technician": {"name": "Karim"}
        }"#;
        let route: Route = serde_json::from_str(json).expect("parse route");
        assert_eq!(route.job_title(), "Unknown Job");
        assert_eq!(route.technician_name(), Some("Karim"));
    }
}
