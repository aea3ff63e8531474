//! Job - Dispatch Job Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, PersonSummary, TechId, opt_id_string};

/// Job lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Assigned,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Assigned => "Assigned",
            JobStatus::Accepted => "Accepted",
            JobStatus::InProgress => "In Progress",
            JobStatus::Completed => "Completed",
            JobStatus::Cancelled => "Cancelled",
        }
    }

    /// Assigned, accepted or in progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Assigned | JobStatus::Accepted | JobStatus::InProgress
        )
    }
}

/// A dispatch job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub tech_id: Option<TechId>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub admin_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub technician: Option<PersonSummary>,
    #[serde(default)]
    pub admin: Option<PersonSummary>,
}

/// Job reference embedded in technician and route records
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    #[serde(default)]
    pub id: Option<JobId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Payload for `POST /admin/assign-job`
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub address: String,
    pub tech_id: TechId,
    pub admin_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_statuses() {
        assert!(JobStatus::Assigned.is_active());
        assert!(JobStatus::InProgress.is_active());
        assert!(!JobStatus::Pending.is_active());
        assert!(!JobStatus::Completed.is_active());
    }

    #[test]
    fn test_new_job_wire_shape() {
        let job = NewJob {
            title: "Install modem".into(),
            description: "Second floor".into(),
            address: "12 Road 5".into(),
            tech_id: TechId::from("t1"),
            admin_id: "a1".into(),
        };
        let value = serde_json::to_value(&job).expect("serialize");
        assert_eq!(value["techId"], "t1");
        assert_eq!(value["adminId"], "a1");
    }

    #[test]
    fn test_parse_job_with_relations() {
        let json = r#"{
            "id": 5,
            "title": "Replace cable",
            "status": "IN_PROGRESS",
            "techId": 3,
            "adminId": 1,
            "createdAt": "2026-02-01T08:00:00Z",
            "technician": {"id": 3, "name": "Karim"}
        }"#;
        let job: Job = serde_json::from_str(json).expect("parse job");
        assert_eq!(job.id.as_str(), "5");
        assert_eq!(job.status.label(), "In Progress");
        assert_eq!(job.admin_id.as_deref(), Some("1"));
        assert_eq!(
            job.technician.and_then(|t| t.name).as_deref(),
            Some("Karim")
        );
    }
}
