//! DataState - Dashboard Cache (Technicians, Jobs, Admins)

use crate::constants::{JOBS_PAGE_SIZE, OVERVIEW_LIST_LIMIT};
use crate::domain::{
    AccountForm, Admin, Job, JobStatus, NewJob, TechId, Technician, TechnicianStatus,
};
use crate::error::Result;
use crate::services::ApiClient;

/// Headline counts for the overview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_technicians: usize,
    pub total_jobs: usize,
    /// Assigned, accepted or in progress
    pub active_jobs: usize,
    pub completed_jobs: usize,
    /// Reported status other than offline
    pub online_technicians: usize,
}

/// One page of the jobs list
#[derive(Debug, Clone, PartialEq)]
pub struct JobsPage<'a> {
    pub items: &'a [Job],
    /// 1-based, clamped to `1..=total_pages`
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// 1-based index of the first item shown, 0 when empty
    pub first_item: usize,
    pub last_item: usize,
}

/// Cached backend records
#[derive(Debug, Clone, Default)]
pub struct DataState {
    pub technicians: Vec<Technician>,
    pub jobs: Vec<Job>,
    pub admins: Vec<Admin>,
    /// Message of the most recent failed fetch
    pub last_error: Option<String>,
}

impl DataState {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Fetching ====================

    pub async fn fetch_technicians(&mut self, api: &ApiClient) -> Result<()> {
        let result = api.list_technicians().await;
        self.technicians = self.record(result)?;
        Ok(())
    }

    pub async fn fetch_jobs(&mut self, api: &ApiClient) -> Result<()> {
        let result = api.list_jobs().await;
        self.jobs = self.record(result)?;
        Ok(())
    }

    pub async fn fetch_admins(&mut self, api: &ApiClient) -> Result<()> {
        let result = api.list_admins().await;
        self.admins = self.record(result)?;
        Ok(())
    }

    /// Fetch all three lists concurrently; nothing is replaced if any fails
    pub async fn fetch_all(&mut self, api: &ApiClient) -> Result<()> {
        let result = tokio::try_join!(api.list_technicians(), api.list_jobs(), api.list_admins());

        let (technicians, jobs, admins) = self.record(result)?;
        tracing::debug!(
            technicians = technicians.len(),
            jobs = jobs.len(),
            admins = admins.len(),
            "dashboard data loaded"
        );
        self.technicians = technicians;
        self.jobs = jobs;
        self.admins = admins;
        Ok(())
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Ok(value)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    // ==================== Mutations ====================

    /// Create a technician and append it
    pub async fn create_technician(&mut self, api: &ApiClient, form: &AccountForm) -> Result<Technician> {
        let tech = api.create_technician(form).await?;
        self.technicians.push(tech.clone());
        Ok(tech)
    }

    /// Create an admin and append it
    pub async fn create_admin(&mut self, api: &ApiClient, form: &AccountForm) -> Result<Admin> {
        let admin = api.create_admin(form).await?;
        self.admins.push(admin.clone());
        Ok(admin)
    }

    /// Assign a job; the new job goes to the front of the list
    pub async fn assign_job(&mut self, api: &ApiClient, job: &NewJob) -> Result<Job> {
        let job = api.assign_job(job).await?;
        self.jobs.insert(0, job.clone());
        Ok(job)
    }

    pub async fn update_technician(
        &mut self,
        api: &ApiClient,
        id: &TechId,
        form: &AccountForm,
    ) -> Result<Technician> {
        let tech = api.update_technician(id, form).await?;
        if let Some(slot) = self.technicians.iter_mut().find(|t| &t.id == id) {
            *slot = tech.clone();
        }
        Ok(tech)
    }

    pub async fn delete_technician(&mut self, api: &ApiClient, id: &TechId) -> Result<()> {
        api.delete_technician(id).await?;
        self.technicians.retain(|t| &t.id != id);
        Ok(())
    }

    pub async fn update_admin(&mut self, api: &ApiClient, id: &str, form: &AccountForm) -> Result<Admin> {
        let admin = api.update_admin(id, form).await?;
        if let Some(slot) = self.admins.iter_mut().find(|a| a.id == id) {
            *slot = admin.clone();
        }
        Ok(admin)
    }

    pub async fn delete_admin(&mut self, api: &ApiClient, id: &str) -> Result<()> {
        api.delete_admin(id).await?;
        self.admins.retain(|a| a.id != id);
        Ok(())
    }

    // ==================== Derived ====================

    pub fn stats(&self) -> DashboardStats {
        DashboardStats {
            total_technicians: self.technicians.len(),
            total_jobs: self.jobs.len(),
            active_jobs: self.jobs.iter().filter(|j| j.status.is_active()).count(),
            completed_jobs: self
                .jobs
                .iter()
                .filter(|j| j.status == JobStatus::Completed)
                .count(),
            online_technicians: self.technicians.iter().filter(|t| reported_online(t)).count(),
        }
    }

    /// Newest jobs for the overview
    pub fn recent_jobs(&self) -> &[Job] {
        &self.jobs[..self.jobs.len().min(OVERVIEW_LIST_LIMIT)]
    }

    /// First technicians not reported offline
    pub fn active_technicians(&self) -> Vec<&Technician> {
        self.technicians
            .iter()
            .filter(|t| reported_online(t))
            .take(OVERVIEW_LIST_LIMIT)
            .collect()
    }

    pub fn jobs_page(&self, page: usize) -> JobsPage<'_> {
        paginate(&self.jobs, page, JOBS_PAGE_SIZE)
    }
}

fn reported_online(tech: &Technician) -> bool {
    tech.status != Some(TechnicianStatus::Offline)
}

fn paginate(jobs: &[Job], page: usize, page_size: usize) -> JobsPage<'_> {
    let total_items = jobs.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = ((page - 1) * page_size).min(total_items);
    let end = (start + page_size).min(total_items);

    JobsPage {
        items: &jobs[start..end],
        page,
        total_pages,
        total_items,
        first_item: if start < end { start + 1 } else { 0 },
        last_item: end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobId;

    fn job(id: usize, status: JobStatus) -> Job {
        Job {
            id: JobId::new(id.to_string()),
            title: format!("Job {id}"),
            description: None,
            address: None,
            status,
            tech_id: None,
            admin_id: None,
            created_at: None,
            updated_at: None,
            technician: None,
            admin: None,
        }
    }

    fn tech(id: &str, status: Option<TechnicianStatus>) -> Technician {
        Technician {
            id: TechId::from(id),
            name: Some(id.to_uppercase()),
            email: None,
            status,
            is_tracking: false,
            last_lat: None,
            last_lng: None,
            last_ping: None,
            jobs: Vec::new(),
        }
    }

    #[test]
    fn test_stats() {
        let state = DataState {
            technicians: vec![
                tech("a", Some(TechnicianStatus::Online)),
                tech("b", Some(TechnicianStatus::Offline)),
                tech("c", None),
                tech("d", Some(TechnicianStatus::OnSite)),
            ],
            jobs: vec![
                job(1, JobStatus::Pending),
                job(2, JobStatus::Assigned),
                job(3, JobStatus::Accepted),
                job(4, JobStatus::InProgress),
                job(5, JobStatus::Completed),
                job(6, JobStatus::Cancelled),
            ],
            ..DataState::default()
        };

        assert_eq!(
            state.stats(),
            DashboardStats {
                total_technicians: 4,
                total_jobs: 6,
                active_jobs: 3,
                completed_jobs: 1,
                online_technicians: 3,
            }
        );
        assert_eq!(state.recent_jobs().len(), 5);
        let active: Vec<_> = state.active_technicians().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(active, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_pagination_clamps() {
        let jobs: Vec<Job> = (1..=23).map(|i| job(i, JobStatus::Pending)).collect();

        let first = paginate(&jobs, 0, 10);
        assert_eq!(first.page, 1);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 10);
        assert_eq!((first.first_item, first.last_item), (1, 10));

        let last = paginate(&jobs, 99, 10);
        assert_eq!(last.page, 3);
        assert_eq!(last.items.len(), 3);
        assert_eq!((last.first_item, last.last_item), (21, 23));
    }

    #[test]
    fn test_pagination_empty() {
        let page = paginate(&[], 4, 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
        assert_eq!(page.first_item, 0);
    }

    #[test]
    fn test_record_keeps_last_error() {
        let mut state = DataState::new();
        let failed: Result<()> = Err(crate::error::Error::Api {
            status: 500,
            message: "Failed to fetch jobs".into(),
        });
        assert!(state.record(failed).is_err());
        assert_eq!(state.last_error.as_deref(), Some("Failed to fetch jobs (HTTP 500)"));
        state.record(Ok(())).expect("ok");
        assert!(state.last_error.is_none());
    }
}
