use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::errors::{Error, Result};

use super::model::{ArchiveOutcome, NewReport, Report, ReportFilter, ReportPatch};
use super::traits::ReportRepositoryTrait;

#[async_trait]
pub trait ReportServiceTrait: Send + Sync {
    async fn create_report(&self, new_report: NewReport) -> Result<Report>;
    fn get_report(&self, id: &str) -> Result<Report>;
    fn list_reports(&self, filter: ReportFilter) -> Result<Vec<Report>>;
    async fn update_report(&self, id: &str, patch: ReportPatch) -> Result<Report>;
    async fn update_report_local_only(&self, id: &str, patch: ReportPatch) -> Result<Report>;
    async fn archive_report(&self, id: &str) -> Result<ArchiveOutcome>;
    async fn delete_report(&self, id: &str) -> Result<()>;
}

/// Validation and logging in front of the report repository.
pub struct ReportService {
    repository: Arc<dyn ReportRepositoryTrait>,
}

impl ReportService {
    pub fn new(repository: Arc<dyn ReportRepositoryTrait>) -> Self {
        Self { repository }
    }

    fn validate_new(new_report: &NewReport) -> Result<()> {
        if new_report.title.trim().is_empty() {
            return Err(Error::validation("Report title must not be empty"));
        }
        if new_report.currency.trim().is_empty() {
            return Err(Error::validation("Report currency must not be empty"));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportServiceTrait for ReportService {
    async fn create_report(&self, new_report: NewReport) -> Result<Report> {
        Self::validate_new(&new_report)?;
        let report = self.repository.create(new_report).await?;
        debug!("Created report {}", report.local_id);
        Ok(report)
    }

    fn get_report(&self, id: &str) -> Result<Report> {
        self.repository.resolve(id)
    }

    fn list_reports(&self, filter: ReportFilter) -> Result<Vec<Report>> {
        self.repository.list(filter)
    }

    async fn update_report(&self, id: &str, patch: ReportPatch) -> Result<Report> {
        if let Some(title) = patch.title.as_deref() {
            if title.trim().is_empty() {
                return Err(Error::validation("Report title must not be empty"));
            }
        }
        self.repository.update(id, patch).await
    }

    async fn update_report_local_only(&self, id: &str, patch: ReportPatch) -> Result<Report> {
        self.repository.update_local_only(id, patch).await
    }

    async fn archive_report(&self, id: &str) -> Result<ArchiveOutcome> {
        let outcome = self.repository.archive(id).await?;
        debug!("Archived report {} ({:?})", id, outcome);
        Ok(outcome)
    }

    async fn delete_report(&self, id: &str) -> Result<()> {
        self.repository.delete(id).await
    }
}
