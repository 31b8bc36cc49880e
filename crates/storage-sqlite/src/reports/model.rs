use diesel::prelude::*;

use ledgerly_core::errors::Result;
use ledgerly_core::records::Report;

use crate::mapping;
use crate::schema::reports;

/// Row shape of the `reports` table.
#[derive(Debug, Clone, Queryable, Identifiable, Insertable, AsChangeset, Selectable)]
#[diesel(table_name = reports)]
#[diesel(primary_key(local_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReportDB {
    pub local_id: String,
    pub remote_id: Option<String>,
    pub title: String,
    pub category: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub report_date: Option<String>,
    pub is_archived: bool,
    pub sync_status: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: Option<String>,
}

impl From<&Report> for ReportDB {
    fn from(report: &Report) -> Self {
        Self {
            local_id: report.local_id.clone(),
            remote_id: report.remote_id.clone(),
            title: report.title.clone(),
            category: report.category.clone(),
            currency: report.currency.clone(),
            notes: report.notes.clone(),
            report_date: mapping::format_opt_date(report.report_date),
            is_archived: report.is_archived,
            sync_status: mapping::status_to_str(report.sync_status).to_string(),
            created_at: report.created_at.to_rfc3339(),
            updated_at: report.updated_at.to_rfc3339(),
            last_synced_at: report.last_synced_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl TryFrom<ReportDB> for Report {
    type Error = ledgerly_core::Error;

    fn try_from(row: ReportDB) -> Result<Self> {
        Ok(Self {
            report_date: mapping::parse_opt_date("report_date", row.report_date.as_deref())?,
            sync_status: mapping::status_from_str(&row.sync_status)?,
            created_at: mapping::parse_datetime("created_at", &row.created_at)?,
            updated_at: mapping::parse_datetime("updated_at", &row.updated_at)?,
            last_synced_at: mapping::parse_opt_datetime(
                "last_synced_at",
                row.last_synced_at.as_deref(),
            )?,
            local_id: row.local_id,
            remote_id: row.remote_id,
            title: row.title,
            category: row.category,
            currency: row.currency,
            notes: row.notes,
            is_archived: row.is_archived,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use ledgerly_core::records::SyncStatus;

    #[test]
    fn report_survives_the_row_round_trip() {
        let report = Report {
            local_id: "loc-1".to_string(),
            remote_id: Some("R-77".to_string()),
            title: "Client visit".to_string(),
            category: None,
            currency: "EUR".to_string(),
            notes: Some("two days".to_string()),
            report_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            is_archived: false,
            sync_status: SyncStatus::Synced,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_synced_at: Some(Utc::now()),
        };

        let row = ReportDB::from(&report);
        assert_eq!(row.report_date.as_deref(), Some("2025-03-14"));
        assert_eq!(row.sync_status, "synced");

        let back = Report::try_from(row).unwrap();
        assert_eq!(back.local_id, report.local_id);
        assert_eq!(back.report_date, report.report_date);
        assert_eq!(back.sync_status, SyncStatus::Synced);
    }
}
