//! Domain models for the two record kinds: expense reports and their items.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Synchronization state of a single record.
///
/// `Pending` means local mutations exist that the server has not confirmed.
/// `Error` means the retry ceiling was exhausted; the record stays fully
/// usable locally and is revived by the next local edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Error,
}

/// An expense report: the parent record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Locally generated, globally unique, immutable. Never reused.
    pub local_id: String,
    /// Server-assigned id, present once the remote create was acknowledged.
    pub remote_id: Option<String>,
    pub title: String,
    pub category: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub report_date: Option<NaiveDate>,
    pub is_archived: bool,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// A line item belonging to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub local_id: String,
    pub remote_id: Option<String>,
    /// References the parent report's `local_id`. An item's remote create is
    /// deferred until the parent has a `remote_id`.
    pub parent_local_id: String,
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    pub category: Option<String>,
    /// Free-form blob produced by capture/OCR. Opaque to the sync engine.
    pub extracted_data: Option<serde_json::Value>,
    pub item_date: Option<NaiveDate>,
    pub is_archived: bool,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Input for creating a report. Ids, timestamps and sync state are stamped
/// by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub title: String,
    pub category: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub report_date: Option<NaiveDate>,
}

/// Input for creating an item under an existing report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub parent_local_id: String,
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    pub category: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
    pub item_date: Option<NaiveDate>,
}

/// Partial update for a report. `None` leaves a field unchanged; for
/// nullable fields the inner `Option` distinguishes "set" from "clear".
#[derive(Debug, Clone, Default)]
pub struct ReportPatch {
    pub title: Option<String>,
    pub category: Option<Option<String>>,
    pub currency: Option<String>,
    pub notes: Option<Option<String>>,
    pub report_date: Option<Option<NaiveDate>>,
    pub is_archived: Option<bool>,
}

impl ReportPatch {
    /// Merge the patch into a report. Timestamps and sync state are the
    /// store's responsibility.
    pub fn apply_to(self, report: &mut Report) {
        if let Some(title) = self.title {
            report.title = title;
        }
        if let Some(category) = self.category {
            report.category = category;
        }
        if let Some(currency) = self.currency {
            report.currency = currency;
        }
        if let Some(notes) = self.notes {
            report.notes = notes;
        }
        if let Some(report_date) = self.report_date {
            report.report_date = report_date;
        }
        if let Some(is_archived) = self.is_archived {
            report.is_archived = is_archived;
        }
    }
}

/// Partial update for an item.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub category: Option<Option<String>>,
    pub extracted_data: Option<Option<serde_json::Value>>,
    pub item_date: Option<Option<NaiveDate>>,
    pub is_archived: Option<bool>,
}

impl ItemPatch {
    pub fn apply_to(self, item: &mut Item) {
        if let Some(title) = self.title {
            item.title = title;
        }
        if let Some(amount) = self.amount {
            item.amount = amount;
        }
        if let Some(currency) = self.currency {
            item.currency = currency;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(extracted_data) = self.extracted_data {
            item.extracted_data = extracted_data;
        }
        if let Some(item_date) = self.item_date {
            item.item_date = item_date;
        }
        if let Some(is_archived) = self.is_archived {
            item.is_archived = is_archived;
        }
    }
}

/// Listing predicate for reports. Archived records are excluded unless
/// explicitly requested.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub include_archived: bool,
    pub category: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Listing predicate for items.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub parent_local_id: Option<String>,
    pub include_archived: bool,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Outcome of `archive`: never-synced records are removed outright (nothing
/// to reconcile), synced ones are soft-deleted and the change is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The record had no `remote_id`; it was deleted locally together with
    /// its queue entries, with zero network activity.
    Removed,
    /// The record is known remotely; `is_archived` was set and an update
    /// entry was enqueued.
    Archived,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_serialization_matches_storage_contract() {
        let actual = [SyncStatus::Pending, SyncStatus::Synced, SyncStatus::Error]
            .iter()
            .map(|status| serde_json::to_string(status).expect("serialize sync status"))
            .collect::<Vec<_>>();
        assert_eq!(actual, vec!["\"pending\"", "\"synced\"", "\"error\""]);
    }

    #[test]
    fn report_patch_distinguishes_clear_from_unchanged() {
        let mut report = Report {
            local_id: "loc-1".to_string(),
            remote_id: None,
            title: "March travel".to_string(),
            category: Some("travel".to_string()),
            currency: "USD".to_string(),
            notes: Some("keep me".to_string()),
            report_date: None,
            is_archived: false,
            sync_status: SyncStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_synced_at: None,
        };

        ReportPatch {
            title: Some("March travel (final)".to_string()),
            category: Some(None),
            ..Default::default()
        }
        .apply_to(&mut report);

        assert_eq!(report.title, "March travel (final)");
        assert_eq!(report.category, None);
        assert_eq!(report.notes.as_deref(), Some("keep me"));
    }
}
