//! Wire shapes. Only domain fields cross the wire; local bookkeeping
//! columns (sync state, local ids, timestamps) stay local.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use ledgerly_core::records::{Item, Report};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportPayload {
    pub title: String,
    pub category: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub report_date: Option<NaiveDate>,
    pub is_archived: bool,
}

impl From<&Report> for ReportPayload {
    fn from(report: &Report) -> Self {
        Self {
            title: report.title.clone(),
            category: report.category.clone(),
            currency: report.currency.clone(),
            notes: report.notes.clone(),
            report_date: report.report_date,
            is_archived: report.is_archived,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemPayload {
    pub title: String,
    pub amount: rust_decimal::Decimal,
    pub currency: String,
    pub category: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
    pub item_date: Option<NaiveDate>,
    pub is_archived: bool,
}

impl From<&Item> for ItemPayload {
    fn from(item: &Item) -> Self {
        Self {
            title: item.title.clone(),
            amount: item.amount,
            currency: item.currency.clone(),
            category: item.category.clone(),
            extracted_data: item.extracted_data.clone(),
            item_date: item.item_date,
            is_archived: item.is_archived,
        }
    }
}

/// Response to a successful create.
#[derive(Debug, Deserialize)]
pub(crate) struct RemoteIdResponse {
    pub id: String,
}

/// Error envelope the API uses for non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: Option<String>,
}
