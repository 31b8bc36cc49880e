use std::str::FromStr;

use diesel::prelude::*;
use rust_decimal::Decimal;

use ledgerly_core::errors::Result;
use ledgerly_core::records::Item;

use crate::mapping;
use crate::schema::items;

/// Row shape of the `items` table.
#[derive(Debug, Clone, Queryable, Identifiable, Insertable, AsChangeset, Selectable)]
#[diesel(table_name = items)]
#[diesel(primary_key(local_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ItemDB {
    pub local_id: String,
    pub remote_id: Option<String>,
    pub parent_local_id: String,
    pub title: String,
    pub amount: String,
    pub currency: String,
    pub category: Option<String>,
    pub extracted_data: Option<String>,
    pub item_date: Option<String>,
    pub is_archived: bool,
    pub sync_status: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: Option<String>,
}

impl From<&Item> for ItemDB {
    fn from(item: &Item) -> Self {
        Self {
            local_id: item.local_id.clone(),
            remote_id: item.remote_id.clone(),
            parent_local_id: item.parent_local_id.clone(),
            title: item.title.clone(),
            amount: item.amount.to_string(),
            currency: item.currency.clone(),
            category: item.category.clone(),
            extracted_data: item.extracted_data.as_ref().map(|v| v.to_string()),
            item_date: mapping::format_opt_date(item.item_date),
            is_archived: item.is_archived,
            sync_status: mapping::status_to_str(item.sync_status).to_string(),
            created_at: item.created_at.to_rfc3339(),
            updated_at: item.updated_at.to_rfc3339(),
            last_synced_at: item.last_synced_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl TryFrom<ItemDB> for Item {
    type Error = ledgerly_core::Error;

    fn try_from(row: ItemDB) -> Result<Self> {
        let amount =
            Decimal::from_str(&row.amount).map_err(|_| mapping::corrupt_row("amount", &row.amount))?;
        let extracted_data = row
            .extracted_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Self {
            amount,
            extracted_data,
            item_date: mapping::parse_opt_date("item_date", row.item_date.as_deref())?,
            sync_status: mapping::status_from_str(&row.sync_status)?,
            created_at: mapping::parse_datetime("created_at", &row.created_at)?,
            updated_at: mapping::parse_datetime("updated_at", &row.updated_at)?,
            last_synced_at: mapping::parse_opt_datetime(
                "last_synced_at",
                row.last_synced_at.as_deref(),
            )?,
            is_archived: row.is_archived,
            local_id: row.local_id,
            remote_id: row.remote_id,
            parent_local_id: row.parent_local_id,
            title: row.title,
            currency: row.currency,
            category: row.category,
        })
    }
}
