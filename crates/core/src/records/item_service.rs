use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;

use crate::errors::{Error, Result};

use super::model::{ArchiveOutcome, Item, ItemFilter, ItemPatch, NewItem};
use super::traits::{ItemRepositoryTrait, ReportRepositoryTrait};

#[async_trait]
pub trait ItemServiceTrait: Send + Sync {
    async fn create_item(&self, new_item: NewItem) -> Result<Item>;
    fn get_item(&self, id: &str) -> Result<Item>;
    fn list_items(&self, filter: ItemFilter) -> Result<Vec<Item>>;
    async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<Item>;
    async fn update_item_local_only(&self, id: &str, patch: ItemPatch) -> Result<Item>;
    async fn archive_item(&self, id: &str) -> Result<ArchiveOutcome>;
    async fn delete_item(&self, id: &str) -> Result<()>;
}

/// Validation and logging in front of the item repository. Creation checks
/// that the parent report exists locally; it does not require the parent to
/// be synced, since the engine defers child dispatch until the parent has a
/// remote id.
pub struct ItemService {
    repository: Arc<dyn ItemRepositoryTrait>,
    report_repository: Arc<dyn ReportRepositoryTrait>,
}

impl ItemService {
    pub fn new(
        repository: Arc<dyn ItemRepositoryTrait>,
        report_repository: Arc<dyn ReportRepositoryTrait>,
    ) -> Self {
        Self {
            repository,
            report_repository,
        }
    }

    fn validate_amount(amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(Error::validation("Item amount must not be negative"));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemServiceTrait for ItemService {
    async fn create_item(&self, new_item: NewItem) -> Result<Item> {
        if new_item.title.trim().is_empty() {
            return Err(Error::validation("Item title must not be empty"));
        }
        Self::validate_amount(new_item.amount)?;
        if self
            .report_repository
            .find_by_local_id(&new_item.parent_local_id)?
            .is_none()
        {
            return Err(Error::not_found(format!(
                "Parent report '{}' does not exist",
                new_item.parent_local_id
            )));
        }

        let item = self.repository.create(new_item).await?;
        debug!(
            "Created item {} under report {}",
            item.local_id, item.parent_local_id
        );
        Ok(item)
    }

    fn get_item(&self, id: &str) -> Result<Item> {
        self.repository.resolve(id)
    }

    fn list_items(&self, filter: ItemFilter) -> Result<Vec<Item>> {
        self.repository.list(filter)
    }

    async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<Item> {
        if let Some(amount) = patch.amount {
            Self::validate_amount(amount)?;
        }
        self.repository.update(id, patch).await
    }

    async fn update_item_local_only(&self, id: &str, patch: ItemPatch) -> Result<Item> {
        self.repository.update_local_only(id, patch).await
    }

    async fn archive_item(&self, id: &str) -> Result<ArchiveOutcome> {
        self.repository.archive(id).await
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        self.repository.delete(id).await
    }
}
