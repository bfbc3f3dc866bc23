//! Record store seam and the typed guest collection built on top of it.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{Guest, GuestFields, GuestId, GuestPage},
    error::StoreError,
    protocol::{GuestRecord, RecordList, SortKey},
};
use tracing::debug;

pub const GUESTS_COLLECTION: &str = "guests";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const FULL_LIST_BATCH: u32 = 500;

/// Generic CRUD over named collections of JSON records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, collection: &str, body: Value) -> Result<Value, StoreError>;
    async fn get_one(&self, collection: &str, id: &str) -> Result<Value, StoreError>;
    async fn update(&self, collection: &str, id: &str, body: Value) -> Result<Value, StoreError>;
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        sort: &SortKey,
    ) -> Result<RecordList<Value>, StoreError>;

    /// Every record of the collection, fetched in batches through `get_list`.
    async fn get_full_list(
        &self,
        collection: &str,
        sort: &SortKey,
    ) -> Result<Vec<Value>, StoreError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.get_list(collection, page, FULL_LIST_BATCH, sort).await?;
            let fetched = batch.items.len();
            items.extend(batch.items);
            if fetched == 0 || items.len() as u64 >= batch.total_items {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

/// Placeholder used until a real store is wired in; every call fails with
/// [`StoreError::Transport`].
pub struct MissingRecordStore;

#[async_trait]
impl RecordStore for MissingRecordStore {
    async fn create(&self, collection: &str, _body: Value) -> Result<Value, StoreError> {
        Err(unavailable(collection))
    }

    async fn get_one(&self, collection: &str, _id: &str) -> Result<Value, StoreError> {
        Err(unavailable(collection))
    }

    async fn update(&self, collection: &str, _id: &str, _body: Value) -> Result<Value, StoreError> {
        Err(unavailable(collection))
    }

    async fn delete(&self, collection: &str, _id: &str) -> Result<(), StoreError> {
        Err(unavailable(collection))
    }

    async fn get_list(
        &self,
        collection: &str,
        _page: u32,
        _per_page: u32,
        _sort: &SortKey,
    ) -> Result<RecordList<Value>, StoreError> {
        Err(unavailable(collection))
    }
}

fn unavailable(collection: &str) -> StoreError {
    StoreError::Transport(format!("record store unavailable for collection {collection}"))
}

/// Typed access to the guest collection. Every call is bounded by the
/// configured request timeout.
#[derive(Clone)]
pub struct GuestCollection {
    store: Arc<dyn RecordStore>,
    name: String,
    timeout: Duration,
}

impl Default for GuestCollection {
    fn default() -> Self {
        Self::new(Arc::new(MissingRecordStore))
    }
}

impl GuestCollection {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            name: GUESTS_COLLECTION.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn create(&self, fields: &GuestFields) -> Result<Guest, StoreError> {
        let body = fields_body(fields)?;
        let raw = self.bounded(self.store.create(&self.name, body)).await?;
        decode_guest(raw)
    }

    pub async fn get(&self, id: &GuestId) -> Result<Guest, StoreError> {
        let raw = self.bounded(self.store.get_one(&self.name, id.as_str())).await?;
        decode_guest(raw)
    }

    pub async fn update(&self, id: &GuestId, fields: &GuestFields) -> Result<Guest, StoreError> {
        let body = fields_body(fields)?;
        let raw = self
            .bounded(self.store.update(&self.name, id.as_str(), body))
            .await?;
        decode_guest(raw)
    }

    pub async fn delete(&self, id: &GuestId) -> Result<(), StoreError> {
        self.bounded(self.store.delete(&self.name, id.as_str())).await
    }

    pub async fn list_page(&self, page: u32, page_size: u32) -> Result<GuestPage, StoreError> {
        let sort = SortKey::newest_first();
        let list = self
            .bounded(self.store.get_list(&self.name, page, page_size, &sort))
            .await?;
        let items = list
            .items
            .into_iter()
            .map(decode_guest)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            collection = %self.name,
            page,
            returned = items.len(),
            total_items = list.total_items,
            "guest page fetched"
        );
        Ok(GuestPage::new(items, page, page_size, list.total_items))
    }

    pub async fn all(&self) -> Result<Vec<Guest>, StoreError> {
        let sort = SortKey::newest_first();
        let raw = self
            .bounded(self.store.get_full_list(&self.name, &sort))
            .await?;
        raw.into_iter().map(decode_guest).collect()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}

fn fields_body(fields: &GuestFields) -> Result<Value, StoreError> {
    serde_json::to_value(fields).map_err(|err| StoreError::Decode(err.to_string()))
}

fn decode_guest(raw: Value) -> Result<Guest, StoreError> {
    let record: GuestRecord =
        serde_json::from_value(raw).map_err(|err| StoreError::Decode(err.to_string()))?;
    Guest::try_from(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_collection_fails_every_call_as_unreachable() {
        let guests = GuestCollection::default();
        assert_eq!(guests.name(), GUESTS_COLLECTION);

        let err = guests.list_page(1, 10).await.expect_err("no store");
        assert!(matches!(err, StoreError::Transport(_)));

        let err = guests
            .create(&GuestFields::new("Ada", "Lovelace", "ada@example.com"))
            .await
            .expect_err("no store");
        assert_eq!(
            err.user_message(),
            "Could not reach the record store; check the connection and retry."
        );
        assert!(matches!(guests.all().await, Err(StoreError::Transport(_))));
    }
}
