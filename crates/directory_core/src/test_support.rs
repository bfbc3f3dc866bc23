use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{json, Value};
use shared::{
    domain::{Guest, GuestFields},
    error::StoreError,
    protocol::{RecordList, SortKey},
};
use tokio::sync::oneshot;

use crate::store::{GuestCollection, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Create,
    GetOne,
    Update,
    Delete,
    GetList,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CallCounts {
    pub create: usize,
    pub get_one: usize,
    pub update: usize,
    pub delete: usize,
    pub get_list: usize,
}

impl CallCounts {
    pub(crate) fn mutations(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Default)]
struct MemoryInner {
    records: Vec<Value>,
    next_id: u64,
    calls: CallCounts,
    fail_next: HashMap<Op, StoreError>,
    stalled: HashSet<Op>,
    held_pages: HashMap<u32, oneshot::Receiver<()>>,
}

/// In-memory record store with call counting, failure injection and
/// per-page response gates.
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store pre-filled with `count` guests; the last inserted is the newest.
    pub(crate) fn seeded(count: usize) -> Arc<Self> {
        let store = Self::new();
        for i in 1..=count {
            store.insert(&sample_fields(i));
        }
        store
    }

    pub(crate) fn insert(&self, fields: &GuestFields) -> Value {
        let mut inner = self.inner.lock().expect("store lock");
        inner.next_id += 1;
        let mut record = serde_json::to_value(fields).expect("fields json");
        record["id"] = json!(format!("rec{:03}", inner.next_id));
        record["created"] = json!(store_timestamp(inner.next_id));
        record["updated"] = json!("");
        inner.records.push(record.clone());
        record
    }

    pub(crate) fn calls(&self) -> CallCounts {
        self.inner.lock().expect("store lock").calls
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().expect("store lock").records.len()
    }

    pub(crate) fn fail_next(&self, op: Op, err: StoreError) {
        self.inner
            .lock()
            .expect("store lock")
            .fail_next
            .insert(op, err);
    }

    /// Calls of `op` never resolve.
    pub(crate) fn stall(&self, op: Op) {
        self.inner.lock().expect("store lock").stalled.insert(op);
    }

    /// The next `get_list` for `page` waits until the returned sender fires.
    pub(crate) fn hold_page(&self, page: u32) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .lock()
            .expect("store lock")
            .held_pages
            .insert(page, rx);
        tx
    }

    pub(crate) fn remove_externally(&self, id: &str) {
        self.inner
            .lock()
            .expect("store lock")
            .records
            .retain(|record| record["id"] != id);
    }

    fn enter(&self, op: Op) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        match op {
            Op::Create => inner.calls.create += 1,
            Op::GetOne => inner.calls.get_one += 1,
            Op::Update => inner.calls.update += 1,
            Op::Delete => inner.calls.delete += 1,
            Op::GetList => inner.calls.get_list += 1,
        }
        if let Some(err) = inner.fail_next.remove(&op) {
            return Err(err);
        }
        Ok(inner.stalled.contains(&op))
    }

    async fn gate(&self, op: Op) -> Result<(), StoreError> {
        if self.enter(op)? {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn position(inner: &MemoryInner, id: &str) -> Option<usize> {
        inner.records.iter().position(|record| record["id"] == id)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, _collection: &str, body: Value) -> Result<Value, StoreError> {
        self.gate(Op::Create).await?;
        let fields: GuestFields = serde_json::from_value(body).expect("guest fields body");
        Ok(self.insert(&fields))
    }

    async fn get_one(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.gate(Op::GetOne).await?;
        let inner = self.inner.lock().expect("store lock");
        Self::position(&inner, id)
            .map(|idx| inner.records[idx].clone())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn update(&self, collection: &str, id: &str, body: Value) -> Result<Value, StoreError> {
        self.gate(Op::Update).await?;
        let mut inner = self.inner.lock().expect("store lock");
        let idx = Self::position(&inner, id).ok_or_else(|| StoreError::not_found(collection, id))?;
        let record = &mut inner.records[idx];
        if let (Some(target), Value::Object(patch)) = (record.as_object_mut(), body) {
            target.extend(patch);
        }
        record["updated"] = json!(store_timestamp(1_000));
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.gate(Op::Delete).await?;
        let mut inner = self.inner.lock().expect("store lock");
        let idx = Self::position(&inner, id).ok_or_else(|| StoreError::not_found(collection, id))?;
        inner.records.remove(idx);
        Ok(())
    }

    async fn get_list(
        &self,
        _collection: &str,
        page: u32,
        per_page: u32,
        sort: &SortKey,
    ) -> Result<RecordList<Value>, StoreError> {
        let held = {
            let mut inner = self.inner.lock().expect("store lock");
            inner.held_pages.remove(&page)
        };
        self.gate(Op::GetList).await?;
        if let Some(release) = held {
            let _ = release.await;
        }

        let inner = self.inner.lock().expect("store lock");
        let mut records = inner.records.clone();
        let key = sort.field.clone();
        records.sort_by(|a, b| a[&key].as_str().cmp(&b[&key].as_str()));
        if sort.descending {
            records.reverse();
        }
        let total_items = records.len() as u64;
        let skip = (page.saturating_sub(1) * per_page) as usize;
        let items = records
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .collect();
        Ok(RecordList { items, total_items })
    }
}

pub(crate) fn sample_fields(i: usize) -> GuestFields {
    GuestFields::new(
        format!("Guest{i}"),
        format!("Family{i}"),
        format!("guest{i}@example.com"),
    )
}

pub(crate) fn collection(store: &Arc<MemoryStore>) -> GuestCollection {
    GuestCollection::new(store.clone() as Arc<dyn RecordStore>)
        .with_timeout(Duration::from_millis(200))
}

pub(crate) fn guest_from(record: Value) -> Guest {
    let record: shared::protocol::GuestRecord = serde_json::from_value(record).expect("record");
    Guest::try_from(record).expect("guest")
}

/// Polls `check` until it holds, yielding to other tasks in between.
pub(crate) async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

fn store_timestamp(offset_secs: u64) -> String {
    let base: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().expect("base timestamp");
    let at = base + TimeDelta::seconds(offset_secs as i64);
    at.format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}
