use crate::cache::cache::{
    Cache, CacheMetaData as CacheMeta, DeltaParam, DeltaResult as CacheDeltaResult,
    DeltaResultValueType as CacheDeltaResultValueType, KeyType as CacheKeyType,
    Record as CacheRecord, SetStatus as CacheSetStatus,
};
use crate::cache::error::Result;
use std::sync::Arc;

pub type Record = CacheRecord;
pub type Meta = CacheMeta;
pub type SetStatus = CacheSetStatus;
pub type KeyType = CacheKeyType;
pub type IncrementParam = DeltaParam;
pub type DecrementParam = DeltaParam;
pub type DeltaResult = CacheDeltaResult;
pub type DeltaResultValueType = CacheDeltaResultValueType;

/**
 * Implements the binary protocol commands based
 * on a key value store
 */
pub struct MemcStore {
    store: Arc<dyn Cache + Send + Sync>,
}

impl MemcStore {
    pub fn new(store: Arc<dyn Cache + Send + Sync>) -> MemcStore {
        MemcStore { store }
    }

    pub fn set(&self, key: KeyType, record: Record) -> Result<SetStatus> {
        self.store.set(key, record)
    }

    pub fn get(&self, key: &KeyType) -> Result<Record> {
        self.store.get(key)
    }

    pub fn add(&self, key: KeyType, record: Record) -> Result<SetStatus> {
        self.store.add(key, record)
    }

    pub fn replace(&self, key: KeyType, record: Record) -> Result<SetStatus> {
        self.store.replace(key, record)
    }

    pub fn append(&self, key: KeyType, new_record: Record) -> Result<SetStatus> {
        self.store.append(key, new_record)
    }

    pub fn prepend(&self, key: KeyType, new_record: Record) -> Result<SetStatus> {
        self.store.prepend(key, new_record)
    }

    pub fn increment(
        &self,
        header: Meta,
        key: KeyType,
        increment: IncrementParam,
    ) -> Result<DeltaResult> {
        self.add_delta(header, key, increment, true)
    }

    pub fn decrement(
        &self,
        header: Meta,
        key: KeyType,
        decrement: DecrementParam,
    ) -> Result<DeltaResult> {
        self.add_delta(header, key, decrement, false)
    }

    fn add_delta(
        &self,
        header: Meta,
        key: KeyType,
        delta: DeltaParam,
        increment: bool,
    ) -> Result<DeltaResult> {
        self.store.incr_decr(header, key, delta, increment)
    }

    pub fn delete(&self, key: KeyType, header: Meta) -> Result<Record> {
        self.store.delete(key, header)
    }

    pub fn flush(&self, header: Meta) {
        self.store.flush(header)
    }
}

#[cfg(test)]
mod add_tests;
#[cfg(test)]
mod delete_tests;
#[cfg(test)]
mod flush_tests;
#[cfg(test)]
mod replace_tests;
