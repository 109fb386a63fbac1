use crate::cache::cache::{
    Cache, CacheMetaData, DeltaParam, DeltaResult, KeyType, Record, SetStatus,
};
use crate::cache::error::{CacheError, Result};
use crate::memory_store::shared_store_state::SharedStoreState;
use crate::protocol::binary::network::DELTA_NO_INITIAL_VALUE;
use crate::server::timer;

use bytes::{Bytes, BytesMut};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// A key points at exactly one slot: a live entry or a deletion hold.
/// A hold blocks add/replace until `hold_until` passes.
enum Slot {
    Entry(Record),
    Hold(u32),
}

type Storage = DashMap<KeyType, Slot>;

/// Sharded in-memory keyspace with TTL expiry, CAS versioning, deletion
/// holds and a lazily evaluated flush deadline. Per-key atomicity comes
/// from the DashMap entry API, so check-then-act sequences (CAS compare,
/// hold consultation) happen under the shard lock.
pub struct ShardedMemoryStore {
    memory: Storage,
    store_state: SharedStoreState,
}

impl ShardedMemoryStore {
    pub fn new(timer: Arc<dyn timer::Timer + Send + Sync>) -> ShardedMemoryStore {
        let parallelism = std::thread::available_parallelism().map_or(1, usize::from);
        let shards = Self::get_number_of_shards(parallelism);
        info!("Number of shards: {}", shards);
        ShardedMemoryStore {
            memory: DashMap::with_shard_amount(shards),
            store_state: SharedStoreState::new(timer),
        }
    }

    // Number of shards is the power of 2 closest to parallelism^2 / 4,
    // never less than 2.
    fn get_number_of_shards(parallelism: usize) -> usize {
        let parallelism = parallelism.clamp(2, 192);

        let optimal_number_shards = parallelism.pow(2) / 4;
        if optimal_number_shards < 2 {
            return 2;
        }

        let closest_power_of_2 = optimal_number_shards.ilog2();
        let shards_power_of_2 = 2usize.pow(closest_power_of_2);

        if shards_power_of_2 > 1 {
            shards_power_of_2
        } else {
            2
        }
    }

    /// Executes the pending flush inline when its deadline has passed.
    /// Called before every keyspace consultation.
    fn apply_pending_flush(&self) {
        if self.store_state.flush_due() {
            debug!("Pending flush deadline reached, clearing keyspace");
            self.memory.clear();
            self.store_state.clear_flush();
        }
    }

    /// True when the slot no longer blocks anything: an expired entry or
    /// an expired hold.
    fn slot_expired(&self, slot: &Slot) -> bool {
        match slot {
            Slot::Entry(record) => self.store_state.check_if_expired(record),
            Slot::Hold(hold_until) => *hold_until <= self.store_state.timestamp(),
        }
    }

    /// Clone of the live record behind the slot, None for holds and
    /// expired entries.
    fn live_record(&self, slot: &Slot) -> Option<Record> {
        match slot {
            Slot::Entry(record) if !self.store_state.check_if_expired(record) => {
                Some(record.clone())
            }
            _ => None,
        }
    }

    fn append_prepend_common(
        &self,
        key: KeyType,
        new_record: Record,
        is_append: bool,
    ) -> Result<SetStatus> {
        self.apply_pending_flush();
        let cas = new_record.header.cas;
        match self.memory.entry(key) {
            Entry::Occupied(mut entry) => {
                let prev_record = self.live_record(entry.get());
                let prev_record = match prev_record {
                    Some(record) => record,
                    None => {
                        if self.slot_expired(entry.get()) {
                            entry.remove();
                        }
                        return Err(CacheError::NotFound);
                    }
                };
                if cas != 0 && prev_record.header.cas != cas {
                    return Err(CacheError::KeyExists);
                }
                let mut new_value =
                    BytesMut::with_capacity(prev_record.value.len() + new_record.value.len());
                if is_append {
                    new_value.extend_from_slice(&prev_record.value);
                    new_value.extend_from_slice(&new_record.value);
                } else {
                    new_value.extend_from_slice(&new_record.value);
                    new_value.extend_from_slice(&prev_record.value);
                }
                // flags and expiration of the stored entry survive
                let new_cas = self.store_state.get_cas_id();
                let mut merged = Record {
                    header: prev_record.header,
                    value: new_value.freeze(),
                };
                merged.header.cas = new_cas;
                entry.insert(Slot::Entry(merged));
                Ok(SetStatus { cas: new_cas })
            }
            Entry::Vacant(_) => Err(CacheError::NotFound),
        }
    }

    fn create_counter(&self, initial: u64, expiration: u32) -> (Record, u64) {
        let mut record = Record::new(Bytes::from(initial.to_string()), 0, 0, expiration);
        let cas = self.store_state.stamp_record(&mut record);
        (record, cas)
    }
}

impl Cache for ShardedMemoryStore {
    fn get(&self, key: &KeyType) -> Result<Record> {
        self.apply_pending_flush();
        match self.memory.entry(key.clone()) {
            Entry::Occupied(entry) => {
                if self.slot_expired(entry.get()) {
                    entry.remove();
                    return Err(CacheError::NotFound);
                }
                match entry.get() {
                    Slot::Entry(record) => Ok(record.clone()),
                    Slot::Hold(_) => Err(CacheError::NotFound),
                }
            }
            Entry::Vacant(_) => Err(CacheError::NotFound),
        }
    }

    fn set(&self, key: KeyType, mut record: Record) -> Result<SetStatus> {
        self.apply_pending_flush();
        match self.memory.entry(key) {
            Entry::Occupied(mut entry) => {
                let stored_cas = self.live_record(entry.get()).map(|r| r.header.cas);
                match stored_cas {
                    Some(stored_cas) => {
                        if SharedStoreState::cas_mismatch(&record, stored_cas) {
                            return Err(CacheError::KeyExists);
                        }
                    }
                    None => {
                        // expired entry or hold: a conditional set has no
                        // version left to match against
                        if record.header.cas != 0 {
                            if self.slot_expired(entry.get()) {
                                entry.remove();
                            }
                            return Err(CacheError::NotFound);
                        }
                    }
                }
                let cas = self.store_state.stamp_record(&mut record);
                entry.insert(Slot::Entry(record));
                Ok(SetStatus { cas })
            }
            Entry::Vacant(entry) => {
                if record.header.cas != 0 {
                    return Err(CacheError::NotFound);
                }
                let cas = self.store_state.stamp_record(&mut record);
                entry.insert(Slot::Entry(record));
                Ok(SetStatus { cas })
            }
        }
    }

    fn add(&self, key: KeyType, mut record: Record) -> Result<SetStatus> {
        self.apply_pending_flush();
        match self.memory.entry(key) {
            Entry::Occupied(mut entry) => {
                // a live entry or an active hold both count as taken
                if !self.slot_expired(entry.get()) {
                    return Err(CacheError::KeyExists);
                }
                let cas = self.store_state.stamp_record(&mut record);
                entry.insert(Slot::Entry(record));
                Ok(SetStatus { cas })
            }
            Entry::Vacant(entry) => {
                let cas = self.store_state.stamp_record(&mut record);
                entry.insert(Slot::Entry(record));
                Ok(SetStatus { cas })
            }
        }
    }

    fn replace(&self, key: KeyType, mut record: Record) -> Result<SetStatus> {
        self.apply_pending_flush();
        match self.memory.entry(key) {
            Entry::Occupied(mut entry) => {
                let stored_cas = self.live_record(entry.get()).map(|r| r.header.cas);
                match stored_cas {
                    Some(stored_cas) => {
                        if SharedStoreState::cas_mismatch(&record, stored_cas) {
                            return Err(CacheError::KeyExists);
                        }
                        let cas = self.store_state.stamp_record(&mut record);
                        entry.insert(Slot::Entry(record));
                        Ok(SetStatus { cas })
                    }
                    None => {
                        if self.slot_expired(entry.get()) {
                            entry.remove();
                        }
                        Err(CacheError::NotFound)
                    }
                }
            }
            Entry::Vacant(_) => Err(CacheError::NotFound),
        }
    }

    fn append(&self, key: KeyType, new_record: Record) -> Result<SetStatus> {
        self.append_prepend_common(key, new_record, true)
    }

    fn prepend(&self, key: KeyType, new_record: Record) -> Result<SetStatus> {
        self.append_prepend_common(key, new_record, false)
    }

    fn incr_decr(
        &self,
        header: CacheMetaData,
        key: KeyType,
        delta: DeltaParam,
        increment: bool,
    ) -> Result<DeltaResult> {
        self.apply_pending_flush();
        match self.memory.entry(key) {
            Entry::Occupied(mut entry) => {
                let live = self.live_record(entry.get());
                match live {
                    Some(record) => {
                        let new_value =
                            self.store_state.incr_decr_common(&record, delta, increment)?;
                        let new_cas = self.store_state.get_cas_id();
                        let mut updated = record;
                        updated.value = Bytes::from(new_value.to_string());
                        updated.header.cas = new_cas;
                        entry.insert(Slot::Entry(updated));
                        Ok(DeltaResult {
                            cas: new_cas,
                            value: new_value,
                        })
                    }
                    None => {
                        // counters are created on a miss, a hold only
                        // gates add/replace
                        if header.get_expiration() == DELTA_NO_INITIAL_VALUE {
                            if self.slot_expired(entry.get()) {
                                entry.remove();
                            }
                            return Err(CacheError::NotFound);
                        }
                        let (record, cas) =
                            self.create_counter(delta.value, header.get_expiration());
                        entry.insert(Slot::Entry(record));
                        Ok(DeltaResult {
                            cas,
                            value: delta.value,
                        })
                    }
                }
            }
            Entry::Vacant(entry) => {
                if header.get_expiration() == DELTA_NO_INITIAL_VALUE {
                    return Err(CacheError::NotFound);
                }
                let (record, cas) = self.create_counter(delta.value, header.get_expiration());
                entry.insert(Slot::Entry(record));
                Ok(DeltaResult {
                    cas,
                    value: delta.value,
                })
            }
        }
    }

    fn delete(&self, key: KeyType, header: CacheMetaData) -> Result<Record> {
        self.apply_pending_flush();
        let hold_secs = header.time_to_live;
        match self.memory.entry(key) {
            Entry::Occupied(mut entry) => {
                let record = self.live_record(entry.get());
                match record {
                    Some(record) => {
                        if hold_secs > 0 {
                            let hold_until =
                                self.store_state.timestamp().saturating_add(hold_secs);
                            entry.insert(Slot::Hold(hold_until));
                        } else {
                            entry.remove();
                        }
                        Ok(record)
                    }
                    None => {
                        if self.slot_expired(entry.get()) {
                            entry.remove();
                        }
                        Err(CacheError::NotFound)
                    }
                }
            }
            Entry::Vacant(_) => Err(CacheError::NotFound),
        }
    }

    fn flush(&self, header: CacheMetaData) {
        if header.time_to_live > 0 {
            self.store_state.schedule_flush(header.time_to_live);
        } else {
            self.memory.clear();
            self.store_state.clear_flush();
        }
    }
}
