use crate::cache::cache::{DeltaParam, Record};
use crate::cache::error::{CacheError, Result};
use crate::server::timer::Timer;
use std::str;
use std::sync::atomic::Ordering;
use std::sync::{
    atomic::{AtomicU32, AtomicU64},
    Arc,
};

/// State shared by every shard of the store: the second-resolution
/// timer, the CAS counter and the pending flush deadline (0 = none).
pub struct SharedStoreState {
    timer: Arc<dyn Timer + Send + Sync>,
    cas_id: AtomicU64,
    flush_deadline: AtomicU32,
}

impl SharedStoreState {
    pub fn new(timer: Arc<dyn Timer + Send + Sync>) -> SharedStoreState {
        SharedStoreState {
            timer,
            cas_id: AtomicU64::new(1),
            flush_deadline: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn cas_mismatch(record: &Record, cas: u64) -> bool {
        record.header.cas != 0 && cas != record.header.cas
    }

    /// Stamps a record about to be stored: fresh CAS token and relative
    /// expiration converted to an absolute timestamp.
    pub fn stamp_record(&self, record: &mut Record) -> u64 {
        let cas = self.get_cas_id();
        record.header.cas = cas;
        if record.header.time_to_live > 0 {
            record.header.time_to_live =
                record.header.time_to_live.saturating_add(self.timestamp());
        }
        cas
    }

    pub fn timestamp(&self) -> u32 {
        self.timer.timestamp()
    }

    pub fn get_cas_id(&self) -> u64 {
        self.cas_id.fetch_add(1, Ordering::Release)
    }

    /// Schedules the keyspace wipe `delay` seconds from now, superseding
    /// any earlier pending flush.
    pub fn schedule_flush(&self, delay: u32) {
        self.flush_deadline
            .store(self.timestamp().saturating_add(delay), Ordering::Release);
    }

    pub fn clear_flush(&self) {
        self.flush_deadline.store(0, Ordering::Release);
    }

    /// True once the scheduled deadline has passed; the caller is
    /// expected to wipe the keyspace and reset the marker.
    pub fn flush_due(&self) -> bool {
        let deadline = self.flush_deadline.load(Ordering::Acquire);
        deadline != 0 && deadline <= self.timestamp()
    }

    /// Parses the record value as a decimal u64 and applies the delta.
    /// Increment wraps on overflow, decrement clamps at zero.
    pub fn incr_decr_common(
        &self,
        record: &Record,
        delta: DeltaParam,
        increment: bool,
    ) -> Result<u64> {
        let value = str::from_utf8(&record.value)
            .map_err(|_err| CacheError::ArithOnNonNumeric)?
            .parse::<u64>()
            .map_err(|_err| CacheError::ArithOnNonNumeric)?;

        if increment {
            Ok(value.wrapping_add(delta.delta))
        } else {
            Ok(value.saturating_sub(delta.delta))
        }
    }

    pub fn check_if_expired(&self, record: &Record) -> bool {
        let current_time = self.timestamp();

        if record.header.time_to_live == 0 {
            return false;
        }

        record.header.time_to_live <= current_time
    }
}
