use super::error::Result;
use bytes::Bytes;

/// Cache key type
pub type KeyType = Bytes;

/// Cache value associated with a key
pub type ValueType = Bytes;

#[derive(Clone)]
pub struct DeltaParam {
    pub(crate) delta: u64,
    pub(crate) value: u64,
}

pub type IncrementParam = DeltaParam;
pub type DecrementParam = IncrementParam;

pub type DeltaResultValueType = u64;
#[derive(Debug)]
pub struct DeltaResult {
    pub cas: u64,
    pub value: DeltaResultValueType,
}

/// Meta data stored with a cache value.
///
/// `time_to_live` is relative seconds on the way in and an absolute
/// server timestamp once stored (0 means the entry never expires).
/// For delete it carries the hold duration, for flush the delay.
#[derive(Clone, Debug)]
pub struct CacheMetaData {
    pub(crate) cas: u64,
    pub(crate) flags: u32,
    pub(crate) time_to_live: u32,
}

impl CacheMetaData {
    pub fn new(cas: u64, flags: u32, time_to_live: u32) -> CacheMetaData {
        CacheMetaData {
            cas,
            flags,
            time_to_live,
        }
    }

    pub fn get_expiration(&self) -> u32 {
        self.time_to_live
    }
}

/// Value and meta data stored in cache
#[derive(Clone, Debug)]
pub struct Record {
    pub(crate) header: CacheMetaData,
    pub(crate) value: ValueType,
}

impl Record {
    pub fn new(value: ValueType, cas: u64, flags: u32, expiration: u32) -> Record {
        let header = CacheMetaData::new(cas, flags, expiration);
        Record { header, value }
    }

    pub fn len(&self) -> usize {
        std::mem::size_of::<CacheMetaData>() + self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// Result of a mutating operation, cas is the version now stored.
#[derive(Debug)]
pub struct SetStatus {
    pub cas: u64,
}

/// An abstraction over the key <=> value store carrying the memcache
/// binary protocol semantics: CAS versioning, deletion holds and a
/// delayed flush deadline.
pub trait Cache {
    /// Returns the live record associated with a key.
    ///
    /// An entry whose expiration has passed is treated as absent and
    /// removed as a side effect. A key under an active hold is absent.
    fn get(&self, key: &KeyType) -> Result<Record>;

    /// Stores a record under a key.
    ///
    /// - record.cas == 0: unconditional write, clears any hold
    /// - record.cas != 0: requires a live entry whose CAS matches;
    ///   mismatch fails KeyExists, no live entry fails NotFound
    fn set(&self, key: KeyType, record: Record) -> Result<SetStatus>;

    /// Inserts only if neither a live entry nor an active hold exists,
    /// otherwise fails with KeyExists.
    fn add(&self, key: KeyType, record: Record) -> Result<SetStatus>;

    /// Overwrites only if a live entry exists. An active hold counts as
    /// "recently deleted" and fails NotFound. A non-zero CAS must match.
    fn replace(&self, key: KeyType, record: Record) -> Result<SetStatus>;

    /// Appends the new value after the existing one. Requires a live
    /// entry (NotFound otherwise); a non-zero CAS must match (KeyExists).
    /// Original flags and expiration are preserved.
    fn append(&self, key: KeyType, new_record: Record) -> Result<SetStatus>;

    /// Same as append, data goes in front of the existing value.
    fn prepend(&self, key: KeyType, new_record: Record) -> Result<SetStatus>;

    /// Arithmetic on the stored decimal text value.
    ///
    /// Increment wraps on u64 overflow, decrement clamps at 0. A value
    /// that does not parse as u64 fails ArithOnNonNumeric. On a miss the
    /// entry is created with `delta.value`, unless header expiration is
    /// the "do not create" sentinel in which case NotFound is returned.
    fn incr_decr(
        &self,
        header: CacheMetaData,
        key: KeyType,
        delta: DeltaParam,
        increment: bool,
    ) -> Result<DeltaResult>;

    /// Removes the live entry for a key (NotFound when there is none).
    /// header.time_to_live > 0 installs a hold for that many seconds;
    /// while active it blocks add and replace on the key.
    fn delete(&self, key: KeyType, header: CacheMetaData) -> Result<Record>;

    /// Clears the keyspace.
    ///
    /// - header.time_to_live == 0: entries and holds go away immediately
    /// - header.time_to_live > 0: schedules the wipe at now+ttl,
    ///   superseding any earlier pending flush
    fn flush(&self, header: CacheMetaData);
}
