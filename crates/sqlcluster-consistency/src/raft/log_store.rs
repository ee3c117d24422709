// RocksDB-backed raft log
// Entries are keyed by big-endian index so iteration order is log order

use std::fmt::Debug;
use std::ops::{Bound, RangeBounds};
use std::path::Path;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use openraft::storage::{LogFlushed, LogState, RaftLogStorage};
use openraft::{Entry, ErrorSubject, ErrorVerb, OptionalSend, RaftLogReader, StorageError};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::{LogId, NodeId, TypeConfig, Vote};

const CF_LOGS: &str = "logs";
const CF_STATE: &str = "state";

const KEY_VOTE: &[u8] = b"vote";
const KEY_LAST_PURGED: &[u8] = b"last_purged";

const INDEX_LEN: usize = 8;

fn storage_error(
    subject: ErrorSubject<NodeId>,
    verb: ErrorVerb,
    e: impl std::fmt::Display,
) -> StorageError<NodeId> {
    StorageError::from_io_error(subject, verb, std::io::Error::other(e.to_string()))
}

fn logs_error(e: impl std::fmt::Display, verb: ErrorVerb) -> StorageError<NodeId> {
    storage_error(ErrorSubject::Logs, verb, e)
}

fn vote_error(e: impl std::fmt::Display, verb: ErrorVerb) -> StorageError<NodeId> {
    storage_error(ErrorSubject::Vote, verb, e)
}

/// Values mirrored in memory so log state queries never touch disk.
#[derive(Debug, Default, Clone, Copy)]
struct LogMeta {
    last_log_id: Option<LogId>,
    last_purged: Option<LogId>,
    vote: Option<Vote>,
}

/// Durable raft log and vote.
///
/// Clones share the database and the in-memory metadata, so a reader handed to
/// replication always sees what the writer last stored.
#[derive(Clone)]
pub struct RocksLogStore {
    db: Arc<DB>,
    meta: Arc<RwLock<LogMeta>>,
}

impl RocksLogStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError<NodeId>> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_LOGS, Options::default()),
            ColumnFamilyDescriptor::new(CF_STATE, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cfs)
            .map_err(|e| logs_error(e, ErrorVerb::Read))?;

        let store = Self {
            db: Arc::new(db),
            meta: Arc::new(RwLock::new(LogMeta::default())),
        };

        let meta = LogMeta {
            last_log_id: store.scan_last_log_id()?,
            last_purged: store.read_state::<LogId>(KEY_LAST_PURGED, ErrorSubject::Logs)?,
            vote: store.read_state::<Vote>(KEY_VOTE, ErrorSubject::Vote)?,
        };
        *store.meta.write().await = meta;

        info!(
            "Raft log opened at {} (last log id: {:?})",
            path.as_ref().display(),
            meta.last_log_id
        );
        Ok(store)
    }

    /// Last stored log id, `None` when nothing was ever appended.
    pub async fn last_log_id(&self) -> Option<LogId> {
        self.meta.read().await.last_log_id
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError<NodeId>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| logs_error(format!("column family {} missing", name), ErrorVerb::Read))
    }

    fn index_key(index: u64) -> [u8; INDEX_LEN] {
        let mut buf = [0u8; INDEX_LEN];
        BigEndian::write_u64(&mut buf, index);
        buf
    }

    fn key_index(key: &[u8]) -> Option<u64> {
        (key.len() == INDEX_LEN).then(|| BigEndian::read_u64(key))
    }

    fn decode_entry(bytes: &[u8]) -> Result<Entry<TypeConfig>, StorageError<NodeId>> {
        serde_json::from_slice(bytes).map_err(|e| logs_error(e, ErrorVerb::Read))
    }

    fn read_state<T: serde::de::DeserializeOwned>(
        &self,
        key: &[u8],
        subject: ErrorSubject<NodeId>,
    ) -> Result<Option<T>, StorageError<NodeId>> {
        let cf = self.cf(CF_STATE)?;
        match self.db.get_cf(cf, key) {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| storage_error(subject, ErrorVerb::Read, e)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_error(subject, ErrorVerb::Read, e)),
        }
    }

    fn scan_last_log_id(&self) -> Result<Option<LogId>, StorageError<NodeId>> {
        let mut iter = self.db.raw_iterator_cf(self.cf(CF_LOGS)?);
        iter.seek_to_last();
        match iter.value() {
            Some(value) if iter.valid() => Ok(Some(Self::decode_entry(value)?.log_id)),
            _ => Ok(None),
        }
    }

    fn write_entries<I>(&self, entries: I) -> Result<Option<(LogId, usize)>, StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>>,
    {
        let cf = self.cf(CF_LOGS)?;
        let mut batch = rocksdb::WriteBatch::default();
        let mut last = None;
        let mut count = 0usize;

        for entry in entries {
            let value = serde_json::to_vec(&entry).map_err(|e| logs_error(e, ErrorVerb::Write))?;
            batch.put_cf(cf, Self::index_key(entry.log_id.index), value);
            last = Some(entry.log_id);
            count += 1;
        }

        let Some(last) = last else {
            return Ok(None);
        };
        self.db
            .write(batch)
            .map_err(|e| logs_error(e, ErrorVerb::Write))?;
        self.db
            .flush_wal(true)
            .map_err(|e| logs_error(e, ErrorVerb::Write))?;
        Ok(Some((last, count)))
    }

    /// Delete every entry with an index in `[from, to)`, plus an optional state write
    /// in the same batch.
    fn delete_range(
        &self,
        from: u64,
        to: Option<u64>,
        state: Option<(&[u8], Vec<u8>)>,
    ) -> Result<usize, StorageError<NodeId>> {
        let cf = self.cf(CF_LOGS)?;
        let mut batch = rocksdb::WriteBatch::default();
        let mut iter = self.db.raw_iterator_cf(cf);
        iter.seek(Self::index_key(from));

        let mut deleted = 0;
        while iter.valid() {
            let Some(key) = iter.key() else { break };
            if let (Some(index), Some(to)) = (Self::key_index(key), to)
                && index >= to
            {
                break;
            }
            batch.delete_cf(cf, key);
            deleted += 1;
            iter.next();
        }
        iter.status().map_err(|e| logs_error(e, ErrorVerb::Delete))?;

        if let Some((key, value)) = state {
            batch.put_cf(self.cf(CF_STATE)?, key, value);
        }
        self.db
            .write(batch)
            .map_err(|e| logs_error(e, ErrorVerb::Delete))?;
        Ok(deleted)
    }
}

impl RaftLogReader<TypeConfig> for RocksLogStore {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug + OptionalSend>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TypeConfig>>, StorageError<NodeId>> {
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };

        let mut entries = Vec::new();
        let mut iter = self.db.raw_iterator_cf(self.cf(CF_LOGS)?);
        iter.seek(Self::index_key(start));

        while iter.valid() {
            let (Some(key), Some(value)) = (iter.key(), iter.value()) else {
                break;
            };
            match Self::key_index(key) {
                Some(index) if range.contains(&index) => entries.push(Self::decode_entry(value)?),
                _ => break,
            }
            iter.next();
        }
        iter.status().map_err(|e| logs_error(e, ErrorVerb::Read))?;

        debug!("Read {} log entries from range {:?}", entries.len(), range);
        Ok(entries)
    }
}

impl RaftLogStorage<TypeConfig> for RocksLogStore {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, StorageError<NodeId>> {
        let meta = *self.meta.read().await;
        Ok(LogState {
            last_purged_log_id: meta.last_purged,
            last_log_id: meta.last_log_id.or(meta.last_purged),
        })
    }

    async fn save_vote(&mut self, vote: &Vote) -> Result<(), StorageError<NodeId>> {
        let bytes = serde_json::to_vec(vote).map_err(|e| vote_error(e, ErrorVerb::Write))?;
        self.db
            .put_cf(self.cf(CF_STATE)?, KEY_VOTE, bytes)
            .map_err(|e| vote_error(e, ErrorVerb::Write))?;
        self.db
            .flush_wal(true)
            .map_err(|e| vote_error(e, ErrorVerb::Write))?;

        self.meta.write().await.vote = Some(*vote);
        debug!("Saved vote: {:?}", vote);
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote>, StorageError<NodeId>> {
        Ok(self.meta.read().await.vote)
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: LogFlushed<TypeConfig>,
    ) -> Result<(), StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
        I::IntoIter: OptionalSend,
    {
        if let Some((last, count)) = self.write_entries(entries)? {
            self.meta.write().await.last_log_id = Some(last);
            debug!("Appended {} log entries, last {}", count, last);
        }

        callback.log_io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: LogId) -> Result<(), StorageError<NodeId>> {
        let deleted = self.delete_range(log_id.index, None, None)?;
        let last_log_id = self.scan_last_log_id()?;

        self.meta.write().await.last_log_id = last_log_id;
        debug!("Truncated {} log entries from index {}", deleted, log_id.index);
        Ok(())
    }

    async fn purge(&mut self, log_id: LogId) -> Result<(), StorageError<NodeId>> {
        let purged = serde_json::to_vec(&log_id).map_err(|e| logs_error(e, ErrorVerb::Write))?;
        let deleted =
            self.delete_range(0, Some(log_id.index + 1), Some((KEY_LAST_PURGED, purged)))?;

        self.meta.write().await.last_purged = Some(log_id);
        debug!("Purged {} log entries up to index {}", deleted, log_id.index);
        Ok(())
    }
}
