// Raft state machine over the SQL executor
// Applied state is the SQL database itself; nothing here is persisted, the log is replayed on start

use std::io::Cursor;
use std::sync::Arc;

use openraft::storage::{RaftStateMachine, Snapshot};
use openraft::{
    Entry, EntryPayload, ErrorSubject, ErrorVerb, OptionalSend, RaftSnapshotBuilder, StorageError,
};
use tracing::{debug, error};

use super::request::ClusterResponse;
use super::types::{LogId, NodeId, SnapshotMeta, StoredMembership, TypeConfig};
use crate::sql::SqlExecutor;

fn snapshot_unsupported(verb: ErrorVerb) -> StorageError<NodeId> {
    StorageError::from_io_error(
        ErrorSubject::Snapshot(None),
        verb,
        std::io::Error::other("snapshots are not supported, the full log is replayed instead"),
    )
}

pub struct SqlStateMachine {
    executor: Arc<SqlExecutor>,
    last_applied: Option<LogId>,
    last_membership: StoredMembership,
}

impl SqlStateMachine {
    pub fn new(executor: Arc<SqlExecutor>) -> Self {
        Self {
            executor,
            last_applied: None,
            last_membership: StoredMembership::default(),
        }
    }

    pub fn executor(&self) -> &Arc<SqlExecutor> {
        &self.executor
    }
}

/// Refuses every build; log compaction is never triggered for this state machine.
pub struct NoSnapshots;

impl RaftSnapshotBuilder<TypeConfig> for NoSnapshots {
    async fn build_snapshot(&mut self) -> Result<Snapshot<TypeConfig>, StorageError<NodeId>> {
        Err(snapshot_unsupported(ErrorVerb::Write))
    }
}

impl RaftStateMachine<TypeConfig> for SqlStateMachine {
    type SnapshotBuilder = NoSnapshots;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<LogId>, StoredMembership), StorageError<NodeId>> {
        Ok((self.last_applied, self.last_membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<ClusterResponse>, StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
        I::IntoIter: OptionalSend,
    {
        let mut responses = Vec::new();

        for entry in entries {
            let log_id = entry.log_id;

            let response = match entry.payload {
                EntryPayload::Blank => ClusterResponse::empty(),
                EntryPayload::Normal(request) => {
                    request.apply(&self.executor).map_err(|e| {
                        error!("Failed to apply {} at {}: {}", request, log_id, e);
                        StorageError::from_io_error(
                            ErrorSubject::Apply(log_id),
                            ErrorVerb::Write,
                            std::io::Error::other(e.to_string()),
                        )
                    })?
                }
                EntryPayload::Membership(membership) => {
                    debug!("Applied membership {:?} at {}", membership, log_id);
                    self.last_membership = StoredMembership::new(Some(log_id), membership);
                    ClusterResponse::empty()
                }
            };

            self.last_applied = Some(log_id);
            responses.push(response);
        }

        Ok(responses)
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<Snapshot<TypeConfig>>, StorageError<NodeId>> {
        Ok(None)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        NoSnapshots
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<Cursor<Vec<u8>>>, StorageError<NodeId>> {
        Err(snapshot_unsupported(ErrorVerb::Write))
    }

    async fn install_snapshot(
        &mut self,
        _meta: &SnapshotMeta,
        _snapshot: Box<Cursor<Vec<u8>>>,
    ) -> Result<(), StorageError<NodeId>> {
        Err(snapshot_unsupported(ErrorVerb::Write))
    }
}
