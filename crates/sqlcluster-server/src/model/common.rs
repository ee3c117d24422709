//! Shared application state handed to every HTTP handler.

use std::sync::Arc;

use sqlcluster_consistency::Consensus;

use crate::service::dispatch::Dispatcher;
use crate::service::membership::MembershipManager;

pub struct AppState {
    pub consensus: Arc<dyn Consensus>,
    pub dispatcher: Dispatcher,
    pub membership: MembershipManager,
}

impl AppState {
    pub fn is_leader(&self) -> bool {
        self.consensus.role().is_leader()
    }
}
