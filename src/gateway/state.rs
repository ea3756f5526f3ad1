use std::sync::Arc;

use crate::ledger::Ledger;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    /// Balance ledger (shared with the backup orchestrator)
    pub ledger: Arc<Ledger>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }
}
