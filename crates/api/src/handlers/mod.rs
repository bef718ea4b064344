//! Request handlers, grouped by resource.

use std::sync::Arc;

use bus::MessageBus;
use db::Store;
use engine::TriggerMatcher;

pub mod approvals;
pub mod events;
pub mod runs;
pub mod workflows;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub bus: Arc<dyn MessageBus>,
    pub matcher: Arc<TriggerMatcher>,
}
