use std::sync::Arc;

use crate::db::DbPool;
use crate::mailer::Mailer;
use crate::realtime::dispatcher::EventHub;

/// Shared application state passed to all handlers via axum State
/// extractor. Built once in main; the event hub owns the three channel
/// registries, so everything that accepts connections or publishes
/// events gets them from here rather than from a global.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Connection registries + fan-out dispatcher
    pub hub: Arc<EventHub>,
    /// Verification mail delivery
    pub mailer: Mailer,
    /// Base URL used in verification links
    pub public_base_url: String,
    /// Origin allowed by the CORS layer (the SPA)
    pub cors_origin: String,
}
