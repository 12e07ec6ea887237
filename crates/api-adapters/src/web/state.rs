use std::sync::Arc;

use domains::{MediaSource, TokenVerifier};
use services::{AccountService, AnalysisService, FeedService, LiveCounter};

use crate::metrics::Metrics;

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub feed:     FeedService,
    pub analysis: AnalysisService,
    pub counter:  Arc<LiveCounter>,
    pub tokens:   Arc<dyn TokenVerifier>,
    pub metrics:  Arc<Metrics>,
    /// Backs `GET /media/...`; `None` when attachment URLs point elsewhere.
    pub media:    Option<Arc<dyn MediaSource>>,
}
