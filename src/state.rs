use crate::analytics::ItemGrouping;
use crate::config::Config;
use crate::session::SessionManager;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: SessionManager,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let sessions = SessionManager::init(store, config.login_domain.clone()).await;
        Self {
            store: sessions.guarded_store(),
            sessions,
            config: Arc::new(config),
        }
    }

    pub fn item_grouping(&self) -> ItemGrouping {
        if self.config.fold_item_case {
            ItemGrouping::CaseInsensitive
        } else {
            ItemGrouping::Trimmed
        }
    }
}
