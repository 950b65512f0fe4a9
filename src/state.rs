//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    db::DbPool,
    services::{notification_hub::NotificationHub, recharge_provider::RechargeProvider},
};

/// Everything a request handler may need, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub hub: Arc<NotificationHub>,
    /// `None` when no recharge provider is configured.
    pub recharge_provider: Option<Arc<dyn RechargeProvider>>,
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
