//! Shared application state threaded through every Axum handler via
//! `State<AppState>` or a narrower `State<T>` extracted with
//! [`crate::macros::impl_from_ref`].

use std::sync::Arc;
use std::time::Instant;

use logintel_ml::OnlineServing;
use logintel_search::IndexStore;
use logintel_storage::RowStore;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::macros::impl_from_ref;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RowStore>,
    pub index: Arc<dyn IndexStore>,
    pub serving: Arc<OnlineServing>,
    pub auth_config: Arc<AuthConfig>,
    pub api_config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl_from_ref!(Arc<dyn RowStore>, store);
impl_from_ref!(Arc<dyn IndexStore>, index);
impl_from_ref!(Arc<OnlineServing>, serving);
impl_from_ref!(Arc<AuthConfig>, auth_config);
impl_from_ref!(Arc<ApiConfig>, api_config);
impl_from_ref!(Instant, start_time);
