//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use ticketing_core::{Clock, EventStore, PageStore, TokenService, UserStore};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// Everything in it is read-only after construction; the stores are the only shared
/// mutable resource, and they live behind their own ports.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub events: Arc<dyn EventStore>,
    pub pages: Arc<dyn PageStore>,
    pub tokens: Arc<TokenService>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}
