//! Session lookups for socket authentication.
//!
//! Session records are written by the platform's auth service; this side only
//! reads them. The currency a session carries is the currency every wager and
//! wallet call for that player uses.

use crate::store::{read_json, StateStore};
use async_trait::async_trait;
use plinko_types::keys;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub session_token: String,
    pub player_id: String,
    pub tenant_id: String,
    pub currency: String,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, token: &str) -> Option<Session>;
}

pub struct RedisSessionStore {
    store: Arc<dyn StateStore>,
}

impl RedisSessionStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get_session(&self, token: &str) -> Option<Session> {
        match read_json::<Session>(&*self.store, &keys::session(token)).await {
            Ok(Some(mut session)) => {
                session.session_token = token.to_string();
                Some(session)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "session read failed");
                None
            }
        }
    }
}
