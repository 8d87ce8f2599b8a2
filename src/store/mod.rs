//! Access to the hosted table store.
//!
//! The dashboard keeps no data of its own: every screen reads through a
//! [`Store`] and every write goes straight to it. [`RestStore`] talks to the
//! hosted backend; [`MemoryStore`] stands in for it in tests and demo mode.

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::config::Config;
use crate::models::{Client, NewClient, NewOrder, Order, OrderWithClient, Session};
use crate::session::login_identifier;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// All clients, most recently created first.
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError>;

    async fn insert_client(&self, client: NewClient) -> Result<Client, StoreError>;

    async fn delete_client(&self, id: Uuid) -> Result<(), StoreError>;

    /// Orders, most recent first, optionally limited to one client.
    async fn list_orders(&self, client_id: Option<Uuid>) -> Result<Vec<Order>, StoreError>;

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError>;

    async fn delete_orders_for_client(&self, client_id: Uuid) -> Result<(), StoreError>;

    /// Orders with their client embedded, most recent first.
    async fn list_orders_with_client(&self) -> Result<Vec<OrderWithClient>, StoreError>;

    async fn current_session(&self) -> Result<Option<Session>, StoreError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError>;

    /// Exchanges a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, StoreError>;

    async fn sign_out(&self) -> Result<(), StoreError>;

    /// Drops the locally held session without telling the backend.
    async fn discard_session(&self);
}

/// Picks the hosted backend when one is configured, the in-memory store
/// otherwise.
pub fn connect_store(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match &config.backend {
        Some(backend) => {
            info!(url = %backend.url, "using hosted store");
            Ok(Arc::new(RestStore::new(&backend.url, &backend.anon_key, backend.timeout)?))
        }
        None => {
            warn!("no backend configured, running against an in-memory store");
            let email = login_identifier(&config.demo_username, &config.login_domain);
            Ok(Arc::new(MemoryStore::new(email, config.demo_password.clone())))
        }
    }
}

/// Removes a client's orders, then the client. The two deletes are not
/// atomic: if the second fails the orders are already gone.
pub async fn delete_client_cascade(
    store: &dyn Store,
    client_id: Uuid,
) -> Result<(), StoreError> {
    store.delete_orders_for_client(client_id).await?;
    store.delete_client(client_id).await
}
