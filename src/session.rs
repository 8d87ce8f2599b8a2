use crate::models::{Client, NewClient, NewOrder, Order, OrderWithClient, Session};
use crate::store::{Store, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_LOGIN_DOMAIN: &str = "cafe.com";

/// Staff log in with a username; the auth service wants an address.
pub fn login_identifier(username: &str, domain: &str) -> String {
    format!("{}@{domain}", username.trim().to_lowercase())
}

fn is_expired(session: &Session) -> bool {
    session
        .expires_at
        .is_some_and(|expires_at| expires_at <= Utc::now())
}

/// Process-wide auth session. Views subscribe to change events; dropping the
/// receiver unsubscribes.
///
/// A session ends when it is signed out, when its `expires_at` passes and it
/// cannot be refreshed, or when the store rejects its token.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    login_domain: String,
    sender: Arc<watch::Sender<Option<Session>>>,
}

impl SessionManager {
    /// Fetches the current session once and seeds the channel with it.
    pub async fn init(store: Arc<dyn Store>, login_domain: impl Into<String>) -> Self {
        let current = match store.current_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!("failed to read current session: {err}");
                None
            }
        };
        let (sender, _) = watch::channel(current);
        Self {
            store,
            login_domain: login_domain.into(),
            sender: Arc::new(sender),
        }
    }

    /// The session, unless it has expired. An expired session is cleared
    /// and subscribers see the change.
    pub fn current(&self) -> Option<Session> {
        let session = self.sender.borrow().clone()?;
        if is_expired(&session) {
            info!(user = %session.user_email, "session expired");
            self.sender.send_replace(None);
            return None;
        }
        Some(session)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    /// Like [`current`](Self::current), but trades the refresh token for a
    /// new session first when the held one has expired.
    pub async fn active(&self) -> Option<Session> {
        let session = self.sender.borrow().clone()?;
        if !is_expired(&session) {
            return Some(session);
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            info!(user = %session.user_email, "session expired");
            self.invalidate().await;
            return None;
        };
        match self.store.refresh_session(refresh_token).await {
            Ok(fresh) => {
                info!(user = %fresh.user_email, "session refreshed");
                self.sender.send_replace(Some(fresh.clone()));
                Some(fresh)
            }
            Err(err) => {
                warn!("session refresh failed: {err}");
                self.sender.send_replace(None);
                None
            }
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active().await.is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Session, StoreError> {
        let email = login_identifier(username, &self.login_domain);
        let session = self.store.sign_in(&email, password).await?;
        info!(user = %session.user_email, "signed in");
        self.sender.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// The local session is cleared even when the remote call fails.
    pub async fn sign_out(&self) -> Result<(), StoreError> {
        let result = self.store.sign_out().await;
        self.sender.send_replace(None);
        info!("signed out");
        result
    }

    /// Drops the local session without a remote sign-out.
    pub async fn invalidate(&self) {
        self.store.discard_session().await;
        self.sender.send_replace(None);
    }

    /// The store as handlers should use it: any call the backend rejects
    /// as unauthorized ends the session.
    pub fn guarded_store(&self) -> Arc<dyn Store> {
        Arc::new(GuardedStore {
            sessions: self.clone(),
        })
    }

    async fn watch<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(StoreError::Unauthorized(message)) = &result {
            warn!("store rejected the session token: {message}");
            self.invalidate().await;
        }
        result
    }
}

struct GuardedStore {
    sessions: SessionManager,
}

impl GuardedStore {
    fn inner(&self) -> &dyn Store {
        self.sessions.store.as_ref()
    }
}

#[async_trait]
impl Store for GuardedStore {
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        self.sessions.watch(self.inner().list_clients().await).await
    }

    async fn insert_client(&self, client: NewClient) -> Result<Client, StoreError> {
        self.sessions
            .watch(self.inner().insert_client(client).await)
            .await
    }

    async fn delete_client(&self, id: Uuid) -> Result<(), StoreError> {
        self.sessions.watch(self.inner().delete_client(id).await).await
    }

    async fn list_orders(&self, client_id: Option<Uuid>) -> Result<Vec<Order>, StoreError> {
        self.sessions
            .watch(self.inner().list_orders(client_id).await)
            .await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.sessions
            .watch(self.inner().insert_order(order).await)
            .await
    }

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError> {
        self.sessions.watch(self.inner().delete_order(id).await).await
    }

    async fn delete_orders_for_client(&self, client_id: Uuid) -> Result<(), StoreError> {
        self.sessions
            .watch(self.inner().delete_orders_for_client(client_id).await)
            .await
    }

    async fn list_orders_with_client(&self) -> Result<Vec<OrderWithClient>, StoreError> {
        self.sessions
            .watch(self.inner().list_orders_with_client().await)
            .await
    }

    async fn current_session(&self) -> Result<Option<Session>, StoreError> {
        self.inner().current_session().await
    }

    // A wrong password is not a reason to drop someone else's session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        self.inner().sign_in(email, password).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, StoreError> {
        self.inner().refresh_session(refresh_token).await
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.inner().sign_out().await
    }

    async fn discard_session(&self) {
        self.inner().discard_session().await
    }
}
