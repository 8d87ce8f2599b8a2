use super::{Store, StoreError};
use crate::models::{
    Client, ClientSummary, NewClient, NewOrder, Order, OrderWithClient, Session,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    orders: Vec<Order>,
    session: Option<Session>,
}

/// In-process stand-in for the hosted store with a single account.
pub struct MemoryStore {
    email: String,
    password: String,
    session_ttl: Duration,
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            session_ttl: Duration::hours(1),
            tables: Mutex::new(Tables::default()),
        }
    }

    /// How long a signed-in session stays valid (default: one hour).
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

fn newest_first<T: Clone>(
    rows: &[T],
    created_at: impl Fn(&T) -> chrono::DateTime<Utc>,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.iter().rev().cloned().collect();
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    rows
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(&tables.clients, |client| client.created_at))
    }

    async fn insert_client(&self, client: NewClient) -> Result<Client, StoreError> {
        let row = Client {
            id: Uuid::new_v4(),
            name: client.name,
            phone: client.phone,
            created_at: Utc::now(),
        };
        self.tables.lock().await.clients.push(row.clone());
        debug!(client_id = %row.id, "client inserted");
        Ok(row)
    }

    async fn delete_client(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.clients.len();
        tables.clients.retain(|client| client.id != id);
        if tables.clients.len() == before {
            return Err(StoreError::NotFound(format!("client {id}")));
        }
        Ok(())
    }

    async fn list_orders(&self, client_id: Option<Uuid>) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.lock().await;
        let orders = newest_first(&tables.orders, |order| order.created_at);
        Ok(match client_id {
            Some(id) => orders.into_iter().filter(|order| order.client_id == id).collect(),
            None => orders,
        })
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.clients.iter().any(|client| client.id == order.client_id) {
            return Err(StoreError::NotFound(format!("client {}", order.client_id)));
        }
        let row = Order {
            id: Uuid::new_v4(),
            client_id: order.client_id,
            drink_name: order.drink_name,
            price: order.price,
            paid: false,
            created_at: Utc::now(),
        };
        tables.orders.push(row.clone());
        Ok(row)
    }

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.orders.len();
        tables.orders.retain(|order| order.id != id);
        if tables.orders.len() == before {
            return Err(StoreError::NotFound(format!("order {id}")));
        }
        Ok(())
    }

    async fn delete_orders_for_client(&self, client_id: Uuid) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .orders
            .retain(|order| order.client_id != client_id);
        Ok(())
    }

    async fn list_orders_with_client(&self) -> Result<Vec<OrderWithClient>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(&tables.orders, |order| order.created_at)
            .into_iter()
            .map(|order| {
                let client = tables
                    .clients
                    .iter()
                    .find(|client| client.id == order.client_id)
                    .map(ClientSummary::from);
                OrderWithClient { order, client }
            })
            .collect())
    }

    async fn current_session(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.lock().await.session.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        if email != self.email || password != self.password {
            return Err(StoreError::Unauthorized(
                "invalid login credentials".to_string(),
            ));
        }
        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: None,
            user_email: email.to_string(),
            expires_at: Some(Utc::now() + self.session_ttl),
        };
        self.tables.lock().await.session = Some(session.clone());
        Ok(session)
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<Session, StoreError> {
        self.tables.lock().await.session = None;
        Err(StoreError::Unauthorized(
            "refresh tokens are not issued".to_string(),
        ))
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.tables.lock().await.session = None;
        Ok(())
    }

    async fn discard_session(&self) {
        self.tables.lock().await.session = None;
    }
}
