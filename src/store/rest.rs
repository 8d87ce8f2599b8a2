use super::{Store, StoreError};
use crate::models::{Client, NewClient, NewOrder, Order, OrderWithClient, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::{sync::RwLock, time::Duration};
use tracing::{debug, warn};
use uuid::Uuid;

const JOINED_ORDER_COLUMNS: &str =
    "id,client_id,drink_name,price,paid,created_at,clients(id,name,phone)";

/// Client for a PostgREST table API with a GoTrue auth endpoint.
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<TokenUser>,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_email: self
                .user
                .and_then(|user| user.email)
                .unwrap_or_else(|| fallback_email.to_string()),
            expires_at: self
                .expires_at
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }
    }
}

impl RestStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            session: RwLock::new(None),
        })
    }

    fn bearer(&self) -> String {
        let token = self
            .session
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|session| session.access_token.clone()));
        token.unwrap_or_else(|| self.api_key.clone())
    }

    fn stored_session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }

    fn set_session(&self, session: Option<Session>) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
    }

    fn table(&self, method: Method, table: &str, query: &[(&str, String)]) -> RequestBuilder {
        self.request(method, &format!("/rest/v1/{table}")).query(query)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = check(request.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("failed to parse response: {e}")))
    }

    async fn insert<B, T>(&self, table: &str, row: &B) -> Result<T, StoreError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .table(Method::POST, table, &[])
            .header("Prefer", "return=representation")
            .json(&[row]);
        let mut rows: Vec<T> = self.fetch(request).await?;
        if rows.is_empty() {
            return Err(StoreError::Decode(format!(
                "insert into {table} returned no row"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    /// Posts to the token endpoint. The auth service answers a bad grant
    /// with 400, which counts as a rejected credential here.
    async fn grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<TokenResponse, StoreError> {
        let request = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", grant_type)])
            .json(&body);

        match self.fetch(request).await {
            Err(StoreError::Api {
                status: 400,
                message,
            }) => Err(StoreError::Unauthorized(message)),
            other => other,
        }
    }

    async fn delete_where(&self, table: &str, column: &str, id: Uuid) -> Result<(), StoreError> {
        let request = self.table(Method::DELETE, table, &[(column, format!("eq.{id}"))]);
        check(request.send().await?).await?;
        debug!(table, column, %id, "rows deleted");
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status = status.as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or(body);

    warn!(status, %message, "store request rejected");
    Err(match status {
        401 | 403 => StoreError::Unauthorized(message),
        404 => StoreError::NotFound(message),
        _ => StoreError::Api { status, message },
    })
}

#[async_trait]
impl Store for RestStore {
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        let request = self.table(
            Method::GET,
            "clients",
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        );
        self.fetch(request).await
    }

    async fn insert_client(&self, client: NewClient) -> Result<Client, StoreError> {
        self.insert("clients", &client).await
    }

    async fn delete_client(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where("clients", "id", id).await
    }

    async fn list_orders(&self, client_id: Option<Uuid>) -> Result<Vec<Order>, StoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(id) = client_id {
            query.push(("client_id", format!("eq.{id}")));
        }
        self.fetch(self.table(Method::GET, "orders", &query)).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.insert("orders", &order).await
    }

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where("orders", "id", id).await
    }

    async fn delete_orders_for_client(&self, client_id: Uuid) -> Result<(), StoreError> {
        self.delete_where("orders", "client_id", client_id).await
    }

    async fn list_orders_with_client(&self) -> Result<Vec<OrderWithClient>, StoreError> {
        let request = self.table(
            Method::GET,
            "orders",
            &[
                ("select", JOINED_ORDER_COLUMNS.to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        );
        self.fetch(request).await
    }

    async fn current_session(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.stored_session())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let session = self.grant("password", body).await?.into_session(email);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, StoreError> {
        let email = self
            .stored_session()
            .map(|session| session.user_email)
            .unwrap_or_default();
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let session = match self.grant("refresh_token", body).await {
            Ok(token) => token.into_session(&email),
            Err(err) => {
                self.set_session(None);
                return Err(err);
            }
        };
        debug!(user = %session.user_email, "session refreshed");
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        if self.stored_session().is_some() {
            let request = self.request(Method::POST, "/auth/v1/logout");
            if let Err(err) = check(request.send().await?).await {
                warn!("remote sign out failed: {err}");
            }
        }
        self.set_session(None);
        Ok(())
    }

    async fn discard_session(&self) {
        self.set_session(None);
    }
}
