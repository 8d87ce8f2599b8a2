use crate::analytics::{
    build_analytics, filter_withdrawals, withdrawals_total, AnalyticsReport,
};
use crate::errors::AppError;
use crate::ledger::{client_balances, ClientLedger};
use crate::models::{
    AddClientRequest, AddOrderForm, AddOrderRequest, Client, ClientBalance, ClientOrdersResponse,
    DeleteOrderForm, LoginRequest, NewClient, NewOrder, Order, SessionResponse, StatementResponse,
    WithdrawalsResponse,
};
use crate::state::AppState;
use crate::statement::{format_statement, normalize_phone, whatsapp_link};
use crate::store::{delete_client_cascade, StoreError};
use crate::ui::{self, ClientsView, Notice};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub client: Option<String>,
    pub notice: Option<String>,
}

impl PageQuery {
    fn client_id(&self) -> Option<Uuid> {
        self.client.as_deref().and_then(|value| value.parse().ok())
    }

    fn notice(&self) -> Option<Notice> {
        self.notice.as_deref().and_then(Notice::from_key)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawalsQuery {
    pub client_id: Option<Uuid>,
}

async fn require_session(state: &AppState) -> Result<(), AppError> {
    if state.sessions.is_active().await {
        Ok(())
    } else {
        Err(AppError::unauthorized())
    }
}

fn notice_redirect(path: &str, notice: Notice) -> Redirect {
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{path}{separator}notice={}", notice.key()))
}

fn client_path(client_id: Option<Uuid>) -> String {
    match client_id {
        Some(id) => format!("/?client={id}"),
        None => "/".to_string(),
    }
}

fn require_text(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn parse_price_input(value: &serde_json::Value) -> Result<f64, AppError> {
    let price = match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match price {
        Some(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(AppError::bad_request("price must be a non-negative number")),
    }
}

async fn find_client(state: &AppState, client_id: Uuid) -> Result<Client, AppError> {
    state
        .store
        .list_clients()
        .await?
        .into_iter()
        .find(|client| client.id == client_id)
        .ok_or_else(|| StoreError::NotFound(format!("client {client_id}")).into())
}

fn statement_for(state: &AppState, client: &Client, orders: &[Order]) -> StatementResponse {
    let text = format_statement(&client.name, orders, &state.config.currency);
    StatementResponse {
        client_id: client.id,
        phone: normalize_phone(&client.phone, &state.config.country_code),
        link: whatsapp_link(&client.phone, &text, &state.config.country_code),
        text,
    }
}

// Pages

pub async fn login_page(State(state): State<AppState>) -> Response {
    if state.sessions.is_active().await {
        return Redirect::to("/").into_response();
    }
    Html(ui::render_login(None)).into_response()
}

pub async fn login_submit(
    State(state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> Response {
    match state.sessions.sign_in(&form.username, &form.password).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => {
            info!("login rejected: {err}");
            let message = match err {
                StoreError::Unauthorized(_) => "Invalid username or password",
                _ => "Could not reach the sign-in service",
            };
            let page = Html(ui::render_login(Some(message)));
            (StatusCode::UNAUTHORIZED, page).into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Redirect {
    if let Err(err) = state.sessions.sign_out().await {
        error!("sign out failed: {err}");
    }
    Redirect::to("/login")
}

pub async fn clients_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    if !state.sessions.is_active().await {
        return Redirect::to("/login").into_response();
    }

    let mut notice = query.notice();
    let loaded = async {
        let clients = state.store.list_clients().await?;
        let orders = state.store.list_orders(None).await?;
        Ok::<_, StoreError>((clients, orders))
    }
    .await;

    let (clients, orders) = match loaded {
        Ok(rows) => rows,
        Err(err) => {
            error!("failed to load clients: {err}");
            notice = Some(Notice::LoadFailed);
            (Vec::new(), Vec::new())
        }
    };

    let balances = client_balances(&clients, &orders, state.config.credit_limit);
    let rows: Vec<(ClientBalance, StatementResponse)> = balances
        .into_iter()
        .map(|balance| {
            let owned: Vec<Order> = orders
                .iter()
                .filter(|order| order.client_id == balance.client.id)
                .cloned()
                .collect();
            let statement = statement_for(&state, &balance.client, &owned);
            (balance, statement)
        })
        .collect();

    let selected = query.client_id().and_then(|id| {
        let (balance, _) = rows.iter().find(|(balance, _)| balance.client.id == id)?;
        let owned: Vec<Order> = orders
            .iter()
            .filter(|order| order.client_id == id)
            .cloned()
            .collect();
        Some((balance, owned))
    });

    Html(ui::render_clients(&ClientsView {
        rows: &rows,
        selected: selected
            .as_ref()
            .map(|(balance, owned)| (*balance, owned.as_slice())),
        currency: &state.config.currency,
        notice,
    }))
    .into_response()
}

pub async fn add_client_form(
    State(state): State<AppState>,
    Form(form): Form<AddClientRequest>,
) -> Redirect {
    if !state.sessions.is_active().await {
        return Redirect::to("/login");
    }
    match insert_client(&state, form).await {
        Ok(_) => notice_redirect("/", Notice::ClientAdded),
        Err(_) => notice_redirect("/", Notice::ClientAddFailed),
    }
}

pub async fn delete_client_form(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Redirect {
    if !state.sessions.is_active().await {
        return Redirect::to("/login");
    }
    match delete_client_cascade(state.store.as_ref(), client_id).await {
        Ok(()) => {
            info!(%client_id, "client deleted");
            notice_redirect("/", Notice::ClientDeleted)
        }
        Err(err) => {
            error!(%client_id, "failed to delete client: {err}");
            notice_redirect("/", Notice::DeleteFailed)
        }
    }
}

pub async fn add_order_form(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Form(form): Form<AddOrderForm>,
) -> Redirect {
    if !state.sessions.is_active().await {
        return Redirect::to("/login");
    }
    let request = AddOrderRequest {
        drink_name: form.drink_name,
        price: serde_json::Value::String(form.price),
    };
    let back = client_path(Some(client_id));
    match insert_order(&state, client_id, request).await {
        Ok(_) => notice_redirect(&back, Notice::OrderAdded),
        Err(err) if err.status == StatusCode::BAD_REQUEST => {
            notice_redirect(&back, Notice::InvalidOrder)
        }
        Err(_) => notice_redirect(&back, Notice::OrderAddFailed),
    }
}

pub async fn delete_order_form(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Form(form): Form<DeleteOrderForm>,
) -> Redirect {
    if !state.sessions.is_active().await {
        return Redirect::to("/login");
    }
    let back = client_path(form.client);
    match state.store.delete_order(order_id).await {
        Ok(()) => notice_redirect(&back, Notice::OrderDeleted),
        Err(err) => {
            error!(%order_id, "failed to delete order: {err}");
            notice_redirect(&back, Notice::DeleteFailed)
        }
    }
}

pub async fn withdrawals_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    if !state.sessions.is_active().await {
        return Redirect::to("/login").into_response();
    }

    let mut notice = query.notice();
    let loaded = async {
        let rows = state.store.list_orders_with_client().await?;
        let clients = state.store.list_clients().await?;
        Ok::<_, StoreError>((rows, clients))
    }
    .await;
    let (rows, clients) = loaded.unwrap_or_else(|err| {
        error!("failed to load withdrawals: {err}");
        notice = Some(Notice::LoadFailed);
        (Vec::new(), Vec::new())
    });

    let selected = query.client_id();
    let filtered = filter_withdrawals(rows, selected);
    let total = withdrawals_total(&filtered);
    Html(ui::render_withdrawals(
        &filtered,
        &clients,
        selected,
        total,
        &state.config.currency,
        notice,
    ))
    .into_response()
}

pub async fn analytics_page(State(state): State<AppState>) -> Response {
    if !state.sessions.is_active().await {
        return Redirect::to("/login").into_response();
    }

    let report = analytics_report(&state)
        .await
        .inspect_err(|err| error!("failed to load analytics: {err}"))
        .ok();
    Html(ui::render_analytics(report.as_ref(), &state.config.currency)).into_response()
}

// JSON API

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let current = state.sessions.active().await;
    Json(SessionResponse {
        signed_in: current.is_some(),
        user_email: current.map(|session| session.user_email),
    })
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .sessions
        .sign_in(&payload.username, &payload.password)
        .await?;
    Ok(Json(SessionResponse {
        signed_in: true,
        user_email: Some(session.user_email),
    }))
}

pub async fn delete_session(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.sessions.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_clients(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClientBalance>>, AppError> {
    require_session(&state).await?;
    let clients = state.store.list_clients().await?;
    let orders = state.store.list_orders(None).await?;
    let balances = client_balances(&clients, &orders, state.config.credit_limit);
    Ok(Json(balances))
}

pub async fn create_client(
    State(state): State<AppState>,
    Json(payload): Json<AddClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    require_session(&state).await?;
    let client = insert_client(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn remove_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_session(&state).await?;
    delete_client_cascade(state.store.as_ref(), client_id).await?;
    info!(%client_id, "client deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn client_orders(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<ClientOrdersResponse>, AppError> {
    require_session(&state).await?;
    let orders = state.store.list_orders(Some(client_id)).await?;
    let ledger = ClientLedger::compute(&orders, state.config.credit_limit);
    Ok(Json(ClientOrdersResponse {
        client_id,
        orders,
        total: ledger.total,
        over_limit: ledger.over_limit,
        progress: ledger.progress,
    }))
}

pub async fn create_order(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<AddOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    require_session(&state).await?;
    let order = insert_order(&state, client_id, payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn remove_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_session(&state).await?;
    state.store.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn client_statement(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<StatementResponse>, AppError> {
    require_session(&state).await?;
    let client = find_client(&state, client_id).await?;
    let orders = state.store.list_orders(Some(client_id)).await?;
    Ok(Json(statement_for(&state, &client, &orders)))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Query(query): Query<WithdrawalsQuery>,
) -> Result<Json<WithdrawalsResponse>, AppError> {
    require_session(&state).await?;
    let rows = state.store.list_orders_with_client().await?;
    let withdrawals = filter_withdrawals(rows, query.client_id);
    let total = withdrawals_total(&withdrawals);
    Ok(Json(WithdrawalsResponse { withdrawals, total }))
}

pub async fn get_analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsReport>, AppError> {
    require_session(&state).await?;
    Ok(Json(analytics_report(&state).await?))
}

async fn analytics_report(state: &AppState) -> Result<AnalyticsReport, StoreError> {
    let clients = state.store.list_clients().await?;
    let orders = state.store.list_orders(None).await?;
    Ok(build_analytics(&clients, &orders, state.item_grouping()))
}

async fn insert_client(state: &AppState, request: AddClientRequest) -> Result<Client, AppError> {
    let name = require_text(&request.name, "name")?;
    let client = state
        .store
        .insert_client(NewClient {
            name,
            phone: request.phone.trim().to_string(),
        })
        .await?;
    info!(client_id = %client.id, "client added");
    Ok(client)
}

async fn insert_order(
    state: &AppState,
    client_id: Uuid,
    request: AddOrderRequest,
) -> Result<Order, AppError> {
    let drink_name = require_text(&request.drink_name, "drink_name")?;
    let price = parse_price_input(&request.price)?;
    let order = state
        .store
        .insert_order(NewOrder {
            client_id,
            drink_name,
            price,
        })
        .await?;
    info!(%client_id, order_id = %order.id, "withdrawal added");
    Ok(order)
}
