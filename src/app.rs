use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::clients_page))
        .route("/login", get(handlers::login_page).post(handlers::login_submit))
        .route("/logout", post(handlers::logout))
        .route("/clients", post(handlers::add_client_form))
        .route("/clients/:id/delete", post(handlers::delete_client_form))
        .route("/clients/:id/orders", post(handlers::add_order_form))
        .route("/orders/:id/delete", post(handlers::delete_order_form))
        .route("/withdrawals", get(handlers::withdrawals_page))
        .route("/analytics", get(handlers::analytics_page))
        .route(
            "/api/session",
            get(handlers::get_session)
                .post(handlers::create_session)
                .delete(handlers::delete_session),
        )
        .route("/api/clients", get(handlers::list_clients).post(handlers::create_client))
        .route("/api/clients/:id", delete(handlers::remove_client))
        .route(
            "/api/clients/:id/orders",
            get(handlers::client_orders).post(handlers::create_order),
        )
        .route("/api/clients/:id/statement", get(handlers::client_statement))
        .route("/api/orders/:id", delete(handlers::remove_order))
        .route("/api/withdrawals", get(handlers::list_withdrawals))
        .route("/api/analytics", get(handlers::get_analytics))
        .with_state(state)
}
