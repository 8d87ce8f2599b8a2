pub mod analytics;
pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod session;
pub mod state;
pub mod statement;
pub mod store;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use store::{connect_store, MemoryStore, RestStore, Store};
