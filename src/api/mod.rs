pub mod invoices;

use crate::middleware::AppState;
use axum::Router;

pub fn routes() -> Router<AppState> {
    Router::new().nest("/invoices", invoices::routes())
}
