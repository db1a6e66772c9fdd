mod dto;
mod form;
pub mod handlers;
pub mod repo;
pub mod services;
mod validation;

use crate::state::AppState;
use axum::Router;

pub fn router(state: &AppState) -> Router<AppState> {
    handlers::user_routes(state)
}
