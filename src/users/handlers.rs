use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        LoginRequest, MessageEnvelope, Pagination, PublicUser, TokenEnvelope, UserEnvelope,
        UsersEnvelope,
    },
    form::UserForm,
    services,
};
use crate::{
    auth::{require_self, AuthUser},
    error::AppError,
    state::AppState,
};

pub fn user_routes(state: &AppState) -> Router<AppState> {
    let mutate = patch(update_user).delete(delete_user);
    let mutate = if state.config.protect_user_mutations {
        mutate.route_layer(middleware::from_fn_with_state(state.clone(), require_self))
    } else {
        mutate
    };

    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/:id", get(get_user).merge(mutate))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    page: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<UsersEnvelope>, AppError> {
    let Query(page) = page.map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
    let users = services::list_users(&state, &page).await?;
    Ok(Json(UsersEnvelope {
        users: users.into_iter().map(PublicUser::from).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = services::get_user(&state, &id).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id, username = %auth.username))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = services::current_user(&state, &auth).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    form: UserForm,
) -> Result<(StatusCode, Json<UserEnvelope>), AppError> {
    let (req, image) = form.into_register();
    let account = req.validate()?;
    let user = services::create_user(&state, account, image).await?;
    Ok((StatusCode::CREATED, Json(UserEnvelope { user: user.into() })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenEnvelope>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
    let creds = req.validate()?;
    let token = services::login_user(&state, creds).await?;
    Ok(Json(TokenEnvelope { token }))
}

#[instrument(skip(state, form))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: UserForm,
) -> Result<Json<UserEnvelope>, AppError> {
    let (req, image) = form.into_update();
    let changes = req.validate()?;
    let user = services::update_user(&state, &id, changes, image).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageEnvelope>, AppError> {
    services::delete_user(&state, &id).await?;
    Ok(Json(MessageEnvelope {
        message: "User deleted successfully",
    }))
}
