use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Path, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Caller identified by a valid `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = keys.verify(token.trim()).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        Ok(AuthUser {
            id: claims.sub,
            username: claims.username,
        })
    }
}

/// Lets a request through only when the bearer token belongs to the user in the path.
pub async fn require_self(
    auth: AuthUser,
    Path(id): Path<String>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if Uuid::parse_str(&id).ok() != Some(auth.id) {
        warn!(
            caller = %auth.id,
            caller_name = %auth.username,
            target_id = %id,
            "mutation of another user rejected"
        );
        return Err(AppError::Forbidden(
            "You are not allowed to modify this user".into(),
        ));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::{header, Request as HttpRequest};

    async fn extract(state: &AppState, authorization: Option<&str>) -> Result<AuthUser, AppError> {
        let mut builder = HttpRequest::builder().uri("/users/me");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn bearer_token_yields_id_and_username() {
        let state = AppState::fake();
        let id = Uuid::new_v4();
        let token = JwtKeys::from_ref(&state).sign(id, "alice").unwrap();

        let user = extract(&state, Some(&format!("Bearer {token}"))).await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");

        let user = extract(&state, Some(&format!("bearer {token}"))).await.unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        let state = AppState::fake();
        let err = extract(&state, None).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(m) if m == "Missing Authorization header"));
        let err = extract(&state, Some("Basic abc")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(m) if m == "Invalid Authorization header"));
        let err = extract(&state, Some("Bearer not-a-jwt")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(m) if m == "Invalid or expired token"));
    }
}
