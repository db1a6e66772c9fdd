use anyhow::Context;
use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{Credentials, ImageUpload, NewAccount, Pagination, UserChanges};
use super::repo::{NewUser, StoreError, User};
use crate::{
    auth::{
        password::{hash_password, verify_password},
        AuthUser, JwtKeys,
    },
    error::AppError,
    state::AppState,
    storage::profile_image_key,
};

const USER_NOT_FOUND: &str = "User not found";

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(field) => AppError::Conflict(format!("{field} already exists")),
            StoreError::Other(e) => AppError::Internal(e),
        }
    }
}

/// Ids that do not parse cannot name a stored user.
fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::NotFound(USER_NOT_FOUND.into()))
}

pub async fn list_users(st: &AppState, page: &Pagination) -> Result<Vec<User>, AppError> {
    let (limit, offset) = page.clamped();
    Ok(st.users.list(limit, offset).await?)
}

pub async fn get_user(st: &AppState, id: &str) -> Result<User, AppError> {
    let id = parse_id(id)?;
    st.users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))
}

pub async fn current_user(st: &AppState, auth: &AuthUser) -> Result<User, AppError> {
    st.users
        .find_by_id(auth.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(USER_NOT_FOUND.into()))
}

pub async fn create_user(
    st: &AppState,
    account: NewAccount,
    image: Option<ImageUpload>,
) -> Result<User, AppError> {
    if st.users.find_by_username(&account.username).await?.is_some() {
        warn!(username = %account.username, "username already registered");
        return Err(AppError::Conflict("Username already exists".into()));
    }
    if st.users.find_by_email(&account.email).await?.is_some() {
        warn!(email = %account.email, "email already registered");
        return Err(AppError::Conflict("Email already exists".into()));
    }

    let password_hash = hash_password(&account.password)?;

    let profile_image = match image {
        Some(img) => Some(upload_profile_image(st, img).await?),
        None => None,
    };

    let new = NewUser {
        username: account.username,
        email: account.email,
        password_hash,
        profile_image: profile_image.clone(),
    };
    match st.users.insert(new).await {
        Ok(user) => {
            info!(user_id = %user.id, username = %user.username, "user registered");
            Ok(user)
        }
        Err(e) => {
            if let Some(url) = &profile_image {
                discard_image(st, url).await;
            }
            Err(e.into())
        }
    }
}

pub async fn login_user(st: &AppState, creds: Credentials) -> Result<String, AppError> {
    let Some(user) = st.users.find_by_username(&creds.username).await? else {
        warn!(username = %creds.username, "login for unknown username");
        return Err(AppError::Unauthorized("User does not exist".into()));
    };

    if !verify_password(&creds.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = JwtKeys::from_ref(st)
        .sign(user.id, &user.username)
        .context("sign login token")?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

pub async fn update_user(
    st: &AppState,
    id: &str,
    changes: UserChanges,
    image: Option<ImageUpload>,
) -> Result<User, AppError> {
    let id = parse_id(id)?;
    let mut user = st
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;

    if let Some(email) = changes.email.filter(|e| *e != user.email) {
        if let Some(holder) = st.users.find_by_email(&email).await? {
            if holder.id != user.id {
                warn!(user_id = %user.id, email = %email, "email held by another user");
                return Err(AppError::Conflict("Email already exists".into()));
            }
        }
        user.email = email;
    }

    if let Some(password) = changes.password {
        user.password_hash = hash_password(&password)?;
    }

    let new_image = match image {
        Some(img) => Some(upload_profile_image(st, img).await?),
        None => None,
    };
    let previous_image = match &new_image {
        Some(url) => user.profile_image.replace(url.clone()),
        None => None,
    };

    let saved = match st.users.update(&user).await {
        Ok(saved) => saved,
        Err(e) => {
            if let Some(url) = &new_image {
                discard_image(st, url).await;
            }
            return Err(e.into());
        }
    };

    if let Some(old) = previous_image {
        discard_image(st, &old).await;
    }

    info!(user_id = %saved.id, "user updated");
    Ok(saved)
}

pub async fn delete_user(st: &AppState, id: &str) -> Result<(), AppError> {
    let id = parse_id(id)?;
    let user = st
        .users
        .delete(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;

    if let Some(url) = &user.profile_image {
        delete_image(st, url).await?;
    }

    info!(user_id = %user.id, "user deleted");
    Ok(())
}

async fn upload_profile_image(st: &AppState, img: ImageUpload) -> anyhow::Result<String> {
    let key = profile_image_key(&img.file_name);
    st.storage
        .put_object(&key, img.bytes, &img.content_type)
        .await
        .with_context(|| format!("upload profile image {key}"))?;
    Ok(st.storage.public_url(&key))
}

async fn delete_image(st: &AppState, url: &str) -> anyhow::Result<()> {
    let Some(key) = st.storage.key_for_url(url) else {
        warn!(url, "profile image is outside the bucket; not deleting");
        return Ok(());
    };
    st.storage
        .delete_object(&key)
        .await
        .with_context(|| format!("delete profile image {key}"))
}

/// Best-effort delete; a leftover object is logged, not surfaced.
async fn discard_image(st: &AppState, url: &str) {
    if let Err(e) = delete_image(st, url).await {
        warn!(error = %format!("{e:#}"), url, "could not delete profile image");
    }
}
