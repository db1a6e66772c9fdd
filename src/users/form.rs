use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde_json::Value;

use super::dto::{ImageUpload, RegisterRequest, UpdateUserRequest};
use crate::error::AppError;

pub const PROFILE_IMAGE_FIELD: &str = "profileImage";

/// Body of register/update: `multipart/form-data` with an optional
/// `profileImage` file, or a flat JSON object of strings.
#[derive(Debug, Default)]
pub struct UserForm {
    fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

#[async_trait]
impl<S> FromRequest<S> for UserForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let mp = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
            Self::from_multipart(mp).await
        } else {
            let Json(body) = Json::<serde_json::Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
            Self::from_json(body)
        }
    }
}

impl UserForm {
    async fn from_multipart(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = UserForm::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::rejected(e.status(), e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
                if name != PROFILE_IMAGE_FIELD {
                    form.fields.insert(name, text);
                }
                continue;
            };

            if name != PROFILE_IMAGE_FIELD {
                return Err(AppError::BadRequest(format!("Unexpected field {name}")));
            }
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
            // an empty file input is submitted as a zero-length part
            if bytes.is_empty() {
                continue;
            }
            if !content_type.starts_with("image/") {
                return Err(AppError::BadRequest(format!(
                    "{PROFILE_IMAGE_FIELD} must be an image"
                )));
            }
            form.image = Some(ImageUpload {
                file_name,
                content_type,
                bytes,
            });
        }
        Ok(form)
    }

    fn from_json(body: serde_json::Map<String, Value>) -> Result<Self, AppError> {
        let mut form = UserForm::default();
        for (key, value) in body {
            match value {
                Value::String(s) => {
                    form.fields.insert(key, s);
                }
                Value::Null => {}
                _ => return Err(AppError::BadRequest(format!("{key} must be a string"))),
            }
        }
        Ok(form)
    }

    fn take(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn into_register(mut self) -> (RegisterRequest, Option<ImageUpload>) {
        let req = RegisterRequest {
            username: self.take("username"),
            email: self.take("email"),
            password: self.take("password"),
        };
        (req, self.image)
    }

    pub fn into_update(mut self) -> (UpdateUserRequest, Option<ImageUpload>) {
        let req = UpdateUserRequest {
            email: self.take("email"),
            password: self.take("password"),
        };
        (req, self.image)
    }
}
