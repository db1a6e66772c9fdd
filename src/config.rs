use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    /// Upper bound for token lifetime: one year.
    pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

    pub fn ttl(&self) -> Duration {
        let minutes = self.ttl_minutes.clamp(1, Self::MAX_TTL_MINUTES);
        Duration::from_secs(minutes as u64 * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// S3-compatible endpoint (MinIO, GCS interop, ...). `None` means AWS.
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub public_url: Option<String>,
}

impl StorageConfig {
    /// Base that public object URLs are built from.
    pub fn public_base(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub max_upload_bytes: usize,
    /// Require a bearer token for the same user on PATCH/DELETE `/users/:id`.
    pub protect_user_mutations: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "userbase".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "userbase-clients".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60).clamp(1, JwtConfig::MAX_TTL_MINUTES),
        };
        let storage = StorageConfig {
            bucket: std::env::var("STORAGE_BUCKET").context("STORAGE_BUCKET must be set")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint: non_empty_var("STORAGE_ENDPOINT"),
            access_key: non_empty_var("STORAGE_ACCESS_KEY"),
            secret_key: non_empty_var("STORAGE_SECRET_KEY"),
            public_url: non_empty_var("STORAGE_PUBLIC_URL"),
        };
        Ok(Self {
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            storage,
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            protect_user_mutations: parse_or("PROTECT_USER_MUTATIONS", false),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
