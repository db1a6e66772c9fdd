use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::StorageConfig;

const PROFILE_IMAGE_PREFIX: &str = "profile-images";

/// Object store holding profile images.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;

    /// Base every public object URL starts with (no trailing slash).
    fn public_base(&self) -> &str;

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base(), key)
    }

    /// Key of an object previously returned by [`StorageClient::public_url`].
    fn key_for_url(&self, url: &str) -> Option<String> {
        key_from_url(self.public_base(), url)
    }
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    public_base: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let mut loader =
            defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        }
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let mut conf = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &cfg.endpoint {
            conf = conf.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(conf.build()),
            bucket: cfg.bucket.clone(),
            public_base: cfg.public_base(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }
}

/// Generates a fresh object key for an uploaded profile image.
pub fn profile_image_key(file_name: &str) -> String {
    format!(
        "{}/{}_{}",
        PROFILE_IMAGE_PREFIX,
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(name: &str) -> String {
    // browsers may send a full client-side path
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

fn key_from_url(base: &str, url: &str) -> Option<String> {
    let key = url.strip_prefix(base)?.strip_prefix('/')?;
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}
