use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::{
    async_trait,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Media purposes recognized by the store; one blob per (owner, purpose).
pub const MEDIA_KINDS: [&str; 4] = ["profile", "meal", "food", "plot"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub original_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Base64 data-URL payload, stored as-is.
    pub url: String,
    pub filename: String,
    pub mime_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Blob key-value store keyed by (owner id, purpose), upsert-by-replace.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn save(&self, record: &MediaRecord) -> anyhow::Result<()>;
    async fn get(&self, original_id: &str, kind: &str) -> anyhow::Result<Option<MediaRecord>>;
    async fn delete(&self, original_id: &str, kind: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct S3MediaStore {
    client: Client,
    bucket: String,
}

impl S3MediaStore {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: bucket.to_string(),
        })
    }
}

fn object_key(original_id: &str, kind: &str) -> String {
    format!("media/{kind}/{original_id}")
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn save(&self, record: &MediaRecord) -> anyhow::Result<()> {
        let created = record
            .created_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| record.created_at.to_string());
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key(&record.original_id, &record.kind))
            .body(ByteStream::from(record.url.clone().into_bytes()))
            .content_type(&record.mime_type)
            .metadata("filename", &record.filename)
            .metadata("created-at", created)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn get(&self, original_id: &str, kind: &str) -> anyhow::Result<Option<MediaRecord>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key(original_id, kind))
            .send()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(anyhow::Error::new(service_err).context("s3 get_object"));
            }
        };

        let mime_type = output
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let metadata = output.metadata().cloned().unwrap_or_default();
        let updated_at = output
            .last_modified()
            .and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.secs()).ok())
            .unwrap_or_else(OffsetDateTime::now_utc);
        let created_at = metadata
            .get("created-at")
            .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
            .unwrap_or(updated_at);

        let body = output.body.collect().await.context("s3 read body")?;
        let url = String::from_utf8(body.into_bytes().to_vec()).context("media payload utf8")?;

        Ok(Some(MediaRecord {
            original_id: original_id.to_string(),
            kind: kind.to_string(),
            url,
            filename: metadata.get("filename").cloned().unwrap_or_default(),
            mime_type,
            created_at,
            updated_at,
        }))
    }

    async fn delete(&self, original_id: &str, kind: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_key(original_id, kind))
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }
}

// --- HTTP surface ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/media", post(upload_media))
        .route("/media/:kind", get(get_media).delete(delete_media))
        // base64 payloads get large
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMediaRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub file: Option<String>,
    pub mime_type: Option<String>,
}

fn check_kind(kind: &str) -> Result<(), ApiError> {
    if MEDIA_KINDS.contains(&kind) {
        Ok(())
    } else {
        Err(ApiError::validation(format!("unknown media type: {kind}")))
    }
}

#[instrument(skip(state, payload))]
async fn upload_media(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UploadMediaRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let mut missing = Vec::new();
    if payload.kind.is_none() {
        missing.push("type");
    }
    if payload.file.is_none() {
        missing.push("file");
    }
    if !missing.is_empty() {
        return Err(ApiError::validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let kind = payload.kind.unwrap_or_default();
    check_kind(&kind)?;

    let now = OffsetDateTime::now_utc();
    let record = MediaRecord {
        original_id: user_id.to_string(),
        filename: format!("{}_{}_{}", kind, user_id, now.unix_timestamp()),
        kind,
        url: payload.file.unwrap_or_default(),
        mime_type: payload.mime_type.unwrap_or_else(|| "image/jpeg".into()),
        created_at: now,
        updated_at: now,
    };
    state.media.save(&record).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": record })),
    ))
}

#[instrument(skip(state))]
async fn get_media(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(kind): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    check_kind(&kind)?;
    let record = state
        .media
        .get(&user_id.to_string(), &kind)
        .await?
        .ok_or_else(|| ApiError::not_found("media not found"))?;
    Ok(Json(json!({ "success": true, "data": record })))
}

#[instrument(skip(state))]
async fn delete_media(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(kind): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    check_kind(&kind)?;
    let owner = user_id.to_string();
    if state.media.get(&owner, &kind).await?.is_none() {
        return Err(ApiError::not_found("media not found"));
    }
    state.media.delete(&owner, &kind).await?;
    Ok(Json(json!({ "success": true, "message": "media deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_scoped_by_purpose() {
        assert_eq!(object_key("u1", "profile"), "media/profile/u1");
        assert_ne!(object_key("u1", "profile"), object_key("u1", "meal"));
    }

    #[test]
    fn unknown_media_kind_is_rejected() {
        assert!(check_kind("profile").is_ok());
        assert!(check_kind("banner").is_err());
    }

    #[test]
    fn media_record_serializes_camel_case() {
        let now = OffsetDateTime::now_utc();
        let record = MediaRecord {
            original_id: "u1".into(),
            kind: "profile".into(),
            url: "data:image/jpeg;base64,AAAA".into(),
            filename: "profile_u1_0".into(),
            mime_type: "image/jpeg".into(),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "profile");
        assert_eq!(value["originalId"], "u1");
        assert_eq!(value["mimeType"], "image/jpeg");
    }
}
