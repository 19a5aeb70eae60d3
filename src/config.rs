use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub model_api_url: String,
    pub clarifai_pat: Option<String>,
    pub nutrition_api_key: Option<String>,
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "glucolog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "glucolog-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
        };
        Ok(Self {
            database_url,
            jwt,
            model_api_url: std::env::var("MODEL_API_URL")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            clarifai_pat: std::env::var("CLARIFAI_PAT").ok(),
            nutrition_api_key: std::env::var("NINJA_CALORIE_API_KEY").ok(),
            minio_endpoint: std::env::var("MINIO_ENDPOINT")
                .context("MINIO_ENDPOINT must be set")?,
            minio_bucket: std::env::var("MINIO_BUCKET").context("MINIO_BUCKET must be set")?,
            minio_access_key: std::env::var("MINIO_ACCESS_KEY")
                .context("MINIO_ACCESS_KEY must be set")?,
            minio_secret_key: std::env::var("MINIO_SECRET_KEY")
                .context("MINIO_SECRET_KEY must be set")?,
        })
    }
}
