use std::env;
use std::path::PathBuf;

pub const DEV_JWT_SECRET: &str = "change-me-in-production";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub token_expiry_minutes: i64,
    pub bcrypt_cost: u32,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_path: "documents.db".to_string(),
            upload_dir: PathBuf::from("uploads"),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_expiry_minutes: 30,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads overrides from the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` yields. Values that fail to
    /// parse keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("HOST") {
            config.host = v;
        }
        if let Some(v) = lookup("PORT") {
            config.port = v.parse().unwrap_or(config.port);
        }
        if let Some(v) = lookup("DATABASE_PATH") {
            config.database_path = v;
        }
        if let Some(v) = lookup("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("JWT_SECRET") {
            config.jwt_secret = v;
        }
        if let Some(v) = lookup("ACCESS_TOKEN_EXPIRE_MINUTES") {
            config.token_expiry_minutes = v.parse().unwrap_or(config.token_expiry_minutes);
        }
        if let Some(v) = lookup("BCRYPT_COST") {
            config.bcrypt_cost = v.parse().unwrap_or(config.bcrypt_cost);
        }
        if let Some(v) = lookup("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = v.parse().unwrap_or(config.max_upload_bytes);
        }

        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
