use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Read-back cap for serving an exported archive over HTTP
pub const DEFAULT_EXPORT_SIZE_LIMIT: u64 = 100_000 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Application root; upload and web directories are resolved against it
    pub system_path: PathBuf,
    pub upload_dir: String,
    pub web_dir: String,
    pub export_size_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub dev_auth_bypass: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let system_path = match env::var("SYSTEM_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => env::current_dir()?,
        };

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/aventyr.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            media: MediaConfig {
                system_path,
                upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "upload".to_string()),
                web_dir: env::var("WEB_DIR").unwrap_or_else(|_| "web".to_string()),
                export_size_limit: env::var("EXPORT_SIZE_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_EXPORT_SIZE_LIMIT),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
                dev_auth_bypass: is_truthy(&env::var("DEV_AUTH_BYPASS").unwrap_or_default()),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl MediaConfig {
    pub fn upload_root(&self) -> PathBuf {
        self.system_path.join(&self.upload_dir)
    }

    pub fn web_root(&self) -> PathBuf {
        self.system_path.join(&self.web_dir)
    }
}

pub fn is_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_values() {
        for v in ["1", "true", "YES", " y ", "On"] {
            assert!(is_truthy(v), "{} should be truthy", v);
        }
        for v in ["", "0", "false", "off", "nope"] {
            assert!(!is_truthy(v), "{} should not be truthy", v);
        }
    }

    #[test]
    fn test_media_roots() {
        let media = MediaConfig {
            system_path: PathBuf::from("/srv/app"),
            upload_dir: "upload".to_string(),
            web_dir: "web".to_string(),
            export_size_limit: DEFAULT_EXPORT_SIZE_LIMIT,
        };
        assert_eq!(media.upload_root(), PathBuf::from("/srv/app/upload"));
        assert_eq!(media.web_root(), PathBuf::from("/srv/app/web"));
        assert_eq!(DEFAULT_EXPORT_SIZE_LIMIT, 102_400_000);
    }
}
