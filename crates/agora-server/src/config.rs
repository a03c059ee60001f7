//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use agora_shared::constants;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP/WebSocket (axum) server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DATABASE_PATH`
    /// Default: `./agora.db`
    pub database_path: PathBuf,

    /// Filesystem path where attachment files are stored.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./media`
    pub media_storage_path: PathBuf,

    /// Public base URL prefixed to attachment paths in broadcast records.
    /// Env: `PUBLIC_DOMAIN`
    /// Default: `http://localhost:8080`
    pub public_domain: String,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Agora Node"`
    pub instance_name: String,

    /// Maximum post length in characters, after trimming.
    /// Env: `MAX_POST_CHARS`
    pub max_post_chars: usize,

    /// Maximum number of attachments per post.
    /// Env: `MAX_ATTACHMENTS`
    pub max_attachments: usize,

    /// Maximum attachment size in bytes.
    /// Env: `MAX_ATTACHMENT_BYTES`
    pub max_attachment_bytes: usize,

    /// Media types accepted for attachments.
    /// Env: `ALLOWED_MEDIA_TYPES` (comma-separated)
    pub allowed_media_types: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], constants::DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./agora.db"),
            media_storage_path: PathBuf::from("./media"),
            public_domain: constants::DEFAULT_PUBLIC_DOMAIN.to_string(),
            instance_name: "Agora Node".to_string(),
            max_post_chars: constants::MAX_POST_CHARS,
            max_attachments: constants::MAX_ATTACHMENTS,
            max_attachment_bytes: constants::MAX_ATTACHMENT_BYTES,
            allowed_media_types: constants::ALLOWED_MEDIA_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("MEDIA_STORAGE_PATH") {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Ok(domain) = std::env::var("PUBLIC_DOMAIN") {
            config.public_domain = domain.trim_end_matches('/').to_string();
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("MAX_POST_CHARS") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_post_chars = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_POST_CHARS, using default"),
            }
        }

        if let Ok(val) = std::env::var("MAX_ATTACHMENTS") {
            match val.parse::<usize>() {
                Ok(n) => config.max_attachments = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_ATTACHMENTS, using default"),
            }
        }

        if let Ok(val) = std::env::var("MAX_ATTACHMENT_BYTES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_attachment_bytes = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_ATTACHMENT_BYTES, using default"),
            }
        }

        if let Ok(val) = std::env::var("ALLOWED_MEDIA_TYPES") {
            let types: Vec<String> = val
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if types.is_empty() {
                tracing::warn!(value = %val, "Empty ALLOWED_MEDIA_TYPES, using default");
            } else {
                config.allowed_media_types = types;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Whether a declared media type is on the allow-list.
    pub fn is_allowed_media_type(&self, media_type: &str) -> bool {
        self.allowed_media_types.iter().any(|t| t == media_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.max_attachments, constants::MAX_ATTACHMENTS);
        assert!(config.is_allowed_media_type("image/jpeg"));
        assert!(!config.is_allowed_media_type("application/pdf"));
    }
}
