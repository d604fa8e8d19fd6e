use std::{env, path::PathBuf};

use thiserror::Error;
use url::Url;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 3001;

/// The default size limit of uploaded files, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got \"{value}\"")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// The origin allowed to make cross-origin requests. Any origin if `None`.
    pub client_url: Option<String>,
    /// Where uploaded files are stored
    pub upload_dir: PathBuf,
    /// The address uploaded files are publicly served from, without a trailing slash
    pub public_url: String,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Reads the configuration from `PARLOR_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PARLOR_SERVER_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PARLOR_SERVER_PORT",
                expected: "a port number",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let max_upload_bytes = match lookup("PARLOR_MAX_UPLOAD_BYTES") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PARLOR_MAX_UPLOAD_BYTES",
                expected: "a number of bytes",
                value,
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let client_url = lookup("PARLOR_CLIENT_URL")
            .map(|value| parse_url("PARLOR_CLIENT_URL", value))
            .transpose()?;

        let public_url = lookup("PARLOR_PUBLIC_URL")
            .map(|value| parse_url("PARLOR_PUBLIC_URL", value))
            .transpose()?
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let upload_dir = lookup("PARLOR_UPLOAD_DIR")
            .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())
            .into();

        Ok(Self {
            port,
            client_url,
            upload_dir,
            public_url,
            max_upload_bytes,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            client_url: None,
            upload_dir: DEFAULT_UPLOAD_DIR.into(),
            public_url: format!("http://localhost:{}", DEFAULT_PORT),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn parse_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    match Url::parse(&value) {
        Ok(_) => Ok(value.trim_end_matches('/').to_string()),
        Err(_) => Err(ConfigError::Invalid {
            name,
            expected: "a URL",
            value,
        }),
    }
}
