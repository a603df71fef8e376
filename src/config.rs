use std::env;
use std::path::PathBuf;

use crate::error::Error;

pub const APP_TITLE: &str = "LAN Media Server";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory whose files are served. Created on startup if missing.
    pub root: PathBuf,
    /// List files in subdirectories too, named by their relative path.
    pub recursive_listing: bool,
    pub title: String,
}

impl ServerConfig {
    /// Defaults for everything but the media root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            root: root.into(),
            recursive_listing: false,
            title: APP_TITLE.into(),
        }
    }

    pub fn from_env() -> Result<Self, Error> {
        dotenvy::dotenv().ok();

        let root = PathBuf::from(env::var("MEDIA_ROOT").unwrap_or_else(|_| "files".into()));
        let mut config = Self::new(root);

        if let Ok(host) = env::var("MEDIA_HOST") {
            config.host = host;
        }

        if let Ok(port) = env::var("MEDIA_PORT") {
            config.port = port
                .parse()
                .map_err(|err| Error::Config(format!("invalid MEDIA_PORT: {err}")))?;
        }

        if let Ok(recursive) = env::var("MEDIA_RECURSIVE") {
            config.recursive_listing = recursive
                .parse::<bool>()
                .map_err(|err| Error::Config(format!("invalid MEDIA_RECURSIVE: {err}")))?;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
