use serde::Deserialize;
use tracing::info;

use crate::{error::AppErr, session::SessionLimits};

/// Service configuration, read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Comma separated list of origins allowed by CORS.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    #[serde(default = "default_min_username_len")]
    pub min_username_len: usize,

    #[serde(default = "default_min_room_id_len")]
    pub min_room_id_len: usize,
}

impl Config {
    pub fn load() -> Result<Self, AppErr> {
        let config = envy::from_env::<Config>()?;
        info!(host = %config.host, port = config.port, "configuration loaded");
        Ok(config)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            min_username_len: self.min_username_len,
            min_room_id_len: self.min_room_id_len,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origins() -> String {
    "http://localhost:5173".to_string()
}

fn default_min_username_len() -> usize {
    SessionLimits::default().min_username_len
}

fn default_min_room_id_len() -> usize {
    SessionLimits::default().min_room_id_len
}
