//! Process configuration from the environment.
//!
//! The listen port is the only setting. A `.env` file in the working
//! directory is honoured when present.

use std::env;

use crate::signaling::{DEFAULT_SIGNALING_PORT, SignalingError};

const LISTEN_HOST: &str = "0.0.0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_SIGNALING_PORT,
        }
    }
}

impl Config {
    /// Read `PORT`, loading `.env` first if there is one.
    pub fn from_env() -> Result<Self, SignalingError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SignalingError> {
        let port = match lookup("PORT").filter(|p| !p.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| SignalingError::Config(format!("PORT={:?}: {}", raw, e)))?,
            None => DEFAULT_SIGNALING_PORT,
        };

        Ok(Self { port })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", LISTEN_HOST, self.port)
    }
}
