use std::{env, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Process-wide settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub upload_dir: PathBuf,
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub model_token: Option<String>,
    pub input_op: String,
    pub output_op: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        let body_limit_bytes = {
            let raw = var("BODY_LIMIT_MB", "10");
            let invalid = || ConfigError::Invalid {
                name: "BODY_LIMIT_MB",
                expected: "size in megabytes",
                value: raw.clone(),
            };
            raw.parse::<usize>()
                .map_err(|_| invalid())?
                .checked_mul(1024 * 1024)
                .ok_or_else(invalid)?
        };

        let port = {
            let raw = var("PORT", "5000");
            raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "port number between 0 and 65535",
                value: raw.clone(),
            })?
        };

        Ok(Config {
            port,
            body_limit_bytes,
            upload_dir: var("UPLOAD_FOLDER", "static/uploads").into(),
            model_path: var("MODEL_PATH", "./model/frozen_graph.pb").into(),
            model_url: lookup("MODEL_URL").filter(|url| !url.is_empty()),
            model_token: lookup("MODEL_TOKEN").filter(|token| !token.is_empty()),
            input_op: var("MODEL_INPUT_OP", "x"),
            output_op: var("MODEL_OUTPUT_OP", "Identity"),
        })
    }
}
