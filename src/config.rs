use clap::Parser;
use serde::Deserialize;

use crate::catalog::PriorityClass;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "quota-gate")]
#[command(about = "Per-API-key request/token quota gate")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8086)]
    pub port: u16,

    // Path to the rate limit configuration file
    #[arg(short, long, default_value = "configs/config.yaml")]
    pub config: String,

    // Workers draining the immediate/delayed dispatch queue
    #[arg(long, default_value_t = 4)]
    pub dispatch_workers: usize,

    // Workers draining the background dispatch queue
    #[arg(long, default_value_t = 1)]
    pub background_workers: usize,

    // Capacity of each dispatch queue
    #[arg(long, default_value_t = 100)]
    pub dispatch_queue: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

// Top-level configuration file structure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub rate_limits: Vec<RateLimit>,
}

// Rate limiting configuration for one API key
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub api_key: String,
    // Omitted in the file -> default class (processed inline at dispatch)
    #[serde(default)]
    pub priority: PriorityClass,
    pub endpoints: Vec<EndpointConfig>,
}

// Limits for a specific endpoint path
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub path: String,
    pub rpm: u32,
    pub tpm: u32,
}

impl Configuration {
    // Read and parse the YAML configuration file, once at startup
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;

        serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }
}
