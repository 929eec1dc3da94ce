use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum AgendaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Other error: {0}")]
    Other(String),
}
