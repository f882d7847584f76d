// src/error.rs
use std::io;
use thiserror::Error;

// Re-export anyhow's Result type
pub use anyhow::Result;

/// Custom Error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Config error: {0}")]
    Config(String),
}
