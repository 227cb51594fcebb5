use std::error::Error;
use std::fmt;

/// Unified application error for startup and outbound plumbing.
///
/// Queue operations have their own taxonomy in [`crate::queue::QueueError`];
/// this type covers everything around them (config, gateway transport,
/// storage bootstrap) so the binary fails in a predictable way.
#[derive(Debug)]
pub enum AppError {
    Config(String),
    Network(String),
    Storage(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Config error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl Error for AppError {}
