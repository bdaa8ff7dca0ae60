//! Error types for queue participants and configuration

use std::path::PathBuf;
use thiserror::Error;

use crate::participant::Role;

/// Errors reported synchronously when building participants or loading config
#[derive(Debug, Error)]
pub enum Error {
    #[error("{role} polling interval must be greater than zero")]
    InvalidInterval { role: Role },

    #[error("{what} count must be at least 1")]
    InvalidCount { what: &'static str },

    #[error("Failed to read config {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_interval_message() {
        let err = Error::InvalidInterval { role: Role::Consumer };
        assert_eq!(err.to_string(), "consumer polling interval must be greater than zero");
    }

    #[test]
    fn test_invalid_count_message() {
        let err = Error::InvalidCount { what: "producer" };
        assert!(err.to_string().contains("producer"));
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_config_read_keeps_source() {
        use std::error::Error as _;

        let err = Error::ConfigRead {
            path: PathBuf::from("/nope/pcqueue.yml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nope/pcqueue.yml"));
        assert!(err.source().is_some());
    }
}
