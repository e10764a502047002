//! Error types shared by the store, the resolver and the loaders.

use crate::smiles::SmilesError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The structure token could not be parsed. Only ever seen by callers of the
    /// canonicalizer directly; the resolver swallows it.
    #[error("SMILES rejected: {0}")]
    Smiles(#[from] SmilesError),

    /// Both the structure path and the name path came up empty.
    #[error("Cannot resolve: {0}")]
    NotResolvable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Timed out waiting for lease {0:?}")]
    LockTimeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Fetch failed for {location}: {reason}")]
    Fetch { location: String, reason: String },

    /// Only http(s) locations are accepted from clients.
    #[error("Unsupported location: {0}")]
    UnsupportedLocation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Table error: {0}")]
    Table(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Error {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Error {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Error {
        Error::Config(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Error {
        Error::Table(e.to_string())
    }
}

impl Error {

    /// True for failures that should reach a client as "not found" rather than
    /// as an internal error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotResolvable(_) | Error::NotFound(_))
    }
}
