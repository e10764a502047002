use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::time::Duration;

use crate::error::Result;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Where the ChEBI store is persisted between runs, if anywhere.
    pub snapshot: Option<String>,
    pub chebi_url: String,
    pub chemblntd_url: String,
    pub lease_seconds: u64,
    pub lease_wait_seconds: u64,
    pub batch_size: usize,
    /// Rows sampled when guessing a table's column types.
    pub sample_size: usize,
    pub load_on_startup: bool,
}

impl Default for ServiceConfig {

    fn default() -> Self {
        return Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            snapshot: None,
            chebi_url: "https://swami.wustl.edu/~jswami/chebi.msgpack.gz".to_string(),
            chemblntd_url: "https://ftp.ebi.ac.uk/pub/databases/chembl/ChEMBLNTD/set7_harvard_liver/Harvard_ALL.csv".to_string(),
            lease_seconds: 30,
            lease_wait_seconds: 60,
            batch_size: 64,
            sample_size: 25,
            load_on_startup: false,
        }
    }
}

impl ServiceConfig {

    pub fn from_file(filename: &str) -> Result<Self> {

        let serialized = std::fs::read_to_string(filename)?;

        let deserialized: Self = serde_yaml::from_str(&serialized)?;

        return Ok(deserialized);
    }

    pub fn to_file(&self, filename: &str) -> Result<()> {

        let serialized = serde_yaml::to_string(&self)?;
        let mut file = File::create(filename)?;

        file.write_all(serialized.as_bytes())?;
        return Ok(());
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_seconds)
    }

    pub fn lease_wait(&self) -> Duration {
        Duration::from_secs(self.lease_wait_seconds)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "port: 8080\nsnapshot: /var/lib/chebi.msgpack\n").unwrap();

        let config = ServiceConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.snapshot.as_deref(), Some("/var/lib/chebi.msgpack"));
        assert_eq!(config.lease_seconds, 30);
        assert_eq!(config.address(), "127.0.0.1:8080");
    }

    #[test]
    fn write_then_read() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let path = path.to_str().unwrap();

        let mut config = ServiceConfig::default();
        config.load_on_startup = true;
        config.to_file(path).unwrap();

        assert_eq!(ServiceConfig::from_file(path).unwrap(), config);
    }

    #[test]
    fn bad_yaml_is_a_config_error() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "port: [not a port]\n").unwrap();

        let err = ServiceConfig::from_file(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }
}
