use std::path::PathBuf;

use serde::Deserialize;

/// Name of the durable collection inside the working directory
pub const TXSTORE_FILENAME: &str = "txstore.db";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TxStoreConfig {
    pub workdir: PathBuf,
    /// Keep everything in memory and discard it on drop. Ephemeral and test use only.
    pub in_memory: bool,
    /// Flush to disk after every mutation before reporting success
    pub sync_writes: bool,
}

impl Default for TxStoreConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("/tmp/relay"),
            in_memory: false,
            sync_writes: true,
        }
    }
}

impl TxStoreConfig {
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Default::default()
        }
    }

    pub fn at(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Default::default()
        }
    }

    /// Location of the durable collection, `None` when running in memory
    pub fn store_path(&self) -> Option<PathBuf> {
        (!self.in_memory).then(|| self.workdir.join(TXSTORE_FILENAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_path_follows_workdir() {
        let config = TxStoreConfig::at("/var/lib/relay");
        assert_eq!(
            config.store_path(),
            Some(PathBuf::from("/var/lib/relay/txstore.db"))
        );
        assert_eq!(TxStoreConfig::in_memory().store_path(), None);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: TxStoreConfig = serde_json::from_str(r#"{"in_memory": true}"#).unwrap();
        assert!(config.in_memory);
        assert!(config.sync_writes);
        assert_eq!(config.workdir, PathBuf::from("/tmp/relay"));
    }
}
