use std::fs;
use std::path::{Path, PathBuf};

use telemvault_attest::TrustedOracleKeys;

/// Daemon-level configuration resolved from CLI arguments before the
/// service starts.
#[derive(Debug)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub trusted_keys: TrustedOracleKeys,
}

impl DaemonConfig {
    /// Without a key file the daemon still serves the data-entry
    /// surface, but every callback fails proof verification.
    pub fn load(
        data_dir: impl AsRef<Path>,
        trusted_keys_path: Option<impl AsRef<Path>>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let trusted_keys = if let Some(path) = trusted_keys_path {
            let payload = fs::read(path)?;
            TrustedOracleKeys::from_json(&payload)?
        } else {
            TrustedOracleKeys::new()
        };

        Ok(Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            trusted_keys,
        })
    }
}
