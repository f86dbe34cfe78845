//! Configuration management for loaderkit
//!
//! This crate provides the file-backed configuration consumed by the
//! execution driver: program identities, opcode assignments, step
//! budget, and retry policy. Every identity is an explicit value loaded
//! from the file or from the environment, never ambient state.

/// Error types for the configuration module
pub mod error;

use std::{env, fs, path::Path};

use loaderkit_driver::{AccountId, DriverConfig, DriverConfigBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// The [`Configuration`] struct represents the on-disk configuration of
/// a loaderkit deployment. Identities are hex-encoded 32-byte account
/// ids; everything else carries defaults matching a stock deployment.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Configuration {
    /// Hex-encoded identity of the executing program
    pub executor: String,

    /// Hex-encoded identity of the paying account
    pub payer: String,

    /// Hex-encoded identity of the envelope verifier program, if any
    pub verifier: Option<String>,

    /// Opcode tag selecting "initiate bounded execution"
    pub initiate_opcode: u8,

    /// Opcode tag selecting "continue bounded execution"
    pub continue_opcode: u8,

    /// First byte of the terminal log entry signalling completion
    pub done_tag: u8,

    /// Maximum execution steps per round
    pub step_budget: u64,

    /// Capacity in bytes of newly allocated session scratch storage
    pub scratch_capacity: u64,

    /// Additional submission attempts after a transport timeout
    pub retry_attempts: usize,

    /// Fixed interval between retry attempts, in milliseconds
    pub retry_interval_ms: u64,

    /// Optional cap on rounds per execution
    pub max_rounds: Option<u64>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            executor: String::new(),
            payer: String::new(),
            verifier: None,
            initiate_opcode: 0x09,
            continue_opcode: 0x0a,
            done_tag: 0x06,
            step_budget: 100,
            scratch_capacity: 128 * 1024,
            retry_attempts: 3,
            retry_interval_ms: 200,
            max_rounds: None,
        }
    }
}

impl Configuration {
    /// Loads the configuration from the given TOML file, then applies
    /// environment overrides (`LOADERKIT_EXECUTOR`, `LOADERKIT_PAYER`,
    /// `LOADERKIT_VERIFIER`). A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| Error::Generic(format!("failed to read config file: {e}")))?;
            toml::from_str(&contents)
                .map_err(|e| Error::ParseError(format!("failed to parse config file: {e}")))?
        } else {
            debug!("no config file at {}, using defaults", path.display());
            Configuration::default()
        };

        if let Ok(executor) = env::var("LOADERKIT_EXECUTOR") {
            debug!("overriding executor from environment");
            config.executor = executor;
        }
        if let Ok(payer) = env::var("LOADERKIT_PAYER") {
            debug!("overriding payer from environment");
            config.payer = payer;
        }
        if let Ok(verifier) = env::var("LOADERKIT_VERIFIER") {
            debug!("overriding verifier from environment");
            config.verifier = Some(verifier);
        }

        Ok(config)
    }

    /// Saves the configuration to the given path.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let contents = toml::to_string(self)
            .map_err(|e| Error::ParseError(format!("failed to serialize config: {e}")))?;
        fs::write(path, contents)
            .map_err(|e| Error::Generic(format!("failed to write config file: {e}")))?;
        Ok(())
    }

    /// Bridges the file-level configuration into a [`DriverConfig`],
    /// parsing the hex identities.
    pub fn to_driver_config(&self) -> Result<DriverConfig, Error> {
        let mut builder = DriverConfigBuilder::default();
        builder
            .executor(parse_account_id("executor", &self.executor)?)
            .payer(parse_account_id("payer", &self.payer)?)
            .initiate_opcode(self.initiate_opcode)
            .continue_opcode(self.continue_opcode)
            .done_tag(self.done_tag)
            .step_budget(self.step_budget)
            .scratch_capacity(self.scratch_capacity)
            .retry_attempts(self.retry_attempts)
            .retry_interval_ms(self.retry_interval_ms)
            .max_rounds(self.max_rounds);

        if let Some(verifier) = &self.verifier {
            builder.verifier(Some(parse_account_id("verifier", verifier)?));
        }

        builder.build().map_err(|e| Error::Generic(format!("invalid driver config: {e}")))
    }
}

/// Parses a hex-encoded 32-byte account identity.
fn parse_account_id(name: &str, value: &str) -> Result<AccountId, Error> {
    let bytes = hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| Error::ParseError(format!("{name} is not valid hex: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::ParseError(format!("{name} must be exactly 32 bytes")))?;
    Ok(AccountId(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    #[serial]
    fn test_save_load_roundtrip() {
        let path = temp_path("loaderkit-config-roundtrip.toml");
        let mut config = Configuration::default();
        config.executor = "ee".repeat(32);
        config.step_budget = 500;
        config.save(&path).expect("should save");

        let loaded = Configuration::load(&path).expect("should load");
        assert_eq!(loaded, config);

        fs::remove_file(&path).expect("should clean up");
    }

    #[test]
    #[serial]
    fn test_missing_file_yields_defaults() {
        let loaded =
            Configuration::load(Path::new("/nonexistent/loaderkit.toml")).expect("should load");
        assert_eq!(loaded, Configuration::default());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        let path = temp_path("loaderkit-config-env.toml");
        Configuration::default().save(&path).expect("should save");

        env::set_var("LOADERKIT_EXECUTOR", "ab".repeat(32));
        let loaded = Configuration::load(&path).expect("should load");
        env::remove_var("LOADERKIT_EXECUTOR");

        assert_eq!(loaded.executor, "ab".repeat(32));

        fs::remove_file(&path).expect("should clean up");
    }

    #[test]
    #[serial]
    fn test_to_driver_config() {
        let mut config = Configuration::default();
        config.executor = "ee".repeat(32);
        config.payer = "01".repeat(32);
        config.verifier = Some(format!("0x{}", "cc".repeat(32)));

        let driver = config.to_driver_config().expect("should bridge");
        assert_eq!(driver.executor, AccountId([0xee; 32]));
        assert_eq!(driver.payer, AccountId([0x01; 32]));
        assert_eq!(driver.verifier, Some(AccountId([0xcc; 32])));
        assert_eq!(driver.step_budget, 100);
    }

    #[test]
    #[serial]
    fn test_rejects_malformed_identities() {
        let mut config = Configuration::default();
        config.executor = "not hex".to_string();
        assert!(matches!(config.to_driver_config(), Err(Error::ParseError(_))));

        config.executor = "abcd".to_string();
        assert!(matches!(config.to_driver_config(), Err(Error::ParseError(_))));
    }
}
