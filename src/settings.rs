//! Client settings loaded from a TOML file.
//!
//! Everything here has a sensible default; a settings file only exists to
//! pin a service version or to relocate the install and run-file
//! directories (useful in tests and sandboxed environments).

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

const DEFAULT_SERVICE_VERSION: &str = "0.1.5";
const DEFAULT_RELEASE_BASE_URL: &str =
    "https://github.com/taubyte/spore-drive/releases/download";

/// Represents the top-level settings loaded from a TOML file.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
    /// Service release to provision, e.g. `0.1.5`.
    pub version: String,
    /// Base URL release assets are fetched from.
    pub release_base_url: String,
    /// Overrides the platform install directory for the service binary.
    pub install_dir: Option<PathBuf>,
    /// Overrides the directory holding the run file.
    pub run_file_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            version: DEFAULT_SERVICE_VERSION.to_owned(),
            release_base_url: DEFAULT_RELEASE_BASE_URL.to_owned(),
            install_dir: None,
            run_file_dir: None,
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut buf = String::new();
        let mut rdr = reader;
        rdr.read_to_string(&mut buf)?;
        Ok(toml::from_str(&buf)?)
    }

    /// Full download URL of the release asset for the given file name.
    pub fn asset_url(&self, asset: &str) -> String {
        format!("{}/v{}/{}", self.release_base_url, self.version, asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let settings = Settings::from_reader("version = \"0.2.0\"\n".as_bytes()).unwrap();
        assert_eq!(settings.version, "0.2.0");
        assert_eq!(settings.release_base_url, DEFAULT_RELEASE_BASE_URL);
        assert!(settings.install_dir.is_none());
    }

    #[test]
    fn empty_input_yields_defaults() {
        let settings = Settings::from_reader("".as_bytes()).unwrap();
        assert_eq!(settings.version, DEFAULT_SERVICE_VERSION);
    }

    #[test]
    fn asset_url_includes_version_tag() {
        let settings = Settings::default();
        assert_eq!(
            settings.asset_url("spore-drive-service_0.1.5_linux_amd64.tar.gz"),
            "https://github.com/taubyte/spore-drive/releases/download/v0.1.5/spore-drive-service_0.1.5_linux_amd64.tar.gz"
        );
    }
}
