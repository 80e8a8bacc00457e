//! Platform identification and well-known paths.
//!
//! Release assets are published per os/arch pair using Go toolchain
//! naming, so the tags here must match the release pipeline exactly.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Name of the run file written by a registered service instance.
pub const RUN_FILE_NAME: &str = ".spore-drive.run";

/// Subdirectory of the user config dir holding the installed binary.
const INSTALL_SUBDIR: &str = "spore-drive";

/// Version stamp written next to the installed binary.
pub const STAMP_FILE_NAME: &str = "version.txt";

/// Release asset os tag for the running machine.
pub fn os_tag() -> Result<&'static str> {
    if cfg!(target_os = "macos") {
        Ok("darwin")
    } else if cfg!(target_os = "linux") {
        Ok("linux")
    } else if cfg!(target_os = "windows") {
        Ok("windows")
    } else {
        Err(unsupported())
    }
}

/// Release asset architecture tag for the running machine.
pub fn arch_tag() -> Result<&'static str> {
    if cfg!(target_arch = "x86_64") {
        Ok("amd64")
    } else if cfg!(target_arch = "aarch64") {
        Ok("arm64")
    } else {
        Err(unsupported())
    }
}

fn unsupported() -> Error {
    Error::UnsupportedPlatform {
        os: std::env::consts::OS.to_owned(),
        arch: std::env::consts::ARCH.to_owned(),
    }
}

/// Release archive file name for `version` on this machine.
pub fn asset_name(version: &str) -> Result<String> {
    Ok(format!(
        "spore-drive-service_{}_{}_{}.tar.gz",
        version,
        os_tag()?,
        arch_tag()?
    ))
}

/// File name of the service executable inside the release archive.
pub fn binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "drive.exe"
    } else {
        "drive"
    }
}

/// Directory the service binary is installed into.
pub fn install_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(Error::NoDirectory("config"))?;
    Ok(base.join(INSTALL_SUBDIR))
}

/// Directory the run file lives in.
pub fn run_file_dir() -> Result<PathBuf> {
    dirs::config_dir().ok_or(Error::NoDirectory("config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_name_matches_release_layout() {
        let name = asset_name("0.1.5").unwrap();
        assert!(name.starts_with("spore-drive-service_0.1.5_"));
        assert!(name.ends_with(".tar.gz"));
    }

    #[test]
    fn binary_name_is_platform_dependent() {
        let name = binary_name();
        assert!(name == "drive" || name == "drive.exe");
    }
}
