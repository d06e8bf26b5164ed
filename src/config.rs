//! On-disk device configuration (ambient stack): identity, country, and the
//! persisted credential blob a session is built from. Mirrors the teacher's
//! `user_config.rs` `get_or_build_paths`/`load_config` shape — `~/.config/<app>`,
//! YAML on disk — generalized from the TUI's keybindings/theme file to this
//! daemon's device identity file.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".config";
const APP_CONFIG_DIR: &str = "spotconnectd";
const FILE_NAME: &str = "config.yml";

/// Persisted identity and credential for one speaker (§3 Device info,
/// §4.B Credential blob). `encrypted_auth_blob` is the base64 form produced
/// by the official client and decoded via
/// [`crate::auth::blob::decode_encrypted_auth_blob`] at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    pub device_name: String,
    pub client_id: String,
    pub username: String,
    pub country: String,
    pub encrypted_auth_blob: Option<String>,
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
}

fn default_bitrate() -> u32 {
    160
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            device_name: "spotconnectd".to_string(),
            client_id: String::new(),
            username: String::new(),
            country: "US".to_string(),
            encrypted_auth_blob: None,
            bitrate: default_bitrate(),
        }
    }
}

impl DeviceConfig {
    /// Reads and parses the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Serializes `self` as YAML and writes it to `path`, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml).with_context(|| format!("writing config file {}", path.display()))
    }
}

/// `~/.config/spotconnectd/config.yml`, creating the directories if absent
/// (§ ambient config, mirrors `UserConfig::get_or_build_paths`).
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("no $HOME directory found for device config"))?;
    let app_config_dir = home.join(CONFIG_DIR).join(APP_CONFIG_DIR);
    if !app_config_dir.exists() {
        fs::create_dir_all(&app_config_dir)
            .with_context(|| format!("creating config directory {}", app_config_dir.display()))?;
    }
    Ok(app_config_dir.join(FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_yaml() {
        let mut config = DeviceConfig::default();
        config.device_id = "deadbeef".into();
        config.username = "someone".into();

        let dir = std::env::temp_dir().join(format!("spotconnectd-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("device.yml");

        config.save(&path).unwrap();
        let loaded = DeviceConfig::load(&path).unwrap();

        assert_eq!(loaded.device_id, "deadbeef");
        assert_eq!(loaded.username, "someone");
        assert_eq!(loaded.bitrate, 160);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_field_falls_back_to_bitrate_default() {
        let yaml = "device_id: x\ndevice_name: y\nclient_id: c\nusername: u\ncountry: US\n";
        let config: DeviceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bitrate, 160);
    }
}
