//! Runtime settings and path resolution
//!
//! `Settings` is built once by the binary (defaults, then an optional TOML
//! file, then command-line / environment overrides) and handed to every
//! component that needs a path or a tunable. Nothing reads it from a global.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::error::{BurrowError, Result};

/// Name of the registry document inside the data directory.
pub const REGISTRY_FILE_NAME: &str = "containers.json";

/// Name of the optional settings file inside the config directory.
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Holds the registry document and per-container user data.
    pub data_dir: PathBuf,
    /// LXC path under which container root filesystems live.
    pub container_dir: PathBuf,
    /// Per-user LXC configuration directory (`default.conf`).
    pub lxc_config_dir: PathBuf,
    /// Extra LXC config included by every container, if present on the host.
    pub lxc_include: Option<PathBuf>,

    pub start_timeout_secs: u64,
    pub network_timeout_secs: u64,

    pub bridge: String,
    pub bridge_quota: u32,
    pub subid_start: u32,
    pub subid_count: u32,
    pub subuid_file: PathBuf,
    pub usernet_file: PathBuf,

    /// Distribution family passed to the download template.
    pub image_distribution: String,
    /// Package installed during provisioning to host X11 applications.
    pub window_manager: String,
}

impl Default for Settings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| home.join(".local/share"))
            .join("burrow");
        let container_dir = dirs::cache_dir()
            .unwrap_or_else(|| home.join(".cache"))
            .join("burrow-container");
        let lxc_config_dir = dirs::config_dir()
            .unwrap_or_else(|| home.join(".config"))
            .join("lxc");

        Self {
            data_dir,
            container_dir,
            lxc_config_dir,
            lxc_include: Some(PathBuf::from("/usr/share/burrow/burrow-lxc.conf")),
            start_timeout_secs: 10,
            network_timeout_secs: 30,
            bridge: "lxcbr0".to_string(),
            bridge_quota: 10,
            subid_start: 100_000,
            subid_count: 65_536,
            subuid_file: PathBuf::from("/etc/subuid"),
            usernet_file: PathBuf::from("/etc/lxc/lxc-usernet"),
            image_distribution: "ubuntu".to_string(),
            window_manager: "matchbox".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default config location when
    /// `path` is `None`. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_file() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(BurrowError::ConfigError(format!(
                    "settings file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        debug!("loading settings from {}", path.display());
        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
            .map_err(|e| BurrowError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn default_file() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("burrow").join(SETTINGS_FILE_NAME))
    }

    /// Point the data directory somewhere else. Unless `container_dir` is
    /// also given, containers move along with it.
    pub fn override_dirs(&mut self, data_dir: Option<PathBuf>, container_dir: Option<PathBuf>) {
        if let Some(data_dir) = data_dir {
            self.container_dir = data_dir.join("containers");
            self.data_dir = data_dir;
        }
        if let Some(container_dir) = container_dir {
            self.container_dir = container_dir;
        }
    }

    pub fn registry_file(&self) -> PathBuf {
        self.data_dir.join(REGISTRY_FILE_NAME)
    }

    pub fn container_root(&self) -> &Path {
        &self.container_dir
    }

    /// Directory bind-mounted as the home directory of container `id`.
    pub fn user_data_dir(&self, id: &str) -> PathBuf {
        self.data_dir.join("user-data").join(id)
    }

    pub fn lxc_default_conf(&self) -> PathBuf {
        self.lxc_config_dir.join("default.conf")
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_timeouts() {
        let settings = Settings::default();
        assert_eq!(settings.start_timeout(), Duration::from_secs(10));
        assert_eq!(settings.network_timeout(), Duration::from_secs(30));
        assert_eq!(settings.bridge, "lxcbr0");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml("bridge = \"br1\"\nstart_timeout_secs = 3\n").unwrap();
        assert_eq!(settings.bridge, "br1");
        assert_eq!(settings.start_timeout_secs, 3);
        assert_eq!(settings.network_timeout_secs, 30);
    }

    #[test]
    fn test_override_data_dir_moves_containers() {
        let mut settings = Settings::default();
        settings.override_dirs(Some(PathBuf::from("/tmp/b")), None);
        assert_eq!(settings.registry_file(), PathBuf::from("/tmp/b/containers.json"));
        assert_eq!(settings.container_root(), Path::new("/tmp/b/containers"));
        assert_eq!(
            settings.user_data_dir("c1"),
            PathBuf::from("/tmp/b/user-data/c1")
        );
    }

    #[test]
    fn test_override_container_dir_wins() {
        let mut settings = Settings::default();
        settings.override_dirs(Some(PathBuf::from("/tmp/b")), Some(PathBuf::from("/srv/lxc")));
        assert_eq!(settings.container_root(), Path::new("/srv/lxc"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let result = Settings::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(BurrowError::ConfigError(_))));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "start_timeout_secs = \"soon\"").unwrap();
        assert!(matches!(Settings::load(Some(&path)), Err(BurrowError::ConfigError(_))));
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "window_manager = \"openbox\"\n").unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.window_manager, "openbox");
    }
}
