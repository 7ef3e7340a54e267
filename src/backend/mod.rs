//! Container backends
//!
//! Every virtualization technology implements [`ContainerBackend`]. The
//! registry records which one a container uses in its `type` field, and
//! [`open`] turns that tag into a ready backend.
//!
//! Lifecycle:
//!
//! ```text
//! Undefined --provision--> Stopped --start--> Running --stop--> Stopped
//! Stopped | Running --destroy--> Undefined
//! ```

pub mod lxc;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::Settings;
use crate::error::{BurrowError, Result};
use crate::host::{CommandOutput, HostProfile, SystemRunner};
use crate::registry::Registry;

pub use lxc::LxcBackend;

/// Observable state of a container on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Nothing exists on the host for this id.
    Undefined,
    Stopped,
    Running,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// How much progress provisioning reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Tag stored in a container's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Lxc,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lxc => "lxc",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BurrowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lxc" => Ok(Self::Lxc),
            other => Err(BurrowError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Lifecycle operations shared by every backend.
pub trait ContainerBackend {
    fn id(&self) -> &str;

    fn kind(&self) -> BackendKind;

    fn state(&self) -> Result<ContainerState>;

    fn is_running(&self) -> Result<bool> {
        Ok(self.state()? == ContainerState::Running)
    }

    /// Start the container if needed and return once it is running and has
    /// a network address.
    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Run `command` through a shell inside the running container.
    fn run_command(&mut self, command: &str) -> Result<CommandOutput>;

    /// Remove the container from the host. A no-op if it does not exist.
    fn destroy(&mut self) -> Result<()>;

    /// Create the container from scratch and leave it stopped.
    fn provision(&mut self, password: &str, verbosity: Verbosity) -> Result<()>;
}

/// Build the backend for container `id` from what the registry says about it.
pub fn open(
    registry: &mut Registry,
    id: &str,
    settings: &Settings,
    host: &HostProfile,
) -> Result<Box<dyn ContainerBackend>> {
    if !registry.container_exists(id)? {
        return Err(BurrowError::UnknownContainer(id.to_string()));
    }

    let tag = registry
        .get_container_type(id)?
        .ok_or_else(|| BurrowError::UnsupportedBackend(format!("<unset> for '{}'", id)))?;
    let distro = registry.get_container_distro(id)?.unwrap_or_default();

    match tag.parse::<BackendKind>()? {
        BackendKind::Lxc => Ok(Box::new(LxcBackend::with_cli(
            id,
            &distro,
            settings.clone(),
            host.clone(),
            SystemRunner,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PersistentStore;
    use tempfile::TempDir;

    fn host() -> HostProfile {
        HostProfile {
            user: "alice".to_string(),
            uid: 1000,
            gid: 1000,
            home: "/home/alice".into(),
            arch: "amd64".to_string(),
        }
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("lxc".parse::<BackendKind>().unwrap(), BackendKind::Lxc);
        assert!(matches!(
            "chroot".parse::<BackendKind>(),
            Err(BurrowError::UnsupportedBackend(tag)) if tag == "chroot"
        ));
    }

    #[test]
    fn test_open_lxc() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.override_dirs(Some(dir.path().to_path_buf()), None);
        let mut registry = Registry::new(PersistentStore::new(settings.registry_file()));
        registry.add_container("c1", "One", "lxc", "bionic").unwrap();

        let backend = open(&mut registry, "c1", &settings, &host()).unwrap();
        assert_eq!(backend.id(), "c1");
        assert_eq!(backend.kind(), BackendKind::Lxc);
    }

    #[test]
    fn test_open_unknown_type() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.override_dirs(Some(dir.path().to_path_buf()), None);
        let mut registry = Registry::new(PersistentStore::new(settings.registry_file()));
        registry.add_container("c1", "One", "chroot", "bionic").unwrap();

        let err = open(&mut registry, "c1", &settings, &host()).err().unwrap();
        assert!(matches!(err, BurrowError::UnsupportedBackend(_)));
    }

    #[test]
    fn test_open_unknown_container() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::new(PersistentStore::new(dir.path().join("c.json")));
        let err = open(&mut registry, "nope", &Settings::default(), &host()).err().unwrap();
        assert!(err.is_validation());
    }
}
