//! Burrow - sandboxed application containers on unprivileged LXC
//!
//! Burrow keeps a registry of containers in a single JSON document and
//! drives each container's lifecycle through a backend chosen by the
//! container's recorded type.
//!
//! # Example
//!
//! ```no_run
//! use burrow::{PersistentStore, Registry, Settings};
//!
//! let settings = Settings::load(None).unwrap();
//! let mut registry = Registry::new(PersistentStore::new(settings.registry_file()));
//! registry.add_container("bionic", "Ubuntu 18.04", "lxc", "bionic").unwrap();
//! assert_eq!(registry.check_container_id(None).unwrap().as_deref(), Some("bionic"));
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod output;
pub mod registry;

pub use backend::{BackendKind, ContainerBackend, ContainerState, Verbosity};
pub use config::Settings;
pub use error::{BurrowError, ErrorKind, Result};
pub use host::{CommandOutput, CommandRunner, HostProfile, SystemRunner};
pub use output::{format_output, OutputFormat};
pub use registry::{PersistentStore, Registry};
