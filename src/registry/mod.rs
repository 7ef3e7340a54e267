//! The container registry
//!
//! A single JSON document lists every container with its install status,
//! enabled archives and installed applications. [`PersistentStore`] owns
//! the file format; [`Registry`] keeps a cached copy in sync with it.

pub mod containers;
pub mod document;
pub mod manager;
pub mod store;

pub use containers::validate_container_id;
pub use document::{
    is_present, keys, ArchiveEntry, ContainerEntry, InstallStatus, ItemStatus, Multiarch,
    PackageEntry, RegistryDocument,
};
pub use manager::Registry;
pub use store::PersistentStore;
