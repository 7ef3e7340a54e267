//! Facts about the host and a seam for running host programs

pub mod process;
pub mod profile;

pub use process::{CommandOutput, CommandRunner, SystemRunner};
pub use profile::{detect_arch, normalize_arch, HostProfile};
