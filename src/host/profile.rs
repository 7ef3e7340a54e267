//! Invoking user and machine architecture

use std::env;
use std::path::PathBuf;

use sysinfo::System;

use crate::error::{BurrowError, Result};

/// The user on whose behalf containers are created, mirrored inside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProfile {
    pub user: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
    /// Debian-style architecture name (`amd64`, `arm64`, ...).
    pub arch: String,
}

impl HostProfile {
    pub fn detect() -> Result<Self> {
        let user = env::var("USER")
            .or_else(|_| env::var("LOGNAME"))
            .map_err(|_| BurrowError::ConfigError("cannot determine the current user".to_string()))?;
        let home = dirs::home_dir().ok_or_else(|| {
            BurrowError::ConfigError("cannot determine the home directory".to_string())
        })?;

        // SAFETY: getuid and getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };

        Ok(Self {
            user,
            uid,
            gid,
            home,
            arch: detect_arch(),
        })
    }

    pub fn is_i386(&self) -> bool {
        self.arch == "i386"
    }

    /// Home directory as a path relative to the container root filesystem.
    pub fn home_in_rootfs(&self) -> String {
        self.home.to_string_lossy().trim_start_matches('/').to_string()
    }
}

/// Architecture of the running machine, in Debian naming.
pub fn detect_arch() -> String {
    let raw = System::cpu_arch().unwrap_or_else(|| env::consts::ARCH.to_string());
    normalize_arch(&raw)
}

pub fn normalize_arch(raw: &str) -> String {
    match raw {
        "x86_64" | "amd64" => "amd64",
        "aarch64" | "arm64" => "arm64",
        "x86" | "i386" | "i486" | "i586" | "i686" => "i386",
        "arm" | "armhf" => "armhf",
        s if s.starts_with("armv7") => "armhf",
        "powerpc64le" | "ppc64le" => "ppc64el",
        other => other,
    }
    .to_string()
}
