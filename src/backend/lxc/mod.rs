//! Unprivileged LXC containers
//!
//! Containers live under the configured LXC path, run as the invoking user
//! through a subordinate id range, and mirror that user inside with the
//! same uid so bind-mounted home data keeps its ownership.

pub mod api;
pub mod host_setup;

use std::fs;

use log::{debug, info, warn};

use self::api::{LxcApi, LxcCli};
use self::host_setup::{setup_host_environment, write_default_conf};
use super::{BackendKind, ContainerBackend, ContainerState, Verbosity};
use crate::config::Settings;
use crate::error::{BurrowError, Result};
use crate::host::{CommandOutput, CommandRunner, HostProfile};

/// Home subdirectories shared with the container when they exist.
const SHARED_HOME_DIRS: [&str; 4] = ["Documents", "Music", "Pictures", "Videos"];

pub struct LxcBackend {
    id: String,
    distro: String,
    settings: Settings,
    host: HostProfile,
    api: Box<dyn LxcApi>,
    runner: Box<dyn CommandRunner>,
}

impl LxcBackend {
    pub fn new(
        id: &str,
        distro: &str,
        settings: Settings,
        host: HostProfile,
        api: Box<dyn LxcApi>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            id: id.to_string(),
            distro: distro.to_string(),
            settings,
            host,
            api,
            runner,
        }
    }

    /// Backend driving the `lxc-*` tools through `runner`.
    pub fn with_cli<R>(id: &str, distro: &str, settings: Settings, host: HostProfile, runner: R) -> Self
    where
        R: CommandRunner + Clone + 'static,
    {
        let api = LxcCli::new(id, settings.container_root(), runner.clone());
        Self::new(id, distro, settings, host, Box::new(api), Box::new(runner))
    }

    /// Config lines giving the container the user's home, runtime dir and
    /// shared media folders.
    pub fn identity_config(&self) -> Vec<(&'static str, String)> {
        let home = self.host.home.display().to_string();
        let home_rel = self.host.home_in_rootfs();
        let uid = self.host.uid;

        let mut items = vec![(
            "lxc.mount.entry",
            format!(
                "{} {} none bind,create=dir",
                self.settings.user_data_dir(&self.id).display(),
                home_rel
            ),
        )];
        for dir in SHARED_HOME_DIRS {
            items.push((
                "lxc.mount.entry",
                format!(
                    "{}/{} {}/{} none bind,create=dir,optional",
                    home, dir, home_rel, dir
                ),
            ));
        }
        items.push((
            "lxc.mount.entry",
            "tmpfs run tmpfs rw,nodev,noexec,nosuid,size=5242880".to_string(),
        ));
        items.push((
            "lxc.mount.entry",
            "none run/user tmpfs rw,nodev,noexec,nosuid,size=104857600,mode=0755,create=dir"
                .to_string(),
        ));
        items.push((
            "lxc.mount.entry",
            format!("/run/user/{} run/user/{} none rbind,create=dir", uid, uid),
        ));
        if let Some(include) = self.settings.lxc_include.as_ref().filter(|p| p.exists()) {
            items.push(("lxc.include", include.display().to_string()));
        }
        items
    }

    fn progress(&self, verbosity: Verbosity, message: &str) {
        if verbosity >= Verbosity::Normal {
            info!("[{}] {}", self.id, message);
        } else {
            debug!("[{}] {}", self.id, message);
        }
    }

    /// SHA-512 crypt hash of `password`, produced on the host.
    fn hash_password(&self, password: &str) -> Result<String> {
        let out = self
            .runner
            .run("openssl", &["passwd", "-6", "-stdin"], Some(&format!("{}\n", password)))?
            .check("openssl passwd")?;
        let hash = out.stdout.trim();
        if hash.is_empty() {
            return Err(BurrowError::CommandFailed(
                "openssl passwd produced no hash".to_string(),
            ));
        }
        Ok(hash.to_string())
    }

    fn run_provisioning_script(&mut self, password: &str, verbosity: Verbosity) -> Result<()> {
        let removed = self.api.attach("userdel -r ubuntu")?;
        if !removed.success() {
            warn!(
                "[{}] could not remove the image's default user: {}",
                self.id,
                removed.stderr.trim()
            );
        }

        self.progress(verbosity, &format!("Creating user {}", self.host.user));
        let hash = self.hash_password(password)?;
        let useradd = format!(
            "useradd -u {} -p '{}' -G sudo {}",
            self.host.uid, hash, self.host.user
        );
        self.api.attach(&useradd)?.check("useradd")?;

        let quiet = if verbosity == Verbosity::Quiet { " -q" } else { "" };
        self.progress(verbosity, "Updating the package index");
        self.api
            .attach(&format!("apt-get update{}", quiet))?
            .check("apt-get update")?;

        self.progress(
            verbosity,
            &format!("Installing {}", self.settings.window_manager),
        );
        self.api
            .attach(&format!(
                "DEBIAN_FRONTEND=noninteractive apt-get install -y{} {}",
                quiet, self.settings.window_manager
            ))?
            .check("apt-get install")?;
        Ok(())
    }
}

impl ContainerBackend for LxcBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Lxc
    }

    fn state(&self) -> Result<ContainerState> {
        self.api.state()
    }

    fn start(&mut self) -> Result<()> {
        match self.api.state()? {
            ContainerState::Undefined => {
                return Err(BurrowError::StartFailed {
                    id: self.id.clone(),
                    reason: "container is not defined".to_string(),
                })
            }
            ContainerState::Stopped => {
                info!("starting container '{}'", self.id);
                self.api.start().map_err(|e| BurrowError::StartFailed {
                    id: self.id.clone(),
                    reason: e.to_string(),
                })?;
            }
            ContainerState::Running => debug!("container '{}' already running", self.id),
        }

        let start_timeout = self.settings.start_timeout();
        if !self.api.wait_for_state("RUNNING", start_timeout)? {
            return Err(BurrowError::Timeout {
                id: self.id.clone(),
                condition: "the RUNNING state".to_string(),
                timeout: start_timeout,
            });
        }

        let network_timeout = self.settings.network_timeout();
        let ips = self.api.ip_addresses(network_timeout)?;
        if ips.is_empty() {
            return Err(BurrowError::Timeout {
                id: self.id.clone(),
                condition: "a network address".to_string(),
                timeout: network_timeout,
            });
        }
        debug!("container '{}' has addresses {}", self.id, ips.join(", "));

        // The host's X11 socket directory is bind-mounted by the shared
        // config and would otherwise shadow the container's own.
        let umount = self.api.attach("umount /tmp/.X11-unix")?;
        if !umount.success() {
            debug!("umount /tmp/.X11-unix: {}", umount.stderr.trim());
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.api.state()? == ContainerState::Running {
            info!("stopping container '{}'", self.id);
            self.api.stop()?;
        }
        Ok(())
    }

    fn run_command(&mut self, command: &str) -> Result<CommandOutput> {
        self.api.attach(command)
    }

    fn destroy(&mut self) -> Result<()> {
        if !self.api.is_defined() {
            debug!("container '{}' is not defined, nothing to destroy", self.id);
            return Ok(());
        }
        self.stop()?;
        info!("destroying container '{}'", self.id);
        self.api.destroy()
    }

    fn provision(&mut self, password: &str, verbosity: Verbosity) -> Result<()> {
        if self.distro.is_empty() {
            return Err(BurrowError::CreateFailed {
                id: self.id.clone(),
                reason: "no distro recorded for this container".to_string(),
            });
        }

        self.progress(verbosity, "Preparing the host");
        setup_host_environment(&self.settings, &self.host, self.runner.as_ref(), password)?;
        write_default_conf(&self.settings, &self.host)?;
        fs::create_dir_all(self.settings.user_data_dir(&self.id))?;

        for (key, value) in self.identity_config() {
            self.api.append_config_item(key, &value);
        }

        self.progress(
            verbosity,
            &format!(
                "Downloading {} {} ({})",
                self.settings.image_distribution, self.distro, self.host.arch
            ),
        );
        self.api
            .create_from_download(&self.settings.image_distribution, &self.distro, &self.host.arch)
            .map_err(|e| BurrowError::CreateFailed {
                id: self.id.clone(),
                reason: e.to_string(),
            })?;
        self.api.save_config()?;

        let scripted = self
            .start()
            .and_then(|_| self.run_provisioning_script(password, verbosity));
        let stopped = self.stop();
        scripted?;
        stopped?;

        self.progress(verbosity, "Container created");
        Ok(())
    }
}
