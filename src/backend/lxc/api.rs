//! Host-side LXC operations
//!
//! [`LxcApi`] is the narrow set of calls the LXC backend needs from the host.
//! [`LxcCli`] implements it with the `lxc-*` command-line tools, always
//! passing the configured LXC path so containers stay out of the system
//! default location.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use regex::Regex;

use crate::backend::ContainerState;
use crate::error::Result;
use crate::host::{CommandOutput, CommandRunner};

/// How often `ip_addresses` polls while waiting for an address.
const IP_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub trait LxcApi {
    /// Whether a container definition exists on the host.
    fn is_defined(&self) -> bool;

    fn state(&self) -> Result<ContainerState>;

    /// Create the container from the `download` template.
    fn create_from_download(&mut self, distribution: &str, release: &str, arch: &str) -> Result<()>;

    /// Queue a `key = value` line for the container's config file.
    fn append_config_item(&mut self, key: &str, value: &str);

    /// Write queued config lines to the container's config file.
    fn save_config(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    /// Block until the container reaches `state` or `timeout` passes.
    /// Returns whether the state was reached.
    fn wait_for_state(&self, state: &str, timeout: Duration) -> Result<bool>;

    /// Addresses of the container, polling until one shows up or `timeout`
    /// passes. Empty on timeout.
    fn ip_addresses(&self, timeout: Duration) -> Result<Vec<String>>;

    /// Run a shell command inside the running container.
    fn attach(&mut self, command: &str) -> Result<CommandOutput>;

    fn stop(&mut self) -> Result<()>;

    fn destroy(&mut self) -> Result<()>;
}

/// [`LxcApi`] on top of `lxc-create`, `lxc-start` and friends.
pub struct LxcCli<R: CommandRunner> {
    id: String,
    lxc_path: PathBuf,
    runner: R,
    pending: Vec<String>,
}

impl<R: CommandRunner> LxcCli<R> {
    pub fn new(id: &str, lxc_path: &Path, runner: R) -> Self {
        Self {
            id: id.to_string(),
            lxc_path: lxc_path.to_path_buf(),
            runner,
            pending: Vec::new(),
        }
    }

    /// The container's config file, `<lxc path>/<id>/config`.
    pub fn config_file(&self) -> PathBuf {
        self.lxc_path.join(&self.id).join("config")
    }

    fn lxc(&self, tool: &str, extra: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let lxc_path = self.lxc_path.to_string_lossy();
        let mut args: Vec<&str> = vec!["-P", lxc_path.as_ref(), "-n", self.id.as_str()];
        args.extend_from_slice(extra);
        self.runner.run(tool, &args, stdin)
    }
}

impl<R: CommandRunner> LxcApi for LxcCli<R> {
    fn is_defined(&self) -> bool {
        self.config_file().exists()
    }

    fn state(&self) -> Result<ContainerState> {
        if !self.is_defined() {
            return Ok(ContainerState::Undefined);
        }
        let out = self.lxc("lxc-info", &["-s"], None)?.check("lxc-info")?;
        Ok(parse_state(&out.stdout))
    }

    fn create_from_download(&mut self, distribution: &str, release: &str, arch: &str) -> Result<()> {
        fs::create_dir_all(&self.lxc_path)?;
        self.lxc(
            "lxc-create",
            &["-t", "download", "--", "-d", distribution, "-r", release, "-a", arch],
            None,
        )?
        .check("lxc-create")?;
        Ok(())
    }

    fn append_config_item(&mut self, key: &str, value: &str) {
        self.pending.push(format!("{} = {}", key, value));
    }

    fn save_config(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let path = self.config_file();
        let mut file = OpenOptions::new().append(true).open(&path)?;
        let mut text = String::from("\n");
        for line in &self.pending {
            text.push_str(line);
            text.push('\n');
        }
        file.write_all(text.as_bytes())?;
        debug!("appended {} lines to {}", self.pending.len(), path.display());
        self.pending.clear();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.lxc("lxc-start", &[], None)?.check("lxc-start")?;
        Ok(())
    }

    fn wait_for_state(&self, state: &str, timeout: Duration) -> Result<bool> {
        let secs = timeout.as_secs().max(1).to_string();
        Ok(self.lxc("lxc-wait", &["-s", state, "-t", secs.as_str()], None)?.success())
    }

    fn ip_addresses(&self, timeout: Duration) -> Result<Vec<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            let out = self.lxc("lxc-info", &["-i"], None)?;
            let ips = parse_ips(&out.stdout);
            if !ips.is_empty() {
                return Ok(ips);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            thread::sleep(IP_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn attach(&mut self, command: &str) -> Result<CommandOutput> {
        self.lxc("lxc-attach", &["--", "/bin/sh", "-c", command], None)
    }

    fn stop(&mut self) -> Result<()> {
        self.lxc("lxc-stop", &[], None)?.check("lxc-stop")?;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.lxc("lxc-destroy", &[], None)?.check("lxc-destroy")?;
        Ok(())
    }
}

fn state_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^State:\s+RUNNING\s*$").expect("state pattern is valid"))
}

fn ip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^IP:\s+(\S+)").expect("ip pattern is valid"))
}

/// `State: RUNNING` from `lxc-info -s`. Anything but running counts as
/// stopped.
fn parse_state(output: &str) -> ContainerState {
    if state_regex().is_match(output) {
        ContainerState::Running
    } else {
        ContainerState::Stopped
    }
}

/// `IP: 10.0.3.17` lines from `lxc-info -i`.
fn parse_ips(output: &str) -> Vec<String> {
    ip_regex()
        .captures_iter(output)
        .map(|caps| caps[1].to_string())
        .collect()
}
