//! One-time host preparation for unprivileged LXC
//!
//! Unprivileged containers need a subordinate uid/gid range for the user,
//! permission to attach veth devices to the bridge, and a per-user
//! `default.conf` mapping ids. Each step checks first and only acts when
//! something is missing, so running it for every new container is safe.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};

use crate::config::Settings;
use crate::error::Result;
use crate::host::{CommandRunner, HostProfile};

pub fn setup_host_environment(
    settings: &Settings,
    host: &HostProfile,
    runner: &dyn CommandRunner,
    password: &str,
) -> Result<()> {
    let needs_subids = !subids_allocated(&settings.subuid_file, &host.user)?;
    let entry = usernet_entry(settings, host);
    let needs_usernet = !usernet_registered(&settings.usernet_file, &entry)?;

    if !needs_subids && !needs_usernet {
        debug!("host already prepared for {}", host.user);
        return Ok(());
    }

    // Only this call sees the password; the steps below run on the cached
    // credentials and their stdin goes to the command itself.
    runner
        .run("sudo", &["--stdin", "--validate"], Some(&format!("{}\n", password)))?
        .check("sudo --validate")?;

    if needs_subids {
        let range = format!(
            "{}-{}",
            settings.subid_start,
            settings.subid_start + settings.subid_count
        );
        info!("allocating subordinate ids {} for {}", range, host.user);
        runner
            .run(
                "sudo",
                &[
                    "--non-interactive",
                    "usermod",
                    "--add-subuids",
                    range.as_str(),
                    "--add-subgids",
                    range.as_str(),
                    host.user.as_str(),
                ],
                None,
            )?
            .check("usermod")?;
    } else {
        debug!("{} already has subordinate ids", host.user);
    }

    if needs_usernet {
        info!("registering '{}' in {}", entry, settings.usernet_file.display());
        let usernet = settings.usernet_file.to_string_lossy();
        runner
            .run(
                "sudo",
                &["--non-interactive", "tee", "-a", usernet.as_ref()],
                Some(&format!("{}\n", entry)),
            )?
            .check("tee")?;
    } else {
        debug!("{} already lists '{}'", settings.usernet_file.display(), entry);
    }

    Ok(())
}

/// `<user> veth <bridge> <quota>`, the lxc-usernet grant for this user.
pub fn usernet_entry(settings: &Settings, host: &HostProfile) -> String {
    format!(
        "{} veth {} {}",
        host.user, settings.bridge, settings.bridge_quota
    )
}

/// Write the per-user `default.conf` unless one exists. Returns whether a
/// file was written.
pub fn write_default_conf(settings: &Settings, host: &HostProfile) -> Result<bool> {
    let path = settings.lxc_default_conf();
    if path.exists() {
        debug!("keeping existing {}", path.display());
        return Ok(false);
    }
    fs::create_dir_all(&settings.lxc_config_dir)?;
    fs::write(&path, default_conf(settings, host))?;
    info!("wrote {}", path.display());
    Ok(true)
}

/// Network settings plus an id map that maps the invoking user to itself
/// and everything else into the subordinate range.
pub fn default_conf(settings: &Settings, host: &HostProfile) -> String {
    let mut lines = vec![
        "lxc.net.0.type = veth".to_string(),
        format!("lxc.net.0.link = {}", settings.bridge),
        "lxc.net.0.flags = up".to_string(),
        "lxc.net.0.hwaddr = 00:16:3e:xx:xx:xx".to_string(),
    ];
    lines.extend(id_map_lines('u', host.uid, settings.subid_start, settings.subid_count));
    lines.extend(id_map_lines('g', host.gid, settings.subid_start, settings.subid_count));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn id_map_lines(kind: char, own: u32, start: u32, count: u32) -> Vec<String> {
    let mut lines = vec![
        format!("lxc.idmap = {} 0 {} {}", kind, start, own.min(count)),
        format!("lxc.idmap = {} {} {} 1", kind, own, own),
    ];
    let next = own + 1;
    if next < count {
        lines.push(format!(
            "lxc.idmap = {} {} {} {}",
            kind,
            next,
            start + next,
            count - next
        ));
    }
    lines
}

fn subids_allocated(subuid_file: &Path, user: &str) -> Result<bool> {
    let prefix = format!("{}:", user);
    Ok(read_lines(subuid_file)?
        .iter()
        .any(|line| line.starts_with(&prefix)))
}

fn usernet_registered(usernet_file: &Path, entry: &str) -> Result<bool> {
    Ok(read_lines(usernet_file)?
        .iter()
        .any(|line| line.contains(entry)))
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}
