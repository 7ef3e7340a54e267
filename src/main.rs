//! Burrow CLI - create and run sandboxed application containers

use std::env;
use std::io;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use log::{warn, LevelFilter};

use burrow::backend::{self, ContainerBackend, Verbosity};
use burrow::cli::{Args, SubCommand};
use burrow::output::{format_output, ContainerReport, ContainerSummary, OutputFormat, Report};
use burrow::registry::{InstallStatus, Multiarch};
use burrow::{HostProfile, PersistentStore, Registry, Settings};

const PASSWORD_ENV: &str = "BURROW_PASSWORD";

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        LevelFilter::Warn
    } else {
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .parse_default_env()
        .init();
}

fn verbosity(args: &Args) -> Verbosity {
    if args.quiet {
        Verbosity::Quiet
    } else if args.verbose > 0 {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    settings.override_dirs(args.data_dir.clone(), args.container_dir.clone());
    let mut registry = Registry::new(PersistentStore::new(settings.registry_file()));
    let format = if args.json { OutputFormat::Json } else { OutputFormat::Human };
    let progress = verbosity(&args);

    let report = match args.command {
        SubCommand::List => Report::List(ContainerSummary::collect(&mut registry)?),

        SubCommand::Info { state } => {
            let id = resolve_id(&mut registry, args.id.as_deref())?;
            let mut report = ContainerReport::collect(&mut registry, &id)?
                .ok_or_else(|| anyhow!("Container id '{}' does not exist.", id))?;
            if state {
                let host = HostProfile::detect()?;
                let backend = backend::open(&mut registry, &id, &settings, &host)?;
                report.state = Some(backend.state()?);
            }
            Report::Container(Box::new(report))
        }

        SubCommand::Create {
            distro,
            name,
            backend: kind,
            multiarch,
            password_stdin,
        } => {
            let id = args
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .context("--id is required to create a container")?;
            let password = read_password(password_stdin)?;
            let host = HostProfile::detect()?;

            registry.add_container(&id, name.as_deref().unwrap_or(&id), &kind, &distro)?;
            if multiarch {
                registry.update_container_multiarch_support(&id, Multiarch::Enabled, &host)?;
            }

            let mut backend = match backend::open(&mut registry, &id, &settings, &host) {
                Ok(backend) => backend,
                Err(e) => {
                    registry.delete_container(&id)?;
                    return Err(e.into());
                }
            };

            registry.update_container_install_status(&id, InstallStatus::Installing)?;
            if let Err(e) = backend.provision(&password, progress) {
                if let Err(cleanup) = backend.destroy() {
                    warn!("could not clean up container '{}': {}", id, cleanup);
                }
                registry.delete_container(&id)?;
                return Err(e).with_context(|| format!("creating container '{}'", id));
            }
            registry.update_container_install_status(&id, InstallStatus::Ready)?;
            Report::Message(format!("Container '{}' created", id))
        }

        SubCommand::Destroy => {
            let id = resolve_id(&mut registry, args.id.as_deref())?;
            let host = HostProfile::detect()?;
            let mut backend = backend::open(&mut registry, &id, &settings, &host)?;

            registry.update_container_install_status(&id, InstallStatus::Removing)?;
            backend.destroy()?;
            registry.delete_container(&id)?;
            Report::Message(format!("Container '{}' destroyed", id))
        }

        SubCommand::Start => {
            let id = resolve_id(&mut registry, args.id.as_deref())?;
            let host = HostProfile::detect()?;
            backend::open(&mut registry, &id, &settings, &host)?.start()?;
            Report::Message(format!("Container '{}' is running", id))
        }

        SubCommand::Stop => {
            let id = resolve_id(&mut registry, args.id.as_deref())?;
            let host = HostProfile::detect()?;
            backend::open(&mut registry, &id, &settings, &host)?.stop()?;
            Report::Message(format!("Container '{}' stopped", id))
        }

        SubCommand::Exec { command } => {
            let id = resolve_id(&mut registry, args.id.as_deref())?;
            let host = HostProfile::detect()?;
            let mut backend = backend::open(&mut registry, &id, &settings, &host)?;
            let output = backend.run_command(&command.join(" "))?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            if !output.success() {
                bail!("command exited with status {}", output.status);
            }
            return Ok(());
        }

        SubCommand::SetDefault { container } => {
            registry.set_default_container_id(&container, true)?;
            Report::Message(format!("Default container is now '{}'", container))
        }

        SubCommand::ClearDefault => {
            registry.clear_default_container_id(true)?;
            Report::Message("Default container cleared".to_string())
        }

        SubCommand::Merge { file } => {
            registry.merge_external_document(&file)?;
            Report::Message(format!("Merged {}", file.display()))
        }
    };

    println!("{}", format_output(&report, &format));
    Ok(())
}

/// The password for `create`, kept off the command line: the first line of
/// stdin with `--password-stdin`, otherwise `BURROW_PASSWORD`.
fn read_password(from_stdin: bool) -> anyhow::Result<String> {
    let password = if from_stdin {
        let mut line = String::new();
        io::stdin()
            .read_line(&mut line)
            .context("reading the password from stdin")?;
        line.trim_end_matches(&['\r', '\n'][..]).to_string()
    } else {
        env::var(PASSWORD_ENV).unwrap_or_default()
    };

    if password.is_empty() {
        bail!(
            "a password is required (use --password-stdin or {})",
            PASSWORD_ENV
        );
    }
    Ok(password)
}

/// The container named by `--id`, or the default one.
fn resolve_id(registry: &mut Registry, id: Option<&str>) -> anyhow::Result<String> {
    registry
        .check_container_id(id)?
        .ok_or_else(|| anyhow!("No container id given and no default container is set."))
}
