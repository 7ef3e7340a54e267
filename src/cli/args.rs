//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "burrow")]
#[command(author, version, about = "Manage sandboxed LXC application containers", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Container to act on (defaults to the default container)
    #[arg(short, long, global = true)]
    pub id: Option<String>,

    /// Directory holding the registry and per-container user data
    #[arg(long, global = true, env = "BURROW_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// LXC path for container root filesystems
    #[arg(long, global = true, env = "BURROW_CONTAINER_DIR")]
    pub container_dir: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(long, global = true, env = "BURROW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only report warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// List all containers
    List,

    /// Show what the registry records about a container
    Info {
        /// Also query the backend for the live state
        #[arg(long)]
        state: bool,
    },

    /// Register, download and provision a new container
    Create {
        /// Release of the image to download (e.g. bionic)
        #[arg(long, short)]
        distro: String,

        /// Display name (defaults to the id)
        #[arg(long, short)]
        name: Option<String>,

        /// Container backend
        #[arg(long = "type", default_value = "lxc")]
        backend: String,

        /// Enable multiarch support
        #[arg(long)]
        multiarch: bool,

        /// Read the password (container user and host sudo) from the first
        /// line of stdin instead of BURROW_PASSWORD
        #[arg(long)]
        password_stdin: bool,
    },

    /// Destroy a container and remove it from the registry
    Destroy,

    /// Start a container and wait for its network
    Start,

    /// Stop a running container
    Stop,

    /// Run a command inside a running container
    Exec {
        /// Command line to run through the container's shell
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Make a container the default
    SetDefault {
        /// Container id
        container: String,
    },

    /// Forget the default container
    ClearDefault,

    /// Merge containers from another registry file
    Merge {
        /// Path to the registry file to merge
        file: PathBuf,
    },
}
