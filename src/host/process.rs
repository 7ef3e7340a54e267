//! Running programs on the host

use std::io::{self, Write};
use std::process::{Command, Stdio};

use log::debug;
use serde::Serialize;

use crate::error::{BurrowError, Result};

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Exit code, or -1 when the process was killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Turn a non-zero exit into `CommandFailed`, naming what was attempted.
    pub fn check(self, what: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(BurrowError::CommandFailed(format!(
                "{} exited with status {}: {}",
                what,
                self.status,
                self.stderr.trim()
            )))
        }
    }
}

/// Runs a program to completion, optionally feeding it `stdin`.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput>;
}

/// Runs programs with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let resolved = which::which(program)
            .map_err(|_| BurrowError::CommandFailed(format!("{}: command not found", program)))?;
        debug!("running {} {}", program, args.join(" "));

        let mut child = Command::new(resolved)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                // A child that exits without reading its input is not an
                // error here; its exit status says what happened.
                match pipe.write_all(input.as_bytes()) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!("{} closed its stdin early", program);
                    }
                    Err(e) => {
                        drop(pipe);
                        let _ = child.wait();
                        return Err(e.into());
                    }
                }
            }
        }

        let output = child.wait_with_output()?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_success() {
        let out = CommandOutput {
            status: 0,
            stdout: "ok".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.check("true").unwrap().stdout, "ok");
    }

    #[test]
    fn test_check_failure_names_command() {
        let out = CommandOutput {
            status: 2,
            stdout: String::new(),
            stderr: "boom\n".to_string(),
        };
        let err = out.check("lxc-stop").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command failed: lxc-stop exited with status 2: boom"
        );
    }

    #[test]
    fn test_child_ignoring_stdin_is_reaped() {
        let input = "x".repeat(1 << 20);
        let out = SystemRunner.run("true", &[], Some(&input)).unwrap();
        assert!(out.success());
    }

    #[test]
    fn test_stdin_reaches_child() {
        let out = SystemRunner.run("cat", &[], Some("hello\n")).unwrap();
        assert_eq!(out.stdout, "hello\n");
    }

    #[test]
    fn test_missing_program() {
        let result = SystemRunner.run("burrow-definitely-not-installed", &[], None);
        assert!(matches!(result, Err(BurrowError::CommandFailed(_))));
    }
}
