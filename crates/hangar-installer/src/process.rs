use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::{CommandConfig, DependencyInstallerConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn from_config(config: &CommandConfig, cwd: &Path) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            cwd: cwd.to_path_buf(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn describe_exit(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

pub trait ProcessRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<ProcessOutput>;

    fn is_executable(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<ProcessOutput> {
        debug!(command = %command, cwd = %command.cwd.display(), "running process");
        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = match (stdout.trim(), stderr.trim()) {
            ("", "") => String::new(),
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        };

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

pub fn resolve_installer_program<R>(
    runner: &R,
    config: &DependencyInstallerConfig,
    root: &Path,
) -> String
where
    R: ProcessRunner + ?Sized,
{
    for candidate in &config.candidates {
        let path = if candidate.is_absolute() {
            candidate.clone()
        } else {
            root.join(candidate)
        };
        if runner.is_executable(&path) {
            debug!(path = %path.display(), "resolved dependency installer");
            return path.display().to_string();
        }
    }

    debug!(
        program = %config.program,
        "no dependency installer candidate found; deferring to PATH"
    );
    config.program.clone()
}
