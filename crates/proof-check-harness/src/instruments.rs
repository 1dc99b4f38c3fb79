//! The theorem-location lookup tool.
//!
//! Declaration ranges come from a separate command-line tool run inside the workspace,
//! `lake exe llm-instruments <command> <args>`. Failures are returned as [`CommandError`]
//! values so setup code can branch on them.

use proof_check::TheoremInfo;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
/// Failures of the lookup tool.
pub enum CommandError {
    #[error("cannot run `{command}`: {source}")]
    /// The tool could not be started.
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying error.
        source: io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    /// The tool ran and reported failure.
    Failed {
        /// Rendered command line.
        command: String,
        /// Exit code, or `"a signal"` when there was none.
        status: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    #[error("lookup output is not a theorem list: {0}")]
    /// The tool succeeded but printed something other than the expected JSON.
    InvalidOutput(#[from] serde_json::Error),
}

/// Source of declaration locations for a workspace.
pub trait TheoremLocator {
    /// Check that the workspace can answer lookups at all.
    fn heartbeat(&self) -> Result<(), CommandError>;

    /// Every declaration in `rel_file`, a path relative to the workspace root.
    fn theorem_infos(&self, rel_file: &Path) -> Result<Vec<TheoremInfo>, CommandError>;
}

/// `lake exe llm-instruments` run inside one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentsCommand {
    /// Working directory for every invocation.
    pub workspace: PathBuf,
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments placed before the subcommand.
    pub prefix_args: Vec<OsString>,
}

impl InstrumentsCommand {
    /// `lake exe llm-instruments` in `workspace`.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self::with_lake(workspace, "lake")
    }

    /// `<lake> exe llm-instruments` in `workspace`.
    pub fn with_lake(workspace: impl Into<PathBuf>, lake: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            program: lake.into(),
            prefix_args: vec!["exe".into(), "llm-instruments".into()],
        }
    }

    fn run(&self, subcommand: &str, args: &[OsString]) -> Result<Output, CommandError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .arg(subcommand)
            .args(args)
            .current_dir(&self.workspace)
            .stdin(Stdio::null());

        let rendered = self.render(subcommand, args);
        log::debug!("running `{rendered}` in {}", self.workspace.display());

        let output = cmd.output().map_err(|source| CommandError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(output);
        }
        Err(CommandError::Failed {
            command: rendered,
            status: output
                .status
                .code()
                .map_or_else(|| "a signal".to_string(), |code| format!("status {code}")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn render(&self, subcommand: &str, args: &[OsString]) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.prefix_args.iter().map(OsString::as_os_str))
            .chain(std::iter::once(std::ffi::OsStr::new(subcommand)))
            .chain(args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TheoremLocator for InstrumentsCommand {
    fn heartbeat(&self) -> Result<(), CommandError> {
        self.run("heartbeat", &[]).map(drop)
    }

    fn theorem_infos(&self, rel_file: &Path) -> Result<Vec<TheoremInfo>, CommandError> {
        let output = self.run("theorem-info", &[rel_file.as_os_str().to_os_string()])?;
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}
