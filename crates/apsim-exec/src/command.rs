use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Executable that is run against each input.
pub const DEFAULT_PROGRAM: &str = "apsim-server";

/// Flags passed to the backend ahead of the input path.
pub const DEFAULT_ARGS: [&str; 1] = ["-vkrnf"];

/// How to invoke the backend.
///
/// The input path is always appended as the last positional argument.
#[derive(Clone, Debug)]
pub struct BackendCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for BackendCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BackendCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Build the command for `input` with both output streams piped.
    pub(crate) fn command_for(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|s| s.as_str()))
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}
