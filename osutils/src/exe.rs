use std::{
    os::unix::process::ExitStatusExt,
    process::{Command, Output},
};

use anyhow::{anyhow, Context, Error};
use log::trace;

use crate::crate_private::Sealed;

/// Views over the captured output of a finished tool.
pub trait OutputChecker: Sealed {
    fn is_success(&self) -> bool;

    fn exit_code(&self) -> Option<i32>;

    fn end_signal(&self) -> Option<i32>;

    fn output(&self) -> String;

    fn error_output(&self) -> String;

    /// stdout and stderr, each under a header, empty streams left out.
    fn output_report(&self) -> String {
        [("stdout", self.output()), ("stderr", self.error_output())]
            .into_iter()
            .filter(|(_, stream)| !stream.trim().is_empty())
            .map(|(name, stream)| format!("--- {name} ---\n{}", stream.trim_end()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn explain_exit(&self) -> String {
        match (self.exit_code(), self.end_signal()) {
            (Some(code), _) => format!("exited with status {code}"),
            (None, Some(signal)) => format!("killed by signal {signal}"),
            (None, None) => "exited with an unknown status".into(),
        }
    }

    /// Ok when the tool succeeded. Otherwise the error explains the exit and
    /// carries whatever the tool printed.
    fn check(&self) -> Result<(), Error> {
        if self.is_success() {
            return Ok(());
        }

        let report = self.output_report();
        let cause = if report.is_empty() {
            anyhow!("No output was captured")
        } else {
            anyhow!("Process output:\n{report}")
        };
        Err(cause.context(self.explain_exit()))
    }

    fn check_output(&self) -> Result<String, Error> {
        self.check().map(|()| self.output())
    }
}

impl Sealed for Output {}

impl OutputChecker for Output {
    fn is_success(&self) -> bool {
        self.status.success()
    }

    fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    fn end_signal(&self) -> Option<i32> {
        self.status.signal()
    }

    fn output(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into()
    }

    fn error_output(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into()
    }
}

/// Run a command to completion and fail unless it exited successfully.
pub trait RunAndCheck: Sealed {
    fn run_and_check(&mut self) -> Result<(), Error>;

    /// Like `run_and_check`, returning stdout.
    fn output_and_check(&mut self) -> Result<String, Error>;

    /// Shell-like rendering of the command line, for logs and errors.
    fn render_command(&self) -> String;
}

impl Sealed for Command {}

fn execute(command: &mut Command) -> Result<Output, Error> {
    let rendered = command.render_command();
    trace!("Executing '{rendered}'");

    let output = command
        .output()
        .with_context(|| format!("Failed to start '{rendered}'"))?;
    trace!(
        "'{rendered}' {}\n{}",
        output.explain_exit(),
        output.output_report()
    );
    Ok(output)
}

impl RunAndCheck for Command {
    fn run_and_check(&mut self) -> Result<(), Error> {
        self.output_and_check().map(|_| ())
    }

    fn output_and_check(&mut self) -> Result<String, Error> {
        execute(self)
            .and_then(|output| output.check_output())
            .with_context(|| format!("Error when running: {}", self.render_command()))
    }

    fn render_command(&self) -> String {
        std::iter::once(self.get_program())
            .chain(self.get_args())
            .map(|arg| {
                let arg = arg.to_string_lossy();
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("'{arg}'")
                } else {
                    arg.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
