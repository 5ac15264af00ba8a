//! Synchronous subprocess execution for OCI runtime subcommands.

use std::process::{Command, Output};

use conman_common::error::{ConmanError, Result};

/// Runs `cmd` to completion and returns its standard output.
///
/// Standard output and error are logged at debug level whatever the
/// outcome.
///
/// # Errors
///
/// Returns `Io` if the program cannot be spawned and `RuntimeExecution`,
/// carrying the captured standard error, if it exits unsuccessfully.
pub fn run_command(cmd: &mut Command) -> Result<Vec<u8>> {
    let line = command_line(cmd);
    let output = cmd
        .output()
        .map_err(|e| ConmanError::io(cmd.get_program(), e))?;
    debug_log(&line, &output);
    check_status(line, output)
}

/// Renders `cmd` as a single space-separated line for logs and errors.
pub fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn debug_log(line: &str, output: &Output) {
    tracing::debug!(
        stdout = %String::from_utf8_lossy(&output.stdout),
        stderr = %String::from_utf8_lossy(&output.stderr),
        status = %output.status,
        "exec {line}"
    );
}

pub(crate) fn check_status(line: String, output: Output) -> Result<Vec<u8>> {
    if output.status.success() {
        return Ok(output.stdout);
    }
    Err(ConmanError::RuntimeExecution {
        command: line,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use conman_common::error::ErrorKind;

    use super::*;

    #[test]
    fn successful_command_returns_stdout() {
        let out = run_command(Command::new("/bin/sh").args(["-c", "printf ok"])).expect("run");
        assert_eq!(out, b"ok");
    }

    #[test]
    fn failing_command_carries_stderr() {
        let err = run_command(Command::new("/bin/sh").args(["-c", "echo boom >&2; exit 3"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeExecution);
        match err {
            ConmanError::RuntimeExecution {
                command, stderr, ..
            } => {
                assert_eq!(stderr, "boom");
                assert!(command.starts_with("/bin/sh -c"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_io() {
        let err = run_command(&mut Command::new("/definitely/not/a/binary")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
