//! Bounded subprocess execution shared by the command-driven collaborators.
//!
//! Commands are parsed with shell-words (no shell is involved), stdin is
//! optionally fed, stdout/stderr are drained on reader threads so a chatty
//! child cannot block on a full pipe, and the child is killed once the
//! timeout passes.

use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Captured output of one command run.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|s| s.success())
    }

    /// Last non-empty stderr line, for error messages.
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim()
    }
}

/// Split a configured command line into argv.
pub fn parse_command(command: &str) -> io::Result<Vec<String>> {
    let argv = shell_words::split(command)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    if argv.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "command is empty",
        ));
    }
    Ok(argv)
}

/// Run `argv` to completion or until `timeout`, whichever comes first.
pub fn run(argv: &[String], stdin: Option<&[u8]>, timeout: Duration) -> io::Result<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "command is empty"))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!(program = %program, "spawning command");
    let mut child = cmd.spawn()?;

    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        // A child that exits without reading its input closes the pipe early.
        if let Err(e) = pipe.write_all(input)
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
    }

    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout)? {
        Some(status) => Some(status),
        None => {
            tracing::warn!(program = %program, timeout_ms = timeout.as_millis() as u64, "command timed out, killing");
            timed_out = true;
            let _ = child.kill();
            child.wait().ok()
        }
    };

    Ok(CommandOutput {
        status,
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
        timed_out,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(command: &str) -> Vec<String> {
        parse_command(command).unwrap()
    }

    #[test]
    fn test_parse_command_rejects_empty_and_unbalanced() {
        assert!(parse_command("   ").is_err());
        assert!(parse_command("echo 'open").is_err());
        assert_eq!(argv("sh -c 'exit 3'"), vec!["sh", "-c", "exit 3"]);
    }

    #[test]
    fn test_run_captures_output_and_stdin() {
        let out = run(&argv("cat"), Some(b"hello"), Duration::from_secs(5)).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "hello");
    }

    #[test]
    fn test_run_reports_exit_code() {
        let out = run(
            &argv("sh -c 'echo oops >&2; exit 75'"),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(out.code(), Some(75));
        assert_eq!(out.stderr_tail(), "oops");
        assert!(!out.success());
    }

    #[test]
    fn test_run_kills_on_timeout() {
        let out = run(&argv("sleep 5"), None, Duration::from_millis(100)).unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        assert!(run(&argv("definitely-not-a-real-binary-7143"), None, Duration::from_secs(1)).is_err());
    }
}
