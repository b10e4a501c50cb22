//! Implementation of the `tierwatch watch` command.
//!
//! `watch` starts the watchdog tick thread and the pool maintenance thread,
//! then feeds every line of agent output into the loop and stall detector:
//! - without `--command`, lines come from stdin (`agent | tierwatch watch`)
//! - with `--command`, the command is spawned and both of its output streams
//!   are fed and echoed
//!
//! The run ends when the input ends. The exit code is 5 when the watchdog
//! was left needing manual intervention.

use crate::cli::WatchArgs;
use crate::coordinator::Coordinator;
use crate::error::{Result, TierwatchError};
use crate::exit_codes;
use crate::process::parse_command;
use crate::watchdog::Watchdog;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

pub fn cmd_watch(coordinator: Coordinator, args: WatchArgs) -> Result<i32> {
    let coordinator = Arc::new(coordinator);
    let handle = coordinator
        .start()
        .map_err(|e| TierwatchError::Supervisor(format!("failed to start watchdog: {}", e)))?;
    eprintln!("tierwatch watch started");

    let fed = match &args.command {
        Some(command) => watch_command(coordinator.watchdog(), command),
        None => {
            let stdin = io::stdin();
            feed_lines(coordinator.watchdog(), stdin.lock(), &mut io::sink())
        }
    };
    handle.stop();
    let fed = fed?;

    let status = coordinator.watchdog().status();
    if args.summary {
        eprintln!("{} line(s) watched", fed);
        eprintln!("{}", status.message());
    }
    Ok(if status.needs_intervention {
        exit_codes::SUPERVISION_FAILURE
    } else {
        exit_codes::SUCCESS
    })
}

/// Feed each line of `input` to the watchdog, echoing it to `echo`.
///
/// A failed recovery is logged and the stream keeps going; the watchdog
/// ignores output until an operator resumes it. Returns the number of lines
/// read.
pub(crate) fn feed_lines<R: BufRead, W: Write>(
    watchdog: &Watchdog,
    input: R,
    echo: &mut W,
) -> Result<usize> {
    let mut count = 0;
    for line in input.lines() {
        let line = line.map_err(|e| {
            TierwatchError::Supervisor(format!("failed to read agent output: {}", e))
        })?;
        let _ = writeln!(echo, "{}", line);
        count += 1;
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = watchdog.feed(&line) {
            tracing::error!(error = %e, "watchdog recovery failed");
        }
    }
    Ok(count)
}

fn watch_command(watchdog: &Watchdog, command: &str) -> Result<usize> {
    let argv = parse_command(command)
        .map_err(|e| TierwatchError::Config(format!("invalid watch command '{}': {}", command, e)))?;
    let mut child = Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| TierwatchError::Supervisor(format!("failed to run '{}': {}", command, e)))?;
    tracing::info!(command, pid = child.id(), "watching command output");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let fed = thread::scope(|scope| {
        let errors = stderr.map(|pipe| {
            scope.spawn(move || feed_lines(watchdog, reader(pipe), &mut io::stderr()))
        });
        let out = match stdout {
            Some(pipe) => feed_lines(watchdog, reader(pipe), &mut io::stdout()),
            None => Ok(0),
        };
        let err = match errors.map(|h| h.join()) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(TierwatchError::Supervisor(
                "stderr reader panicked".to_string(),
            )),
            None => Ok(0),
        };
        Ok::<usize, TierwatchError>(out? + err?)
    })?;

    match child.wait() {
        Ok(status) => tracing::info!(command, %status, "watched command exited"),
        Err(e) => tracing::warn!(command, error = %e, "failed to reap watched command"),
    }
    Ok(fed)
}

fn reader<R: Read>(pipe: R) -> BufReader<R> {
    BufReader::new(pipe)
}
