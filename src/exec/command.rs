// src/exec/command.rs

//! Child-process runner for jobs with a `cmd`.

use std::process::Stdio;

use anyhow::Context;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::engine::TaskReporter;
use crate::errors::Result;
use crate::exec::{ProcessControl, STATE_POLL_INTERVAL};
use crate::types::TaskState;

/// How one spawned process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunOutcome {
    /// The process exited on its own; `None` when killed by a signal.
    Exited { success: bool, code: Option<i32> },
    /// Killed on request (cancel) or because the run was abandoned.
    Killed,
    /// Killed to be spawned again.
    Restart,
}

/// Drive a command job until it ends.
///
/// Waits for a concurrency slot, spawns `cmd` through the platform shell,
/// reports every stdout line matching `frame_pattern` as a rendered frame and
/// obeys [`ProcessControl`] requests coming from the task's
/// [`ChildProcessHandle`](crate::exec::ChildProcessHandle).
pub async fn run_command(
    mut reporter: TaskReporter,
    cmd: String,
    frame_pattern: Regex,
    mut control_rx: mpsc::UnboundedReceiver<ProcessControl>,
) {
    loop {
        if !wait_for_slot(&mut reporter, &mut control_rx).await {
            reporter.end();
            return;
        }

        let outcome = match run_once(&reporter, &cmd, &frame_pattern, &mut control_rx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(task = %reporter.task(), error = %err, "task process error");
                reporter.fail(format!("{err:#}"));
                return;
            }
        };

        match outcome {
            RunOutcome::Exited { success: true, .. } => {
                reporter.end();
                return;
            }
            RunOutcome::Exited { success: false, code } => {
                let reason = match code {
                    Some(code) => format!("exit code {code}"),
                    None => "terminated by signal".to_string(),
                };
                reporter.fail(reason);
                return;
            }
            RunOutcome::Killed => {
                reporter.end();
                return;
            }
            RunOutcome::Restart => {
                reporter = reporter.restarted(None);
            }
        }
    }
}

/// Wait until the run holds a concurrency slot.
///
/// A restart request while waiting starts a new (still queued) run. Returns
/// `false` if the job should not run at all.
async fn wait_for_slot(
    reporter: &mut TaskReporter,
    control_rx: &mut mpsc::UnboundedReceiver<ProcessControl>,
) -> bool {
    loop {
        if reporter.is_retired() || !reporter.is_connected() {
            return false;
        }
        if reporter.is_registered() {
            match reporter.state() {
                TaskState::Running => return true,
                TaskState::Canceled | TaskState::Finished => return false,
                TaskState::Queued | TaskState::Paused => {}
            }
        }

        tokio::select! {
            control = control_rx.recv() => match control {
                Some(ProcessControl::Restart) => {
                    debug!(task = %reporter.task(), "restart requested while waiting for a slot");
                    *reporter = reporter.restarted(None);
                }
                Some(ProcessControl::Kill) | None => return false,
            },
            _ = sleep(STATE_POLL_INTERVAL) => {}
        }
    }
}

fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

async fn run_once(
    reporter: &TaskReporter,
    cmd: &str,
    frame_pattern: &Regex,
    control_rx: &mut mpsc::UnboundedReceiver<ProcessControl>,
) -> Result<RunOutcome> {
    let task = reporter.task().to_string();
    info!(task = %task, generation = ?reporter.generation(), cmd = %cmd, "starting task process");

    let mut child = shell_command(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning process for task '{task}'"))?;

    // Always consume stderr so the pipe never fills; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let task = task.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task, "stderr: {}", line);
            }
        });
    }

    let mut stdout = child.stdout.take().map(BufReader::new);
    let mut control_open = true;

    loop {
        tokio::select! {
            line = next_line(&mut stdout) => match line {
                Some(line) => {
                    debug!(task = %task, "stdout: {}", line);
                    let Some(frame) = parse_frame(frame_pattern, &line) else {
                        continue;
                    };
                    if !reporter.report_frame(frame) {
                        if reporter.state() == TaskState::Finished {
                            debug!(task = %task, frame, "all frames reported; waiting for process exit");
                            continue;
                        }
                        info!(task = %task, frame, "job told to stop; killing process");
                        kill(&mut child, &task).await;
                        return Ok(RunOutcome::Killed);
                    }
                }
                None => stdout = None,
            },

            status = child.wait() => {
                let status = status
                    .with_context(|| format!("waiting for process of task '{task}'"))?;
                info!(
                    task = %task,
                    exit_code = ?status.code(),
                    success = status.success(),
                    "task process exited"
                );
                return Ok(RunOutcome::Exited {
                    success: status.success(),
                    code: status.code(),
                });
            }

            control = control_rx.recv(), if control_open => match control {
                Some(ProcessControl::Restart) => {
                    info!(task = %task, "restart requested; killing process");
                    kill(&mut child, &task).await;
                    return Ok(RunOutcome::Restart);
                }
                Some(ProcessControl::Kill) => {
                    info!(task = %task, "kill requested");
                    kill(&mut child, &task).await;
                    return Ok(RunOutcome::Killed);
                }
                None if reporter.state() == TaskState::Finished => {
                    debug!(task = %task, "process handle dropped after finish; waiting for exit");
                    control_open = false;
                }
                None => {
                    debug!(task = %task, "process handle dropped; killing process");
                    kill(&mut child, &task).await;
                    return Ok(RunOutcome::Killed);
                }
            },
        }
    }
}

/// Next stdout line, decoded lossily; pends forever once stdout is closed so
/// the other branches decide.
async fn next_line(stdout: &mut Option<BufReader<ChildStdout>>) -> Option<String> {
    let Some(reader) = stdout else {
        return std::future::pending().await;
    };

    let mut buf = Vec::new();
    match reader.read_until(b'\n', &mut buf).await {
        Ok(0) => None,
        Ok(_) => {
            let line = String::from_utf8_lossy(&buf);
            Some(line.trim_end_matches(['\n', '\r']).to_string())
        }
        Err(e) => {
            debug!(error = %e, "reading process stdout failed");
            None
        }
    }
}

async fn kill(child: &mut Child, task: &str) {
    if let Err(e) = child.kill().await {
        warn!(task = %task, error = %e, "failed to kill child process");
    }
}

/// Frame number captured by the first group of `pattern` in `line`.
pub fn parse_frame(pattern: &Regex, line: &str) -> Option<i32> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
