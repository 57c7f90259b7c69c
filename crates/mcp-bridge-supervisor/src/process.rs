use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::SupervisorError;
use crate::events::SupervisorEvent;
use crate::handle::{HandleId, ProcessHandle, ProcessState, StateCell};

/// Subprocess start is only confirmed if it survives this long after spawn.
const STARTUP_WINDOW: Duration = Duration::from_millis(500);

/// Restart policy for a supervised handle.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

fn build_command(cfg: &ServerConfig) -> Command {
    let mut command = Command::new(&cfg.command);
    command.args(&cfg.args);
    command.envs(&cfg.env);
    if let Some(cwd) = &cfg.cwd {
        command.current_dir(cwd);
    }
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

async fn spawn_and_confirm(cfg: &ServerConfig) -> Result<Child, SupervisorError> {
    let mut child = build_command(cfg).spawn().map_err(SupervisorError::SpawnFailed)?;

    tokio::select! {
        _ = tokio::time::sleep(STARTUP_WINDOW) => Ok(child),
        status = child.wait() => {
            let code = status.map_err(SupervisorError::SpawnFailed)?.code();
            Err(SupervisorError::ExitedDuringStartup(code))
        }
    }
}

/// Spawn a supervised subprocess under `id`, returning a handle once the
/// startup window has passed without the child exiting.
pub async fn spawn(
    id: HandleId,
    cfg: ServerConfig,
    policy: RestartPolicy,
    events_tx: mpsc::Sender<SupervisorEvent>,
) -> Result<ProcessHandle, SupervisorError> {
    let child = spawn_and_confirm(&cfg).await?;

    let (stdin_tx, stdin_rx) = mpsc::channel::<String>(64);
    let cancel = CancellationToken::new();
    let state = Arc::new(StateCell::new(ProcessState::Running));

    let _ = events_tx
        .send(SupervisorEvent::Started { id: id.clone() })
        .await;

    tokio::spawn(io_loop(
        id.clone(),
        cfg,
        policy,
        child,
        stdin_rx,
        cancel.clone(),
        state.clone(),
        events_tx,
    ));

    Ok(ProcessHandle {
        id,
        stdin_tx,
        cancel,
        state,
    })
}

/// Splits a freshly spawned child into its three piped streams.
fn split(child: &mut Child) -> (ChildStdin, Lines<BufReader<ChildStdout>>, Lines<BufReader<ChildStderr>>) {
    let stdin = child.stdin.take().expect("piped stdin");
    let stdout = BufReader::new(child.stdout.take().expect("piped stdout")).lines();
    let stderr = BufReader::new(child.stderr.take().expect("piped stderr")).lines();
    (stdin, stdout, stderr)
}

/// Owns the child process for its whole lifetime, including any restarts.
/// Runs the single `tokio::select!` loop that multiplexes stdin writes,
/// stdout/stderr line framing, subprocess exit, and external kill requests.
///
/// Once stdout or stderr hits EOF the corresponding reader is parked (set to
/// `None`) so the `select!` stops polling it; otherwise a closed pipe would
/// resolve instantly on every iteration and spin the loop hot until `wait()`
/// separately observes the exit.
async fn io_loop(
    id: HandleId,
    cfg: ServerConfig,
    policy: RestartPolicy,
    mut child: Child,
    mut stdin_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
    state: Arc<StateCell>,
    events_tx: mpsc::Sender<SupervisorEvent>,
) {
    let (mut stdin, mut stdout, mut stderr) = split(&mut child);
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut restart_count: u32 = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let exit_code = child.wait().await.ok().and_then(|s| s.code());
                state.set(ProcessState::Stopped);
                let _ = events_tx.send(SupervisorEvent::Stopped { id: id.clone(), exit_code }).await;
                return;
            }

            Some(message) = stdin_rx.recv() => {
                if let Err(err) = stdin.write_all(message.as_bytes()).await {
                    warn!(handle = %id, "stdin write failed: {err}");
                    continue;
                }
                let _ = stdin.flush().await;
            }

            line = stdout.next_line(), if stdout_open => {
                match line {
                    Ok(Some(line)) if !line.is_empty() => {
                        let _ = events_tx.send(SupervisorEvent::Stdout { id: id.clone(), line }).await;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => { stdout_open = false; }
                }
            }

            line = stderr.next_line(), if stderr_open => {
                match line {
                    Ok(Some(line)) if !line.is_empty() => {
                        debug!(handle = %id, "stderr: {line}");
                        let _ = events_tx.send(SupervisorEvent::Stderr { id: id.clone(), line }).await;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => { stderr_open = false; }
                }
            }

            status = child.wait() => {
                let status = match status { Ok(s) => s, Err(_) => return };
                let restarted = handle_exit(
                    &id, &cfg, policy, status.code(), status.success(),
                    &mut child, &mut restart_count, &state, &events_tx,
                ).await;
                match restarted {
                    Some(()) => {
                        let (new_stdin, new_stdout, new_stderr) = split(&mut child);
                        stdin = new_stdin;
                        stdout = new_stdout;
                        stderr = new_stderr;
                        stdout_open = true;
                        stderr_open = true;
                    }
                    None => return,
                }
            }
        }
    }
}

/// Handles a detected subprocess exit: either restarts under the restart
/// budget (returning `Some(())` after replacing `child` in place with the
/// fresh process) or marks the handle dead for good (`None`), notifying the
/// Proxy Core either way.
async fn handle_exit(
    id: &HandleId,
    cfg: &ServerConfig,
    policy: RestartPolicy,
    exit_code: Option<i32>,
    success: bool,
    child: &mut Child,
    restart_count: &mut u32,
    state: &Arc<StateCell>,
    events_tx: &mpsc::Sender<SupervisorEvent>,
) -> Option<()> {
    if success {
        state.set(ProcessState::Stopped);
        let _ = events_tx
            .send(SupervisorEvent::Stopped { id: id.clone(), exit_code })
            .await;
        return None;
    }

    state.set(ProcessState::Crashed);
    let _ = events_tx
        .send(SupervisorEvent::Crashed {
            id: id.clone(),
            error: format!("exited with code {exit_code:?}"),
        })
        .await;

    if *restart_count >= policy.max_attempts {
        let _ = events_tx
            .send(SupervisorEvent::Exhausted { id: id.clone() })
            .await;
        return None;
    }

    tokio::time::sleep(policy.delay).await;

    match spawn_and_confirm(cfg).await {
        Ok(new_child) => {
            *child = new_child;
            *restart_count += 1;
            state.set(ProcessState::Running);
            info!(handle = %id, attempt = *restart_count, "subprocess restarted");
            let _ = events_tx
                .send(SupervisorEvent::Restarted { id: id.clone(), attempt: *restart_count })
                .await;
            Some(())
        }
        Err(err) => {
            warn!(handle = %id, "restart attempt failed to spawn: {err}");
            let _ = events_tx
                .send(SupervisorEvent::Exhausted { id: id.clone() })
                .await;
            None
        }
    }
}
